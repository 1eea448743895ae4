pub mod helpdesk;
pub use self::helpdesk::*;

diesel::allow_tables_to_appear_in_same_query!(users, tickets, ticket_comments);
