diesel::table! {
    users (id) {
        id -> Uuid,
        username -> Varchar,
        email -> Varchar,
        password_hash -> Text,
        role -> Varchar,
        is_active -> Bool,
        last_login -> Nullable<Timestamptz>,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    tickets (id) {
        id -> Uuid,
        title -> Varchar,
        description -> Varchar,
        status -> Varchar,
        priority -> Varchar,
        created_by -> Uuid,
        assigned_to -> Nullable<Uuid>,
        version -> Int4,
        created_at -> Timestamptz,
        updated_at -> Timestamptz,
    }
}

diesel::table! {
    ticket_comments (id) {
        id -> Uuid,
        ticket_id -> Uuid,
        position -> Int4,
        text -> Text,
        posted_by -> Uuid,
        created_at -> Timestamptz,
    }
}

diesel::joinable!(ticket_comments -> tickets (ticket_id));
