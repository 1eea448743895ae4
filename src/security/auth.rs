pub use crate::security::auth_api::*;
