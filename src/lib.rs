//! Role-based IT help-desk server: tickets, their access rules and
//! lifecycle, and the accounts that file and work them.

pub mod core;
pub mod directory;
pub mod main_module;
pub mod security;
pub mod tickets;

pub use crate::core::shared;
