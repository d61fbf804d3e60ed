//! Request handlers.

pub mod health;
pub mod todos;
pub mod users;
