//! Business-logic services used by handlers.

pub mod auth;
