//! # keeper_core
//!
//! Core domain logic for Keeper: the access/refresh token lifecycle,
//! claims-based authorization and todo ownership.

pub mod auth;
pub mod migrate;
pub mod models;
pub mod todos;
pub mod uuid;
pub mod validation;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_is_not_empty() {
        assert!(!version().is_empty());
    }
}
