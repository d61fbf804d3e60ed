//! Background maintenance jobs.

pub mod token_cleanup;
