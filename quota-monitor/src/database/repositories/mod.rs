//! Repository layer for database operations.

pub mod account;

pub use account::{AccountRepository, SqlxAccountRepository};
