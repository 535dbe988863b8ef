//! Domain entities.

pub mod account;

pub use account::{Account, AccountStats};
