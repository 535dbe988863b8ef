//! Database models.

pub mod account;

pub use account::AccountDbModel;
