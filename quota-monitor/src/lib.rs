pub mod api;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod logging;
pub mod quota;
pub mod scheduler;
pub mod services;
pub mod utils;

pub use error::{Error, Result};
