pub mod config;
pub mod ergo;
pub mod error;

pub use error::{DriverError, Result};
