pub mod audit;
pub mod config;
pub mod core;
pub mod delegation;
pub mod error;
pub mod log;
pub mod orchestration;
pub mod source;

pub use error::{Error, Result};
