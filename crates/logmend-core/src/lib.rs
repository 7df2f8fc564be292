//! logmend Core - Shared errors, defaults, and stream configuration

pub mod config;
pub mod constants;
pub mod error;

pub use config::*;
pub use constants::*;
pub use error::{Error, Result, SinkFailure};
