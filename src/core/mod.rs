//! Core types shared by every stage

pub mod error;
pub mod logging;

pub use error::{Error, Result};
