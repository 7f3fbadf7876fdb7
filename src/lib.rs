// src/lib.rs

//! Podium: resilient caching of historical motor-racing results.

pub mod context;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod services;
pub mod storage;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use context::Context;
pub use error::{AppError, Result};
