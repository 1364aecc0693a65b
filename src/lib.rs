// src/lib.rs
pub mod errors;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

pub use errors::{DispatchError, DispatchResult, ValidationError};
