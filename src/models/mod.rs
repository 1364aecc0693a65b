// src/models/mod.rs
pub mod driver;
pub mod finances;
pub mod trip;
pub mod user;

pub use driver::*;
pub use finances::*;
pub use trip::*;
pub use user::*;
