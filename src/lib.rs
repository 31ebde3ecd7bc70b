pub mod api;
pub mod core;
pub mod error;
pub mod settings;

pub use error::{Error, Result};
