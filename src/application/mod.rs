// Application layer - balance engine and the account service in front of it.

mod engine;
pub mod error;
mod service;

pub use engine::*;
pub use error::*;
pub use service::*;
