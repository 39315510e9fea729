//! Wire models and request plumbing for the school platform's plan and
//! checklist API.

pub mod config;
pub mod error;
pub mod http;
pub mod models;
pub mod queries;
pub mod session;
pub mod transport;

pub use error::ApiError;
pub use transport::{Method, Transport};
