//! Backend API access.
//!
//! [`ApiClient`] wraps every HTTP call the dashboard makes; the
//! [`stream`] submodule reads the SSE job stream. Nothing else in the
//! crate touches the network.

mod client;
pub mod stream;

pub use client::{ActionResponse, ApiClient, ApiError, ErrorClass, HealthResponse};
pub use stream::JobStream;
