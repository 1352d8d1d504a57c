//! HTTP middleware for the gateway server.

pub mod correlation_id;

pub use correlation_id::{create_request_id_layers, request_id, RelayRequestIdGenerator, X_REQUEST_ID};
