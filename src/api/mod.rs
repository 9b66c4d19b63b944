//! Request surface
//!
//! The typed operation vocabulary the core exposes. The transport in
//! front of this (stdio, HTTP, whatever) is a thin translator: it
//! deserializes a [`Request`], calls [`handle`], and serializes the
//! [`Response`] envelope.

pub mod errors;
pub mod handler;
pub mod request;
pub mod response;

pub use errors::ApiError;
pub use handler::handle;
pub use request::{Operation, Request, RequestMode};
pub use response::{OperationResult, Response};
