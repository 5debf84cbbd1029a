//! Request/response protocol engine for the LXD REST API.
//!
//! Every daemon response is a JSON envelope classified as one of three
//! kinds: `sync` (the result is in the body), `async` (the daemon started a
//! background operation) or `error`. This module owns the envelope model,
//! the classification rules, and the poll loop that drives a background
//! operation to a terminal state.

pub mod envelope;
pub mod operation;
pub mod parser;
pub mod poller;

pub use envelope::{LxdResponse, ResponseType};
pub use operation::{Operation, OperationStatus};
pub use parser::ResponseParser;
