//! Mockd
//!
//! A standalone HTTP mock server: register declarative request/response
//! definitions from a mappings directory or at runtime, then answer any
//! incoming request by replaying the first matching definition.
//!
//! # Features
//!
//! - **Request Matching**: exact method + path equality with optional
//!   header-gated variants of the same route
//! - **Runtime Registration**: `POST /__new/` with a JSON mock definition
//! - **File Loading**: a directory of JSON definitions loaded at startup
//! - **Overwrite Semantics**: re-registering an identical matcher replaces
//!   the stored definition wholesale
//! - **Diagnostic 404s**: unmatched requests echo their method, path and
//!   headers back to the caller
//!
//! # Example Definition
//!
//! ```json
//! {
//!   "request": {
//!     "method": "GET",
//!     "url": "/api/hello",
//!     "headers": { "API-Version": "1.0" }
//!   },
//!   "response": {
//!     "status": 200,
//!     "headers": { "Content-Type": "application/json" },
//!     "body": { "msg": "hi" }
//!   }
//! }
//! ```

pub mod definition;
pub mod loader;
pub mod matcher;
pub mod server;
pub mod store;

pub use definition::{BodySpec, MockDefinition, RequestSpec, ResponseSpec, ValidationError};
pub use matcher::{headers_satisfy, Dispatch, Dispatcher, RequestDescriptor};
pub use server::{Server, ServerState};
pub use store::{MatchKey, MockStore};
