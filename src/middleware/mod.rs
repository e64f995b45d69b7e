//! Built-in middleware.
//!
//! Register on a service (applies to every action) or on a controller
//! (applies to its actions, inside the service chain):
//!
//! ```rust
//! use keel::{Middlewared, Runtime, Service, middleware};
//! use std::time::Duration;
//!
//! let mut service = Service::new("cellar", Runtime::new());
//! service.use_middleware(middleware::request_id());
//! service.use_middleware(middleware::log_request());
//! service.use_middleware(middleware::recover());
//! service.use_middleware(middleware::timeout(Duration::from_secs(30)));
//! ```
//!
//! Order matters: the first registered layer runs outermost, so in the
//! example above the request id is already set when the request is logged,
//! and a panic is caught before the timeout layer sees it.

mod log;
mod recover;
mod request_id;
mod timeout;

pub use log::log_request;
pub use recover::recover;
pub use request_id::{REQUEST_ID, request_id};
pub use timeout::timeout;
