//! Job dispatch for the A1111 relay worker.
//!
//! [`dispatcher::Dispatcher`] turns one inbound job document into one result
//! document; [`host::serve`] drives it over a line-oriented stream.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod host;
pub mod panic;

/// Default `RUST_LOG` filter for the worker binary.
pub const DEFAULT_LOG_FILTER: &str = "sdrelay_worker=info,sdrelay_a1111=info,sdrelay_helpers=info";
