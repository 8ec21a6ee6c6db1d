//! Automatic1111 REST client library.
//!
//! Provides the pooled HTTP forwarder with its retry layers, the readiness
//! prober that gates forwarding, and the injectable sleep both rely on.

pub mod api;
pub mod readiness;
pub mod retry;
pub mod sleep;
