//! Request validation and routing for the sdrelay worker.
//!
//! Pure logic only: the schema engine, the compiled-in schemas and endpoint
//! allow-list, the sampler normalizer, and the job/result documents. Nothing
//! here touches the network or the filesystem.

pub mod catalog;
pub mod endpoints;
pub mod error;
pub mod job;
pub mod sampler;
pub mod validation;
