//! Storage backends that the benchmark harness fetches objects from.
//!
//! Every backend implements [`Backend`], which hands out an object's declared length
//! together with a stream of its contents. The harness owns all timing; backends only
//! move bytes.
//!
//! Available backends:
//!
//! - [`S3Compatible`]: plain HTTP against an S3-compatible endpoint.
//! - [`LocalFs`]: files below a local directory.
//! - [`InMemoryBackend`]: a shared map, used by tests.
#![warn(missing_docs)]
#![warn(missing_debug_implementations)]

mod common;
mod in_memory;
mod local_fs;
mod s3_compatible;

pub use common::{
    Backend, BackendError, BackendResult, GetResponse, PayloadStream, SharedBackend, USER_AGENT,
    reqwest_client,
};
pub use in_memory::InMemoryBackend;
pub use local_fs::LocalFs;
pub use s3_compatible::S3Compatible;
