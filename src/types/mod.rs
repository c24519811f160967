//! Type definitions for debuginfo
//!
//! The snapshot model shared by the sampler, the refresh loop and the
//! overlay renderer.

mod snapshot;

pub use snapshot::*;
