//! In-memory backend and routing platform for tests and headless runs.
//!
//! [`MockBackend`] hands out capture/playback endpoints driven by a scripted
//! read queue; [`MockRouting`] records every routing call. Both expose a probe
//! for asserting on what the engine did to the "hardware".

mod backend;
mod routing;

pub use backend::{MockBackend, MockCapture, MockPlayback, MockProbe, ReadStep};
pub use routing::MockRouting;
