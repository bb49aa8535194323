//! # audio-loopback-core
//!
//! Platform-agnostic real-time microphone → speaker loopback.
//!
//! Captures mono PCM16 from the communication microphone, applies a gain and
//! plays it back with the smallest buffer the platform allows, routed to a
//! Bluetooth headset over SCO when one is connected. Platform backends
//! (Windows WASAPI, or the in-memory mock) implement `AudioBackend` and
//! `RoutingPlatform` and plug into the generic `LoopbackEngine`.
//!
//! ## Architecture
//!
//! ```text
//! audio-loopback-core (this crate)
//! ├── traits/       ← AudioBackend, CaptureEndpoint, PlaybackEndpoint, RoutingPlatform, LoopbackDelegate
//! ├── models/       ← AudioFormat, LoopbackConfiguration, SessionState, errors, diagnostics
//! ├── processing/   ← GainStage, FrameBuffer
//! ├── session/      ← DeviceSession (endpoint lifecycle)
//! ├── routing/      ← RoutingController (focus, volume, SCO, audio mode)
//! ├── engine/       ← LoopbackEngine + processing loop thread
//! ├── control/      ← LoopbackControl (bool-returning host surface)
//! └── mock/         ← in-memory backend and routing for tests
//! ```

pub mod control;
pub mod engine;
pub mod mock;
pub mod models;
pub mod processing;
pub mod routing;
pub mod session;
pub mod traits;

// Re-export key types at crate root for convenience.
pub use control::api::LoopbackControl;
pub use engine::loopback::LoopbackEngine;
pub use models::config::{BufferPolicy, CaptureEffect, LoopbackConfiguration, ProcessingOptions};
pub use models::devices::{AudioDevice, AudioDeviceKind, BufferConfig};
pub use models::diagnostics::LoopbackDiagnostics;
pub use models::error::{DeviceError, EndpointKind, EngineError, ProcessingAttachError, RoutingError};
pub use models::format::AudioFormat;
pub use models::routing_state::{AudioMode, FocusRequest, RoutingState, StreamType};
pub use models::state::SessionState;
pub use processing::frame_buffer::FrameBuffer;
pub use processing::gain::{GainSetting, GainStage};
pub use routing::controller::RoutingController;
pub use session::device_session::{DeviceSession, IoState, SessionOptions};
pub use traits::audio_backend::AudioBackend;
pub use traits::delegate::LoopbackDelegate;
pub use traits::endpoint::{CaptureEndpoint, PlaybackEndpoint};
pub use traits::routing_platform::RoutingPlatform;
