//! # audio-loopback-windows
//!
//! Windows WASAPI backend for audio-loopback-core.
//!
//! Provides:
//! - `WasapiBackend` — `AudioBackend` on the default communications endpoints
//! - `WasapiCapture` / `WasapiRender` — event-driven shared-mode PCM16 streams
//! - `WindowsRouting` — `RoutingPlatform` over the communications role
//! - `DeviceEnumerator` — endpoint lookup and description via the MMDevice API
//!
//! ## Platform Requirements
//! - Windows 10+ (communications stream category, `AUTOCONVERTPCM`)
//! - Visual Studio Build Tools 2022 + Windows SDK for linking
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use audio_loopback_core::LoopbackEngine;
//! use audio_loopback_windows::{WasapiBackend, WindowsRouting};
//!
//! let engine = LoopbackEngine::new(WasapiBackend::new(), Arc::new(WindowsRouting::new()));
//! engine.start(1.0)?;
//! ```

pub mod classify;
pub mod timing;

#[cfg(target_os = "windows")]
pub mod backend;
#[cfg(target_os = "windows")]
mod com;
#[cfg(target_os = "windows")]
pub mod device_enumerator;
#[cfg(target_os = "windows")]
pub mod error;
#[cfg(target_os = "windows")]
pub mod routing;
#[cfg(target_os = "windows")]
mod stream;
#[cfg(target_os = "windows")]
pub mod wasapi_capture;
#[cfg(target_os = "windows")]
pub mod wasapi_render;

#[cfg(target_os = "windows")]
pub use backend::WasapiBackend;
#[cfg(target_os = "windows")]
pub use device_enumerator::{DeviceEnumerator, EndpointInfo};
#[cfg(target_os = "windows")]
pub use error::WasapiError;
#[cfg(target_os = "windows")]
pub use routing::WindowsRouting;
#[cfg(target_os = "windows")]
pub use wasapi_capture::WasapiCapture;
#[cfg(target_os = "windows")]
pub use wasapi_render::WasapiRender;
