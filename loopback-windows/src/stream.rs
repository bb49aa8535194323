//! Event-driven shared-mode `IAudioClient` common to capture and render.

use std::sync::atomic::{AtomicBool, Ordering};

use windows::core::*;
use windows::Win32::Foundation::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::System::Threading::*;

use audio_loopback_core::models::error::{DeviceError, EndpointKind};
use audio_loopback_core::models::format::AudioFormat;

use crate::com::ensure_mta;
use crate::device_enumerator::{DeviceEnumerator, EndpointInfo};
use crate::error::{ComContext, WasapiError};
use crate::timing::{self, DEVICE_WAIT};

/// Let the audio engine convert to and from its mix format.
const STREAM_FLAGS: u32 = AUDCLNT_STREAMFLAGS_EVENTCALLBACK
    | AUDCLNT_STREAMFLAGS_AUTOCONVERTPCM
    | AUDCLNT_STREAMFLAGS_SRC_DEFAULT_QUALITY
    | AUDCLNT_STREAMFLAGS_NOPERSIST;

/// Owned Win32 event handle.
struct Event(HANDLE);

impl Event {
    fn new(manual_reset: bool) -> std::result::Result<Self, WasapiError> {
        let handle = unsafe { CreateEventW(None, manual_reset, false, PCWSTR::null()) }.context("CreateEventW")?;
        Ok(Self(handle))
    }
}

impl Drop for Event {
    fn drop(&mut self) {
        unsafe {
            let _ = CloseHandle(self.0);
        }
    }
}

/// Why a wait on the stream returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Wake {
    /// The engine signalled buffer space or data.
    Ready,
    /// `interrupt` was called.
    Interrupted,
    TimedOut,
}

pub(crate) struct SharedStream {
    kind: EndpointKind,
    client: IAudioClient,
    endpoint: Option<EndpointInfo>,
    ready: Event,
    /// Manual-reset; stays signalled from `interrupt` until the next `start`.
    cancel: Event,
    buffer_frames: u32,
    channels: usize,
    voice_processing: bool,
    released: AtomicBool,
}

// SAFETY: the client is created in the multithreaded apartment and every
// thread that touches it joins the MTA first (`ensure_mta`). Event handles are
// plain kernel handles. Teardown of the COM objects only happens on drop.
unsafe impl Send for SharedStream {}
unsafe impl Sync for SharedStream {}

impl SharedStream {
    /// Open the default communications endpoint for `kind` at `format`.
    ///
    /// The stream is tagged with the communications category before
    /// initialization so the endpoint's voice processing (echo cancellation,
    /// noise suppression) applies where the driver offers it.
    pub(crate) fn open(
        kind: EndpointKind,
        format: &AudioFormat,
        buffer_samples: usize,
        low_latency: bool,
    ) -> std::result::Result<Self, DeviceError> {
        let open_failed = |e: WasapiError| DeviceError::open_failed(kind, e.to_string());

        ensure_mta().map_err(open_failed)?;
        let enumerator = DeviceEnumerator::new().map_err(open_failed)?;
        let device = enumerator.communications_endpoint(kind).map_err(open_failed)?;
        let endpoint = DeviceEnumerator::describe(&device);

        unsafe {
            let client: IAudioClient = device
                .Activate(CLSCTX_ALL, None)
                .context("IMMDevice::Activate")
                .map_err(open_failed)?;

            let voice_processing = set_communications_category(&client);

            let wave_format = pcm_wave_format(format);
            let duration = timing::requested_buffer_hns(buffer_samples, format.sample_rate_hz, low_latency);
            client
                .Initialize(AUDCLNT_SHAREMODE_SHARED, STREAM_FLAGS, duration, 0, &wave_format, None)
                .map_err(|e| {
                    if e.code() == AUDCLNT_E_UNSUPPORTED_FORMAT {
                        DeviceError::UnsupportedFormat(format.to_string())
                    } else {
                        DeviceError::open_failed(kind, format!("IAudioClient::Initialize failed: {}", e))
                    }
                })?;

            let ready = Event::new(false).map_err(open_failed)?;
            let cancel = Event::new(true).map_err(open_failed)?;
            client
                .SetEventHandle(ready.0)
                .context("IAudioClient::SetEventHandle")
                .map_err(open_failed)?;
            let buffer_frames = client
                .GetBufferSize()
                .context("IAudioClient::GetBufferSize")
                .map_err(open_failed)?;

            log::info!(
                "Opened {} endpoint {}: {} frames buffer, voice processing {}",
                kind,
                endpoint.as_ref().map_or("<unknown>", |info| info.name.as_str()),
                buffer_frames,
                if voice_processing { "requested" } else { "unavailable" },
            );

            Ok(Self {
                kind,
                client,
                endpoint,
                ready,
                cancel,
                buffer_frames,
                channels: usize::from(format.channels.count()),
                voice_processing,
                released: AtomicBool::new(false),
            })
        }
    }

    pub(crate) fn client(&self) -> &IAudioClient {
        &self.client
    }

    pub(crate) fn endpoint(&self) -> Option<&EndpointInfo> {
        self.endpoint.as_ref()
    }

    pub(crate) fn buffer_frames(&self) -> u32 {
        self.buffer_frames
    }

    pub(crate) fn channels(&self) -> usize {
        self.channels
    }

    pub(crate) fn voice_processing(&self) -> bool {
        self.voice_processing
    }

    pub(crate) fn is_released(&self) -> bool {
        self.released.load(Ordering::Acquire)
    }

    pub(crate) fn check_live(&self) -> std::result::Result<(), DeviceError> {
        if self.is_released() {
            return Err(DeviceError::Released);
        }
        ensure_mta()?;
        Ok(())
    }

    pub(crate) fn start(&self) -> std::result::Result<(), DeviceError> {
        self.check_live()?;
        unsafe {
            ResetEvent(self.cancel.0).context("ResetEvent")?;
            self.client.Start().context("IAudioClient::Start")?;
        }
        log::debug!("{} stream started", self.kind);
        Ok(())
    }

    pub(crate) fn stop(&self) -> std::result::Result<(), DeviceError> {
        self.check_live()?;
        unsafe { self.client.Stop() }.context("IAudioClient::Stop")?;
        log::debug!("{} stream stopped", self.kind);
        Ok(())
    }

    pub(crate) fn interrupt(&self) {
        unsafe {
            if let Err(e) = SetEvent(self.cancel.0) {
                log::warn!("Failed to signal {} cancel event: {}", self.kind, e);
            }
        }
    }

    /// Stop the stream and wake any waiter. The COM objects are freed on drop.
    pub(crate) fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        self.interrupt();
        if ensure_mta().is_ok() {
            unsafe {
                let _ = self.client.Stop();
                let _ = self.client.Reset();
            }
        }
        log::debug!("{} stream released", self.kind);
    }

    /// Block until the engine signals, `interrupt` is called, or the device
    /// wait elapses.
    pub(crate) fn wait(&self) -> std::result::Result<Wake, DeviceError> {
        let handles = [self.ready.0, self.cancel.0];
        let timeout_ms = DEVICE_WAIT.as_millis() as u32;
        let result = unsafe { WaitForMultipleObjects(&handles, false, timeout_ms) };
        if result == WAIT_OBJECT_0 {
            Ok(Wake::Ready)
        } else if result.0 == WAIT_OBJECT_0.0 + 1 {
            Ok(Wake::Interrupted)
        } else if result == WAIT_TIMEOUT {
            Ok(Wake::TimedOut)
        } else {
            let code = unsafe { GetLastError() };
            Err(DeviceError::Backend(format!("{} wait failed: error {}", self.kind, code.0)))
        }
    }
}

/// Tag the stream as communications audio. Returns whether the endpoint accepted it.
fn set_communications_category(client: &IAudioClient) -> bool {
    let Ok(client2) = client.cast::<IAudioClient2>() else {
        return false;
    };
    let properties = AudioClientProperties {
        cbSize: std::mem::size_of::<AudioClientProperties>() as u32,
        bIsOffload: false.into(),
        eCategory: AudioCategory_Communications,
        Options: AUDCLNT_STREAMOPTIONS_NONE,
    };
    match unsafe { client2.SetClientProperties(&properties) } {
        Ok(()) => true,
        Err(e) => {
            log::debug!("Communications category rejected: {}", e);
            false
        }
    }
}

fn pcm_wave_format(format: &AudioFormat) -> WAVEFORMATEX {
    let block_align = format.block_align() as u16;
    WAVEFORMATEX {
        wFormatTag: WAVE_FORMAT_PCM as u16,
        nChannels: format.channels.count(),
        nSamplesPerSec: format.sample_rate_hz,
        nAvgBytesPerSec: format.sample_rate_hz * u32::from(block_align),
        nBlockAlign: block_align,
        wBitsPerSample: format.bits_per_sample,
        cbSize: 0,
    }
}
