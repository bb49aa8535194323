//! WASAPI communications speaker/headset render.

use windows::Win32::Media::Audio::*;

use audio_loopback_core::models::error::{DeviceError, EndpointKind};
use audio_loopback_core::models::format::AudioFormat;
use audio_loopback_core::traits::endpoint::PlaybackEndpoint;

use crate::device_enumerator::EndpointInfo;
use crate::error::ComContext;
use crate::stream::{SharedStream, Wake};

/// WASAPI render endpoint.
///
/// `write` copies as much as currently fits in the device buffer, waiting for
/// space when it is full. The loop retries the remainder.
pub struct WasapiRender {
    stream: SharedStream,
    render: IAudioRenderClient,
}

// SAFETY: see `SharedStream`; the render client belongs to the same MTA client.
unsafe impl Send for WasapiRender {}
unsafe impl Sync for WasapiRender {}

impl WasapiRender {
    pub fn open(format: &AudioFormat, buffer_samples: usize, low_latency: bool) -> Result<Self, DeviceError> {
        let stream = SharedStream::open(EndpointKind::Playback, format, buffer_samples, low_latency)?;
        let render: IAudioRenderClient = unsafe { stream.client().GetService() }
            .map_err(|e| DeviceError::open_failed(EndpointKind::Playback, format!("GetService failed: {}", e)))?;
        Ok(Self { stream, render })
    }

    pub fn endpoint(&self) -> Option<&EndpointInfo> {
        self.stream.endpoint()
    }

    fn free_frames(&self) -> Result<u32, DeviceError> {
        let padding = unsafe { self.stream.client().GetCurrentPadding() }
            .context("IAudioClient::GetCurrentPadding")
            .map_err(|e| DeviceError::WriteFailed(e.to_string()))?;
        Ok(self.stream.buffer_frames().saturating_sub(padding))
    }
}

impl PlaybackEndpoint for WasapiRender {
    fn start(&self) -> Result<(), DeviceError> {
        self.stream.start()
    }

    fn stop(&self) -> Result<(), DeviceError> {
        self.stream.stop()
    }

    fn write(&self, samples: &[i16]) -> Result<usize, DeviceError> {
        self.stream.check_live()?;
        let channels = self.stream.channels();

        loop {
            if self.stream.is_released() {
                return Err(DeviceError::Released);
            }
            let free = self.free_frames()?;
            if free == 0 {
                match self.stream.wait()? {
                    Wake::Ready => continue,
                    Wake::Interrupted | Wake::TimedOut => return Ok(0),
                }
            }

            let frames = free.min((samples.len() / channels) as u32);
            if frames == 0 {
                return Ok(0);
            }
            let count = frames as usize * channels;
            unsafe {
                let data = self
                    .render
                    .GetBuffer(frames)
                    .context("IAudioRenderClient::GetBuffer")
                    .map_err(|e| DeviceError::WriteFailed(e.to_string()))?;
                std::slice::from_raw_parts_mut(data as *mut i16, count).copy_from_slice(&samples[..count]);
                self.render
                    .ReleaseBuffer(frames, 0)
                    .context("IAudioRenderClient::ReleaseBuffer")
                    .map_err(|e| DeviceError::WriteFailed(e.to_string()))?;
            }
            return Ok(count);
        }
    }

    fn interrupt(&self) {
        self.stream.interrupt();
    }

    fn release(&self) {
        self.stream.release();
    }
}
