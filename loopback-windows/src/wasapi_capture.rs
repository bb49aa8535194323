//! WASAPI communications microphone capture.
//!
//! Opens the default communications capture endpoint in shared mode as
//! 16-bit PCM and hands out blocking, frame-sized reads to the loop thread.

use parking_lot::Mutex;
use windows::Win32::Media::Audio::*;

use audio_loopback_core::models::config::CaptureEffect;
use audio_loopback_core::models::error::{DeviceError, EndpointKind, ProcessingAttachError};
use audio_loopback_core::models::format::AudioFormat;
use audio_loopback_core::traits::endpoint::CaptureEndpoint;

use crate::com::register_pro_audio_thread;
use crate::device_enumerator::EndpointInfo;
use crate::error::ComContext;
use crate::stream::{SharedStream, Wake};

/// WASAPI capture endpoint.
///
/// `read` blocks until the caller's buffer is full, the stream is
/// interrupted, or the device stays silent for the device wait. Packets larger
/// than the remaining buffer are carried over to the next read.
pub struct WasapiCapture {
    stream: SharedStream,
    capture: IAudioCaptureClient,
    carry: Mutex<Vec<i16>>,
}

// SAFETY: see `SharedStream`; the capture client belongs to the same MTA client.
unsafe impl Send for WasapiCapture {}
unsafe impl Sync for WasapiCapture {}

impl WasapiCapture {
    pub fn open(format: &AudioFormat, buffer_samples: usize) -> Result<Self, DeviceError> {
        let stream = SharedStream::open(EndpointKind::Capture, format, buffer_samples, true)?;
        let capture: IAudioCaptureClient = unsafe { stream.client().GetService() }
            .map_err(|e| DeviceError::open_failed(EndpointKind::Capture, format!("GetService failed: {}", e)))?;
        Ok(Self {
            stream,
            capture,
            carry: Mutex::new(Vec::with_capacity(buffer_samples)),
        })
    }

    pub fn endpoint(&self) -> Option<&EndpointInfo> {
        self.stream.endpoint()
    }

    /// Move the next packet into `out`, carrying any excess. Returns samples written.
    fn take_packet(&self, out: &mut [i16], carry: &mut Vec<i16>) -> Result<usize, DeviceError> {
        unsafe {
            let mut data: *mut u8 = std::ptr::null_mut();
            let mut frames: u32 = 0;
            let mut flags: u32 = 0;
            self.capture
                .GetBuffer(&mut data, &mut frames, &mut flags, None, None)
                .context("IAudioCaptureClient::GetBuffer")
                .map_err(|e| DeviceError::ReadFailed(e.to_string()))?;

            let total = frames as usize * self.stream.channels();
            let taken = total.min(out.len());
            if flags & (AUDCLNT_BUFFERFLAGS_SILENT.0 as u32) != 0 || data.is_null() {
                out[..taken].fill(0);
                carry.resize(carry.len() + (total - taken), 0);
            } else {
                let samples = std::slice::from_raw_parts(data as *const i16, total);
                out[..taken].copy_from_slice(&samples[..taken]);
                carry.extend_from_slice(&samples[taken..]);
            }

            self.capture
                .ReleaseBuffer(frames)
                .context("IAudioCaptureClient::ReleaseBuffer")
                .map_err(|e| DeviceError::ReadFailed(e.to_string()))?;
            Ok(taken)
        }
    }
}

impl CaptureEndpoint for WasapiCapture {
    fn start(&self) -> Result<(), DeviceError> {
        self.carry.lock().clear();
        self.stream.start()
    }

    fn stop(&self) -> Result<(), DeviceError> {
        self.stream.stop()
    }

    fn read(&self, buf: &mut [i16]) -> Result<usize, DeviceError> {
        self.stream.check_live()?;
        register_pro_audio_thread();

        let mut carry = self.carry.lock();
        let mut filled = carry.len().min(buf.len());
        buf[..filled].copy_from_slice(&carry[..filled]);
        carry.drain(..filled);

        while filled < buf.len() {
            if self.stream.is_released() {
                return Err(DeviceError::Released);
            }
            let packet = unsafe { self.capture.GetNextPacketSize() }
                .context("IAudioCaptureClient::GetNextPacketSize")
                .map_err(|e| DeviceError::ReadFailed(e.to_string()))?;
            if packet == 0 {
                match self.stream.wait()? {
                    Wake::Ready => continue,
                    Wake::Interrupted | Wake::TimedOut => break,
                }
            }
            filled += self.take_packet(&mut buf[filled..], &mut carry)?;
        }

        Ok(filled)
    }

    /// Echo cancellation and noise suppression ride on the communications
    /// processing mode; both are present exactly when the endpoint accepted the
    /// communications category at open.
    fn attach_effect(&self, effect: CaptureEffect) -> Result<(), ProcessingAttachError> {
        if self.stream.voice_processing() {
            log::debug!("{} provided by communications processing mode", effect);
            Ok(())
        } else {
            Err(ProcessingAttachError::Unavailable(effect))
        }
    }

    fn interrupt(&self) {
        self.stream.interrupt();
    }

    fn release(&self) {
        self.stream.release();
    }
}
