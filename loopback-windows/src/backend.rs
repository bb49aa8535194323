use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;

use audio_loopback_core::models::error::{DeviceError, EndpointKind};
use audio_loopback_core::models::format::AudioFormat;
use audio_loopback_core::traits::audio_backend::AudioBackend;

use crate::com::ensure_mta;
use crate::device_enumerator::DeviceEnumerator;
use crate::error::ComContext;
use crate::timing;
use crate::wasapi_capture::WasapiCapture;
use crate::wasapi_render::WasapiRender;

/// WASAPI shared-mode backend on the default communications endpoints.
#[derive(Debug, Default, Clone, Copy)]
pub struct WasapiBackend;

impl WasapiBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for WasapiBackend {
    type Capture = WasapiCapture;
    type Playback = WasapiRender;

    /// One shared-mode engine period of the communications render endpoint.
    fn min_buffer_samples(&self, format: &AudioFormat) -> Result<usize, DeviceError> {
        ensure_mta()?;
        let enumerator = DeviceEnumerator::new()?;
        let device = enumerator.communications_endpoint(EndpointKind::Playback)?;
        let mut default_period: i64 = 0;
        unsafe {
            let client: IAudioClient = device.Activate(CLSCTX_ALL, None).context("IMMDevice::Activate")?;
            client
                .GetDevicePeriod(Some(&mut default_period as *mut i64), None)
                .context("IAudioClient::GetDevicePeriod")?;
        }
        let samples = timing::hns_to_samples(default_period, format.sample_rate_hz);
        log::debug!(
            "Engine period {} hns = {} samples at {} Hz",
            default_period,
            samples,
            format.sample_rate_hz
        );
        Ok(samples)
    }

    fn open_capture(&self, format: &AudioFormat, buffer_samples: usize) -> Result<WasapiCapture, DeviceError> {
        WasapiCapture::open(format, buffer_samples)
    }

    fn open_playback(
        &self,
        format: &AudioFormat,
        buffer_samples: usize,
        low_latency: bool,
    ) -> Result<WasapiRender, DeviceError> {
        WasapiRender::open(format, buffer_samples, low_latency)
    }
}
