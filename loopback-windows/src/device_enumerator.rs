//! Windows audio endpoint lookup via the MMDevice API.
//!
//! Wraps `IMMDeviceEnumerator` to find the communications endpoints the
//! loopback runs on and to describe active render endpoints (friendly name,
//! enumerator, form factor) for routing decisions.

use windows::core::*;
use windows::Win32::Devices::FunctionDiscovery::*;
use windows::Win32::Foundation::*;
use windows::Win32::Media::Audio::*;
use windows::Win32::System::Com::*;
use windows::Win32::UI::Shell::PropertiesSystem::*;

use audio_loopback_core::models::devices::{AudioDevice, AudioDeviceKind};
use audio_loopback_core::models::error::EndpointKind;

use crate::classify;
use crate::error::{ComContext, WasapiError};

type WasapiResult<T> = std::result::Result<T, WasapiError>;

/// Properties of one active endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointInfo {
    pub id: String,
    pub name: String,
    pub enumerator_name: String,
    pub form_factor: Option<u32>,
    pub is_default: bool,
}

impl EndpointInfo {
    pub fn kind(&self) -> AudioDeviceKind {
        classify::device_kind(&self.enumerator_name, self.form_factor)
    }

    pub fn to_device(&self) -> AudioDevice {
        AudioDevice::new(self.kind(), self.name.clone())
    }
}

/// Audio endpoint enumerator using the Windows MMDevice API.
pub struct DeviceEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl DeviceEnumerator {
    /// Requires COM to be initialized on the calling thread.
    pub fn new() -> WasapiResult<Self> {
        let enumerator: IMMDeviceEnumerator =
            unsafe { CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL) }.context("create MMDeviceEnumerator")?;
        Ok(Self { enumerator })
    }

    /// Default endpoint for the communications role: the headset the system
    /// routes calls to, or the built-in device when none is connected.
    pub fn communications_endpoint(&self, kind: EndpointKind) -> WasapiResult<IMMDevice> {
        self.default_endpoint(kind, eCommunications)
    }

    /// Default endpoint for the console (media) role.
    pub fn console_endpoint(&self, kind: EndpointKind) -> WasapiResult<IMMDevice> {
        self.default_endpoint(kind, eConsole)
    }

    /// Active render endpoints, default first.
    pub fn list_render_endpoints(&self) -> WasapiResult<Vec<EndpointInfo>> {
        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(eRender, DEVICE_STATE_ACTIVE)
                .context("EnumAudioEndpoints")?;
            let count = collection.GetCount().context("IMMDeviceCollection::GetCount")?;

            let default_id = self
                .default_endpoint(EndpointKind::Playback, eConsole)
                .ok()
                .and_then(|device| device_id(&device));

            let mut endpoints = Vec::with_capacity(count as usize);
            for i in 0..count {
                let Ok(device) = collection.Item(i) else {
                    continue;
                };
                let Some(mut info) = Self::describe(&device) else {
                    continue;
                };
                info.is_default = default_id.as_deref() == Some(info.id.as_str());
                endpoints.push(info);
            }
            endpoints.sort_by_key(|info| !info.is_default);
            Ok(endpoints)
        }
    }

    /// Read id, friendly name, enumerator and form factor of `device`.
    pub fn describe(device: &IMMDevice) -> Option<EndpointInfo> {
        let id = device_id(device)?;
        let store = unsafe { device.OpenPropertyStore(STGM_READ) }.ok()?;
        Some(EndpointInfo {
            name: string_property(&store, &PKEY_Device_FriendlyName).unwrap_or_else(|| id.clone()),
            enumerator_name: string_property(&store, &PKEY_Device_EnumeratorName).unwrap_or_default(),
            form_factor: u32_property(&store, &PKEY_AudioEndpoint_FormFactor),
            is_default: false,
            id,
        })
    }

    fn default_endpoint(&self, kind: EndpointKind, role: ERole) -> WasapiResult<IMMDevice> {
        let flow = match kind {
            EndpointKind::Capture => eCapture,
            EndpointKind::Playback => eRender,
        };
        unsafe { self.enumerator.GetDefaultAudioEndpoint(flow, role) }.map_err(|e| {
            log::debug!("No default {} endpoint for role {:?}: {}", kind, role, e);
            WasapiError::NoEndpoint(kind)
        })
    }
}

fn device_id(device: &IMMDevice) -> Option<String> {
    unsafe {
        let raw = device.GetId().ok()?;
        let id = raw.to_string().ok();
        CoTaskMemFree(Some(raw.0 as *const _));
        id
    }
}

fn string_property(store: &IPropertyStore, key: &PROPERTYKEY) -> Option<String> {
    let value = unsafe { store.GetValue(key) }.ok()?;
    let text = value.to_string();
    (!text.is_empty()).then_some(text)
}

fn u32_property(store: &IPropertyStore, key: &PROPERTYKEY) -> Option<u32> {
    let value = unsafe { store.GetValue(key) }.ok()?;
    u32::try_from(&value).ok()
}
