//! Map MMDevice endpoint properties onto loopback device kinds.
//!
//! Kept free of COM so it can be unit tested on any host.

use audio_loopback_core::models::devices::AudioDeviceKind;

/// `EndpointFormFactor` codes from mmdeviceapi.h.
pub const FORM_FACTOR_SPEAKERS: u32 = 1;
pub const FORM_FACTOR_HEADPHONES: u32 = 3;
pub const FORM_FACTOR_HEADSET: u32 = 5;
pub const FORM_FACTOR_HANDSET: u32 = 6;
pub const FORM_FACTOR_UNKNOWN: u32 = 10;

/// Classify an endpoint from its `PKEY_Device_EnumeratorName` and
/// `PKEY_AudioEndpoint_FormFactor`.
///
/// Hands-free (HFP) endpoints are what carries SCO audio: they enumerate under
/// `BTHHFENUM`, or under `BTHENUM`/`BTHLEENUM` with a headset form factor. Any
/// other Bluetooth endpoint is the stereo A2DP sink.
pub fn device_kind(enumerator_name: &str, form_factor: Option<u32>) -> AudioDeviceKind {
    let enumerator = enumerator_name.to_ascii_uppercase();
    if enumerator.contains("BTHHFENUM") {
        return AudioDeviceKind::BluetoothSco;
    }
    if enumerator.contains("BTHENUM") || enumerator.contains("BTHLEENUM") {
        return match form_factor {
            Some(FORM_FACTOR_HEADSET) | Some(FORM_FACTOR_HANDSET) => AudioDeviceKind::BluetoothSco,
            _ => AudioDeviceKind::BluetoothA2dp,
        };
    }

    match form_factor {
        Some(FORM_FACTOR_HEADSET) => AudioDeviceKind::WiredHeadset,
        Some(FORM_FACTOR_HEADPHONES) => AudioDeviceKind::WiredHeadphones,
        Some(FORM_FACTOR_SPEAKERS) => AudioDeviceKind::BuiltinSpeaker,
        Some(FORM_FACTOR_HANDSET) => AudioDeviceKind::BuiltinEarpiece,
        Some(code) => AudioDeviceKind::Other(code),
        None => AudioDeviceKind::Other(FORM_FACTOR_UNKNOWN),
    }
}

pub fn is_wired_headset(kind: AudioDeviceKind) -> bool {
    matches!(kind, AudioDeviceKind::WiredHeadset | AudioDeviceKind::WiredHeadphones)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hands_free_enumerator_is_sco() {
        assert_eq!(device_kind("BTHHFENUM", Some(FORM_FACTOR_HEADSET)), AudioDeviceKind::BluetoothSco);
        assert_eq!(device_kind("bthhfenum", None), AudioDeviceKind::BluetoothSco);
    }

    #[test]
    fn bluetooth_form_factor_splits_sco_and_a2dp() {
        assert_eq!(device_kind("BTHENUM", Some(FORM_FACTOR_HEADSET)), AudioDeviceKind::BluetoothSco);
        assert_eq!(device_kind("BTHENUM", Some(FORM_FACTOR_HEADPHONES)), AudioDeviceKind::BluetoothA2dp);
        assert_eq!(device_kind("BTHLEENUM", None), AudioDeviceKind::BluetoothA2dp);
    }

    #[test]
    fn wired_and_builtin_by_form_factor() {
        assert_eq!(device_kind("USB", Some(FORM_FACTOR_HEADSET)), AudioDeviceKind::WiredHeadset);
        assert_eq!(device_kind("HDAUDIO", Some(FORM_FACTOR_HEADPHONES)), AudioDeviceKind::WiredHeadphones);
        assert_eq!(device_kind("HDAUDIO", Some(FORM_FACTOR_SPEAKERS)), AudioDeviceKind::BuiltinSpeaker);
        assert_eq!(device_kind("HDAUDIO", Some(2)), AudioDeviceKind::Other(2));
        assert_eq!(device_kind("", None), AudioDeviceKind::Other(FORM_FACTOR_UNKNOWN));
    }

    #[test]
    fn wired_headset_check() {
        assert!(is_wired_headset(AudioDeviceKind::WiredHeadphones));
        assert!(!is_wired_headset(AudioDeviceKind::BluetoothA2dp));
    }
}
