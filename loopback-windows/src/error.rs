use thiserror::Error;

use audio_loopback_core::models::error::{DeviceError, EndpointKind, RoutingError};

/// Failure inside a WASAPI / MMDevice call.
#[derive(Debug, Error)]
pub enum WasapiError {
    #[error("{context} failed: {source}")]
    Com {
        context: &'static str,
        #[source]
        source: windows::core::Error,
    },

    #[error("no active {0} endpoint")]
    NoEndpoint(EndpointKind),
}

impl WasapiError {
    pub fn code(&self) -> Option<windows::core::HRESULT> {
        match self {
            Self::Com { source, .. } => Some(source.code()),
            Self::NoEndpoint(_) => None,
        }
    }
}

/// Attach a call-site label to a `windows::core::Result`.
pub(crate) trait ComContext<T> {
    fn context(self, context: &'static str) -> Result<T, WasapiError>;
}

impl<T> ComContext<T> for windows::core::Result<T> {
    fn context(self, context: &'static str) -> Result<T, WasapiError> {
        self.map_err(|source| WasapiError::Com { context, source })
    }
}

impl From<WasapiError> for DeviceError {
    fn from(e: WasapiError) -> Self {
        DeviceError::Backend(e.to_string())
    }
}

impl From<WasapiError> for RoutingError {
    fn from(e: WasapiError) -> Self {
        RoutingError::Platform(e.to_string())
    }
}
