pub mod audio_backend;
pub mod delegate;
pub mod endpoint;
pub mod routing_platform;
