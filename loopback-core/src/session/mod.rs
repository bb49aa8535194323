pub mod device_session;
