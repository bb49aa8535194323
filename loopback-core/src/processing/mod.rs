pub mod frame_buffer;
pub mod gain;
