pub mod loopback;
mod worker;
