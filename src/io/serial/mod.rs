// src/io/serial/mod.rs
//
// Serial transport for line-oriented device sessions.
// Byte-level port access plus streaming text decode.

pub mod decoder;
pub mod port;

pub use decoder::StreamDecoder;
pub use port::{
    list_ports, PhysicalPort, PortOpener, SerialConfig, SerialLink, SerialPortInfo,
    SystemPortOpener,
};
