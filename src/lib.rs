// src/lib.rs
//
// seriline: line-delimited serial sessions with microcontroller peers.
// One session owns one connection; decoded text lands in a Monitor and
// status transitions reach a host-supplied sink.

#[macro_use]
pub mod logging;

pub mod credentials;
pub mod io;
pub mod monitor;
pub mod session;
pub mod settings;

pub use io::error::LinkError;
pub use io::serial::{
    list_ports, PortOpener, SerialConfig, SerialLink, SerialPortInfo, StreamDecoder,
    SystemPortOpener,
};
pub use monitor::Monitor;
pub use session::{LogSink, SerialSession, SessionConfig, SessionState, StatusSink};
pub use settings::AppSettings;
