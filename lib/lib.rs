#[allow(unused)]
use {
    error_stack::{Report, Result, ResultExt},
    jlogger_tracing::{jdebug, jerror, jinfo, jwarn},
};

pub mod capture;
pub mod classify;
pub mod config;
pub mod error;
pub mod message;
pub mod profile;
pub mod registrar;
pub mod rule;
pub mod session;
pub mod transport;

pub use capture::{CaptureFormat, CaptureWriter};
pub use classify::{classify, Attribute, AttributeSelection, Label};
pub use config::{resolve_bus, BusTarget, MonitorConfig, OutputMode};
pub use error::MonitorError;
pub use message::{BusMessage, MessageKind};
pub use profile::ProfileFormatter;
pub use registrar::become_monitor;
pub use rule::{build_rules, MatchRule};
pub use session::{run_session, SessionEnd};
pub use transport::{BusTransport, MonitorRequest, ZbusTransport};

/// Receives every message the session reads, in arrival order.
pub trait MessageHandler {
    fn handle(&mut self, msg: &BusMessage) -> Result<(), MonitorError>;
}

impl<H: MessageHandler + ?Sized> MessageHandler for Box<H> {
    fn handle(&mut self, msg: &BusMessage) -> Result<(), MonitorError> {
        (**self).handle(msg)
    }
}

/// Builds the handler for `mode` writing to `out`.
pub fn make_handler(
    mode: OutputMode,
    out: Box<dyn std::io::Write>,
) -> Box<dyn MessageHandler> {
    match mode {
        OutputMode::Profile => Box::new(ProfileFormatter::new(out)),
        OutputMode::Binary => Box::new(CaptureWriter::new(out, CaptureFormat::Raw)),
        OutputMode::Pcap => Box::new(CaptureWriter::new(out, CaptureFormat::Pcap)),
    }
}
