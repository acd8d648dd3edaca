#[allow(unused)]
use {
    crate::{message::BusMessage, MessageHandler, MonitorError},
    byteorder::{NativeEndian, WriteBytesExt},
    chrono::{DateTime, Utc},
    error_stack::{Report, Result, ResultExt},
    jlogger_tracing::{jdebug, jerror, jinfo, jtrace, jwarn},
    std::io::Write,
};

/// http://www.tcpdump.org/linktypes.html
pub const LINKTYPE_DBUS: u32 = 231;

const PCAP_MAGIC: u32 = 0xa1b2c3d4;
const PCAP_VERSION_MAJOR: u16 = 2;
const PCAP_VERSION_MINOR: u16 = 4;

/// Largest message the bus allows.
pub const DBUS_MAXIMUM_MESSAGE_LENGTH: u32 = 1 << 27;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureFormat {
    /// Messages back to back as they were on the wire.
    Raw,
    /// libpcap stream, one record per message.
    Pcap,
}

pub struct CaptureWriter<W: Write> {
    out: W,
    format: CaptureFormat,
    started: bool,
    clock: fn() -> DateTime<Utc>,
}

impl<W: Write> CaptureWriter<W> {
    pub fn new(out: W, format: CaptureFormat) -> Self {
        Self::with_clock(out, format, Utc::now)
    }

    pub fn with_clock(out: W, format: CaptureFormat, clock: fn() -> DateTime<Utc>) -> Self {
        CaptureWriter {
            out,
            format,
            started: false,
            clock,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn write_pcap_header(&mut self) -> std::io::Result<()> {
        self.out.write_u32::<NativeEndian>(PCAP_MAGIC)?;
        self.out.write_u16::<NativeEndian>(PCAP_VERSION_MAJOR)?;
        self.out.write_u16::<NativeEndian>(PCAP_VERSION_MINOR)?;
        // thiszone, sigfigs
        self.out.write_i32::<NativeEndian>(0)?;
        self.out.write_u32::<NativeEndian>(0)?;
        self.out
            .write_u32::<NativeEndian>(DBUS_MAXIMUM_MESSAGE_LENGTH)?;
        self.out.write_u32::<NativeEndian>(LINKTYPE_DBUS)?;
        self.out.flush()
    }

    fn write_pcap_record(&mut self, ts_sec: u32, ts_usec: u32, data: &[u8]) -> std::io::Result<()> {
        let len = data.len() as u32;

        self.out.write_u32::<NativeEndian>(ts_sec)?;
        self.out.write_u32::<NativeEndian>(ts_usec)?;
        self.out.write_u32::<NativeEndian>(len)?;
        self.out.write_u32::<NativeEndian>(len)?;
        self.out.write_all(data)?;
        self.out.flush()
    }

    pub fn write_message(&mut self, msg: &BusMessage) -> Result<(), MonitorError> {
        if self.format == CaptureFormat::Pcap && !self.started {
            self.write_pcap_header()
                .map_err(|_| Report::new(MonitorError::IOError))
                .attach_printable("Failed to write pcap header")?;
        }
        self.started = true;

        let data = match msg.raw.as_deref() {
            Some(d) => d,
            None => {
                jdebug!("Skip message {} without wire data", msg.serial);
                return Ok(());
            }
        };

        let ret = match self.format {
            CaptureFormat::Raw => self.out.write_all(data).and_then(|_| self.out.flush()),
            CaptureFormat::Pcap => {
                // pcap record timestamps are unsigned 32 bit seconds.
                let now = (self.clock)();
                let ts_sec = u32::try_from(now.timestamp())
                    .map_err(|_| Report::new(MonitorError::InvalidData))
                    .attach_printable(format!(
                        "Timestamp {} does not fit a pcap record",
                        now.timestamp()
                    ))?;
                self.write_pcap_record(ts_sec, now.timestamp_subsec_micros(), data)
            }
        };

        ret.map_err(|_| Report::new(MonitorError::IOError))
            .attach_printable(format!("Failed to capture message {}", msg.serial))
    }
}

impl<W: Write> MessageHandler for CaptureWriter<W> {
    fn handle(&mut self, msg: &BusMessage) -> Result<(), MonitorError> {
        self.write_message(msg)
    }
}
