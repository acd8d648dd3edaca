#[allow(unused)]
use {
    crate::{
        classify::classify,
        message::BusMessage,
        MessageHandler, MonitorError,
    },
    chrono::{DateTime, Utc},
    error_stack::{Report, Result, ResultExt},
    jlogger_tracing::{jdebug, jerror, jinfo, jtrace, jwarn},
    std::io::Write,
};

const HEADER_COLUMNS: &str = "#type\ttimestamp\tserial\tsender\tdestination\tpath\tinterface\tmember";
const HEADER_REPLY: &str = "#\t\t\t\t\tin_reply_to";

pub type Clock = fn() -> DateTime<Utc>;

/// Writes the tab separated profile trace.
///
/// The two header lines go out right before the first record and never again
/// for the life of the formatter.
pub struct ProfileFormatter<W: Write> {
    out: W,
    headed: bool,
    clock: Clock,
}

impl<W: Write> ProfileFormatter<W> {
    pub fn new(out: W) -> Self {
        Self::with_clock(out, Utc::now)
    }

    pub fn with_clock(out: W, clock: Clock) -> Self {
        ProfileFormatter {
            out,
            headed: false,
            clock,
        }
    }

    pub fn headed(&self) -> bool {
        self.headed
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn print_headers(&mut self) -> Result<(), MonitorError> {
        writeln!(self.out, "{}", HEADER_COLUMNS)
            .and_then(|_| writeln!(self.out, "{}", HEADER_REPLY))
            .map_err(|_| Report::new(MonitorError::IOError))
            .attach_printable("Failed to write profile header")?;
        self.headed = true;
        Ok(())
    }

    pub fn emit(&mut self, msg: &BusMessage) -> Result<(), MonitorError> {
        if !self.headed {
            self.print_headers()?;
        }

        let now = (self.clock)();
        let (label, attrs) = classify(msg.kind);

        let mut line = format!(
            "{}\t{}.{:06}",
            label.as_str(),
            now.timestamp(),
            now.timestamp_subsec_micros()
        );
        for attr in attrs.iter() {
            line.push('\t');
            line.push_str(&attr.render(msg));
        }
        line.push('\n');

        jtrace!(record = line.trim_end());

        self.out
            .write_all(line.as_bytes())
            .and_then(|_| self.out.flush())
            .map_err(|_| Report::new(MonitorError::IOError))
            .attach_printable(format!("Failed to write record for serial {}", msg.serial))
    }
}

impl<W: Write> MessageHandler for ProfileFormatter<W> {
    fn handle(&mut self, msg: &BusMessage) -> Result<(), MonitorError> {
        self.emit(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageKind;
    use chrono::TimeZone;

    fn fixed_clock() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 42_000).unwrap()
    }

    fn lines(f: &ProfileFormatter<Vec<u8>>) -> Vec<String> {
        String::from_utf8(f.get_ref().clone())
            .unwrap()
            .lines()
            .map(|l| l.to_string())
            .collect()
    }

    #[test]
    fn header_once() {
        let mut f = ProfileFormatter::with_clock(Vec::new(), fixed_clock);
        assert!(!f.headed());

        for serial in 1..=3 {
            f.emit(&BusMessage::new(MessageKind::Other, serial)).unwrap();
        }
        assert!(f.headed());

        let out = lines(&f);
        assert_eq!(out.len(), 5);
        assert_eq!(out[0], HEADER_COLUMNS);
        assert_eq!(out[1], HEADER_REPLY);
        assert_eq!(out.iter().filter(|l| l.starts_with('#')).count(), 2);
        assert_eq!(out[2], "tun\t1700000000.000042");
    }

    #[test]
    fn signal_record() {
        let mut f = ProfileFormatter::with_clock(Vec::new(), fixed_clock);
        let mut msg = BusMessage::new(MessageKind::Signal, 9);
        msg.sender = Some(":1.12".to_string());
        msg.path = Some("/com/example/Foo".to_string());
        msg.interface = Some("com.example.Foo".to_string());
        msg.member = Some("Changed".to_string());
        f.emit(&msg).unwrap();

        assert_eq!(
            lines(&f)[2],
            "sig\t1700000000.000042\t9\t:1.12\t<none>\t/com/example/Foo\tcom.example.Foo\tChanged"
        );
    }

    #[test]
    fn field_count_stable_per_label() {
        let mut f = ProfileFormatter::new(Vec::new());

        let mut full = BusMessage::new(MessageKind::MethodReturn, 4);
        full.sender = Some("org.freedesktop.DBus".to_string());
        full.destination = Some(":1.7".to_string());
        full.reply_serial = Some(2);
        f.emit(&full).unwrap();
        f.emit(&BusMessage::new(MessageKind::MethodReturn, 5)).unwrap();
        f.emit(&BusMessage::new(MessageKind::MethodCall, 6)).unwrap();
        f.emit(&BusMessage::new(MessageKind::Error, 8)).unwrap();

        let out = lines(&f);
        let records: Vec<Vec<&str>> = out[2..].iter().map(|l| l.split('\t').collect()).collect();

        assert_eq!(records[0].len(), 6);
        assert_eq!(records[1].len(), 6);
        assert_eq!(records[2].len(), 8);
        assert_eq!(records[3].len(), 6);
        assert_eq!(records[0][5], "2");
        assert_eq!(records[1][5], "<none>");
        assert!(records.iter().flatten().all(|field| !field.is_empty()));
    }

    #[test]
    fn timestamp_has_six_digit_micros() {
        let mut f = ProfileFormatter::new(Vec::new());
        f.emit(&BusMessage::new(MessageKind::Other, 1)).unwrap();

        let out = lines(&f);
        let ts = out[2].split('\t').nth(1).unwrap();
        let (secs, micros) = ts.split_once('.').unwrap();
        assert!(secs.parse::<i64>().unwrap() > 0);
        assert_eq!(micros.len(), 6);
    }
}
