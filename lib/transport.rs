#[allow(unused)]
use {
    crate::{config::BusTarget, message::BusMessage, rule::MatchRule, MonitorError},
    error_stack::{Report, Result, ResultExt},
    futures::{Stream, StreamExt},
    jlogger_tracing::{jdebug, jerror, jinfo, jtrace, jwarn},
    std::{collections::VecDeque, io::ErrorKind},
    zbus::{message::Type, Connection, DBusError, MessageStream},
};

pub const DBUS_SERVICE_DBUS: &str = "org.freedesktop.DBus";
pub const DBUS_PATH_DBUS: &str = "/org/freedesktop/DBus";
pub const DBUS_INTERFACE_MONITORING: &str = "org.freedesktop.DBus.Monitoring";
pub const BECOME_MONITOR: &str = "BecomeMonitor";

/// Arguments of `org.freedesktop.DBus.Monitoring.BecomeMonitor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorRequest {
    rules: Vec<MatchRule>,
    flags: u32,
}

impl MonitorRequest {
    pub fn new(rules: Vec<MatchRule>) -> Self {
        // The flags argument is reserved and must be zero.
        MonitorRequest { rules, flags: 0 }
    }

    pub fn rules(&self) -> &[MatchRule] {
        &self.rules
    }

    pub fn flags(&self) -> u32 {
        self.flags
    }

    /// Message body with signature `asu`.
    pub fn body(&self) -> (Vec<&str>, u32) {
        (self.rules.iter().map(|r| r.as_str()).collect(), self.flags)
    }

    pub fn to_message(&self) -> zbus::Result<zbus::Message> {
        zbus::Message::method(DBUS_PATH_DBUS, BECOME_MONITOR)?
            .destination(DBUS_SERVICE_DBUS)?
            .interface(DBUS_INTERFACE_MONITORING)?
            .build(&self.body())
    }
}

/// What the monitor needs from a bus connection.
///
/// Only one operation is ever in flight: the registration call first, then one
/// `next_message` at a time.
#[allow(async_fn_in_trait)]
pub trait BusTransport {
    /// Sends the request to the bus daemon and waits, without a timeout, for
    /// its reply. An error reply becomes `MonitorError::Rejected`.
    async fn call_blocking(&mut self, request: MonitorRequest) -> Result<(), MonitorError>;

    /// Waits for the next inbound message. Losing the bus is reported as the
    /// local `Disconnected` signal rather than as an error.
    async fn next_message(&mut self) -> Result<BusMessage, MonitorError>;

    async fn close(&mut self) -> Result<(), MonitorError>;
}

/// Messages read from the connection.
///
/// Whatever arrives while the registration reply is awaited is kept in
/// `pending` and handed out before anything read later.
struct Inbox<S> {
    pending: VecDeque<BusMessage>,
    stream: Option<S>,
}

impl<S> Inbox<S>
where
    S: Stream<Item = zbus::Result<zbus::Message>> + Unpin,
{
    fn new(stream: S) -> Self {
        Inbox {
            pending: VecDeque::new(),
            stream: Some(stream),
        }
    }

    async fn wait_reply(&mut self, serial: u32) -> Result<(), MonitorError> {
        let stream = self.stream.as_mut().ok_or_else(|| {
            Report::new(MonitorError::Connect).attach_printable("Connection closed")
        })?;

        while let Some(item) = stream.next().await {
            let msg = item.map_err(call_error)?;
            let reply_serial = msg.header().reply_serial().map(|s| s.get());

            if reply_serial == Some(serial) {
                match msg.message_type() {
                    Type::MethodReturn => return Ok(()),
                    Type::Error => return Err(call_error(zbus::Error::from(msg))),
                    _ => {}
                }
            }

            jtrace!("Queue message {} read before the reply", msg.header().primary().serial_num());
            self.pending.push_back(BusMessage::from(&msg));
        }

        Err(Report::new(MonitorError::Connect)).attach_printable(format!(
            "Connection closed before the {} reply",
            BECOME_MONITOR
        ))
    }

    async fn next(&mut self) -> Result<BusMessage, MonitorError> {
        if let Some(msg) = self.pending.pop_front() {
            return Ok(msg);
        }

        let next = match self.stream.as_mut() {
            Some(stream) => stream.next().await,
            None => {
                return Err(Report::new(MonitorError::Dispatch))
                    .attach_printable("Connection closed")
            }
        };

        match next {
            Some(Ok(msg)) => Ok(BusMessage::from(&msg)),
            Some(Err(e)) if is_disconnect(&e) => {
                jdebug!("Bus went away: {}", e);
                self.stream = None;
                Ok(BusMessage::local_disconnect())
            }
            Some(Err(e)) => Err(Report::new(MonitorError::Dispatch).attach_printable(e))
                .attach_printable("Failed to read from the bus"),
            None => {
                jdebug!("Message stream ended");
                self.stream = None;
                Ok(BusMessage::local_disconnect())
            }
        }
    }
}

pub struct ZbusTransport {
    conn: Option<Connection>,
    inbox: Inbox<MessageStream>,
}

impl ZbusTransport {
    pub async fn connect(target: &BusTarget) -> Result<Self, MonitorError> {
        jinfo!("Connecting to {}", target);

        let conn = match target {
            BusTarget::System => Connection::system().await,
            BusTarget::Session => Connection::session().await,
            BusTarget::Address(address) => zbus::connection::Builder::address(address.as_str())
                .map_err(|e| Report::new(MonitorError::InvalidData).attach_printable(e))
                .attach_printable(format!("Invalid bus address {}", address))?
                .build()
                .await,
        }
        .map_err(|e| Report::new(MonitorError::Connect).attach_printable(e))
        .attach_printable(format!("Failed to open a connection to the {}", target))?;

        if let Some(name) = conn.unique_name() {
            jdebug!("Connected as {}", name);
        }

        // The stream only receives what arrives after it exists, so it has to
        // be in place before the registration call goes out.
        let inbox = Inbox::new(MessageStream::from(&conn));

        Ok(ZbusTransport {
            conn: Some(conn),
            inbox,
        })
    }

    fn connection(&self) -> Result<&Connection, MonitorError> {
        self.conn
            .as_ref()
            .ok_or_else(|| Report::new(MonitorError::Dispatch).attach_printable("Connection closed"))
    }
}

/// True when the error only says the other end went away.
fn is_disconnect(e: &zbus::Error) -> bool {
    match e {
        zbus::Error::InputOutput(io) => matches!(
            io.kind(),
            ErrorKind::UnexpectedEof
                | ErrorKind::ConnectionReset
                | ErrorKind::ConnectionAborted
                | ErrorKind::BrokenPipe
        ),
        _ => false,
    }
}

/// Maps a failed registration call. Error replies keep the daemon's name and
/// message, anything else is a connection problem.
fn call_error(e: zbus::Error) -> Report<MonitorError> {
    match e {
        zbus::Error::MethodError(name, message, _) => Report::new(MonitorError::Rejected {
            name: name.to_string(),
            message: message.unwrap_or_default(),
        }),
        zbus::Error::FDO(e) => Report::new(MonitorError::Rejected {
            name: e.name().to_string(),
            message: e.description().unwrap_or_default().to_string(),
        }),
        e => Report::new(MonitorError::Connect)
            .attach_printable(e)
            .attach_printable(format!("{} call failed", BECOME_MONITOR)),
    }
}

impl BusTransport for ZbusTransport {
    async fn call_blocking(&mut self, request: MonitorRequest) -> Result<(), MonitorError> {
        let msg = request
            .to_message()
            .map_err(|e| Report::new(MonitorError::InvalidData).attach_printable(e))
            .attach_printable(format!("Failed to build the {} call", BECOME_MONITOR))?;
        let serial = msg.header().primary().serial_num().get();

        self.connection()?.send(&msg).await.map_err(call_error)?;
        self.inbox.wait_reply(serial).await
    }

    async fn next_message(&mut self) -> Result<BusMessage, MonitorError> {
        self.inbox.next().await
    }

    async fn close(&mut self) -> Result<(), MonitorError> {
        self.inbox.stream = None;

        if let Some(conn) = self.conn.take() {
            conn.close()
                .await
                .map_err(|e| Report::new(MonitorError::IOError).attach_printable(e))
                .attach_printable("Failed to close the bus connection")?;
        }

        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;

    /// In-memory transport replaying a fixed script.
    #[derive(Default)]
    pub(crate) struct ScriptedTransport {
        pub reject: Option<MonitorError>,
        pub inbox: VecDeque<std::result::Result<BusMessage, MonitorError>>,
        /// Block forever instead of disconnecting once the inbox is empty.
        pub hang_when_empty: bool,
        pub requests: Vec<MonitorRequest>,
        pub calls: Vec<&'static str>,
        pub closed: bool,
        pub fail_close: bool,
    }

    impl ScriptedTransport {
        pub fn with_messages(msgs: Vec<BusMessage>) -> Self {
            ScriptedTransport {
                inbox: msgs.into_iter().map(Ok).collect(),
                ..Default::default()
            }
        }
    }

    impl BusTransport for ScriptedTransport {
        async fn call_blocking(&mut self, request: MonitorRequest) -> Result<(), MonitorError> {
            self.calls.push("call_blocking");
            self.requests.push(request);
            match self.reject.clone() {
                Some(e) => Err(Report::new(e)),
                None => Ok(()),
            }
        }

        async fn next_message(&mut self) -> Result<BusMessage, MonitorError> {
            self.calls.push("next_message");
            match self.inbox.pop_front() {
                Some(Ok(msg)) => Ok(msg),
                Some(Err(e)) => Err(Report::new(e)),
                None if self.hang_when_empty => std::future::pending().await,
                None => Ok(BusMessage::local_disconnect()),
            }
        }

        async fn close(&mut self) -> Result<(), MonitorError> {
            self.calls.push("close");
            self.closed = true;
            if self.fail_close {
                return Err(Report::new(MonitorError::IOError))
                    .attach_printable("Failed to close the bus connection");
            }
            Ok(())
        }
    }
}
