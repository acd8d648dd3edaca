use zbus::message::Type;

pub const DBUS_INTERFACE_LOCAL: &str = "org.freedesktop.DBus.Local";
pub const DBUS_PATH_LOCAL: &str = "/org/freedesktop/DBus/Local";
pub const DISCONNECTED_MEMBER: &str = "Disconnected";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
    Other,
}

/// One message observed on the bus, detached from the connection it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub kind: MessageKind,
    pub serial: u32,
    pub reply_serial: Option<u32>,
    pub sender: Option<String>,
    pub destination: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
    pub member: Option<String>,
    pub error_name: Option<String>,
    /// Wire encoding of the message, when the transport keeps it.
    pub raw: Option<Vec<u8>>,
}

impl BusMessage {
    pub fn new(kind: MessageKind, serial: u32) -> Self {
        BusMessage {
            kind,
            serial,
            reply_serial: None,
            sender: None,
            destination: None,
            path: None,
            interface: None,
            member: None,
            error_name: None,
            raw: None,
        }
    }

    /// The signal a connection delivers to itself once the bus has gone away.
    pub fn local_disconnect() -> Self {
        let mut msg = BusMessage::new(MessageKind::Signal, 0);
        msg.path = Some(DBUS_PATH_LOCAL.to_string());
        msg.interface = Some(DBUS_INTERFACE_LOCAL.to_string());
        msg.member = Some(DISCONNECTED_MEMBER.to_string());
        msg
    }

    pub fn is_signal(&self, interface: &str, member: &str) -> bool {
        self.kind == MessageKind::Signal
            && self.interface.as_deref() == Some(interface)
            && self.member.as_deref() == Some(member)
    }

    pub fn is_local_disconnect(&self) -> bool {
        self.is_signal(DBUS_INTERFACE_LOCAL, DISCONNECTED_MEMBER)
    }
}

impl From<&zbus::Message> for BusMessage {
    fn from(msg: &zbus::Message) -> Self {
        #[allow(unreachable_patterns)]
        let kind = match msg.message_type() {
            Type::MethodCall => MessageKind::MethodCall,
            Type::MethodReturn => MessageKind::MethodReturn,
            Type::Error => MessageKind::Error,
            Type::Signal => MessageKind::Signal,
            _ => MessageKind::Other,
        };

        let header = msg.header();

        BusMessage {
            kind,
            serial: header.primary().serial_num().get(),
            reply_serial: header.reply_serial().map(|s| s.get()),
            sender: header.sender().map(|s| s.to_string()),
            destination: header.destination().map(|s| s.to_string()),
            path: header.path().map(|s| s.to_string()),
            interface: header.interface().map(|s| s.to_string()),
            member: header.member().map(|s| s.to_string()),
            error_name: header.error_name().map(|s| s.to_string()),
            raw: Some(msg.data().bytes().to_vec()),
        }
    }
}
