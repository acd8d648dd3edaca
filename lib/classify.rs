use crate::message::{BusMessage, MessageKind};

pub const NONE_PLACEHOLDER: &str = "<none>";

/// Header attributes a trace record can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Attribute {
    Serial = 1,
    ReplySerial = 2,
    Sender = 4,
    Destination = 8,
    Path = 16,
    Interface = 32,
    Member = 64,
    ErrorName = 128,
}

impl Attribute {
    /// Column order of a record.
    pub const PRINT_ORDER: [Attribute; 8] = [
        Attribute::Serial,
        Attribute::Sender,
        Attribute::Destination,
        Attribute::ReplySerial,
        Attribute::Path,
        Attribute::Interface,
        Attribute::Member,
        Attribute::ErrorName,
    ];

    /// Text of this attribute in `msg`, `<none>` when the header lacks it.
    pub fn render(self, msg: &BusMessage) -> String {
        let text = |v: &Option<String>| v.as_deref().unwrap_or(NONE_PLACEHOLDER).to_string();

        match self {
            Attribute::Serial => msg.serial.to_string(),
            Attribute::ReplySerial => msg
                .reply_serial
                .map(|s| s.to_string())
                .unwrap_or_else(|| NONE_PLACEHOLDER.to_string()),
            Attribute::Sender => text(&msg.sender),
            Attribute::Destination => text(&msg.destination),
            Attribute::Path => text(&msg.path),
            Attribute::Interface => text(&msg.interface),
            Attribute::Member => text(&msg.member),
            Attribute::ErrorName => text(&msg.error_name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AttributeSelection(u8);

impl AttributeSelection {
    pub const NONE: AttributeSelection = AttributeSelection(0);

    pub const CALL: AttributeSelection = AttributeSelection(
        Attribute::Serial as u8
            | Attribute::Sender as u8
            | Attribute::Destination as u8
            | Attribute::Path as u8
            | Attribute::Interface as u8
            | Attribute::Member as u8,
    );

    pub const REPLY: AttributeSelection = AttributeSelection(
        Attribute::Serial as u8
            | Attribute::Sender as u8
            | Attribute::Destination as u8
            | Attribute::ReplySerial as u8,
    );

    pub fn contains(&self, attr: Attribute) -> bool {
        self.0 & attr as u8 != 0
    }

    pub fn len(&self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Selected attributes in column order.
    pub fn iter(&self) -> impl Iterator<Item = Attribute> + '_ {
        Attribute::PRINT_ORDER
            .into_iter()
            .filter(move |a| self.contains(*a))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    MethodCall,
    MethodReturn,
    Error,
    Signal,
    Unknown,
}

impl Label {
    pub fn as_str(&self) -> &'static str {
        match self {
            Label::MethodCall => "mc",
            Label::MethodReturn => "mr",
            Label::Error => "err",
            Label::Signal => "sig",
            Label::Unknown => "tun",
        }
    }
}

pub fn classify(kind: MessageKind) -> (Label, AttributeSelection) {
    match kind {
        MessageKind::MethodCall => (Label::MethodCall, AttributeSelection::CALL),
        MessageKind::MethodReturn => (Label::MethodReturn, AttributeSelection::REPLY),
        MessageKind::Error => (Label::Error, AttributeSelection::REPLY),
        MessageKind::Signal => (Label::Signal, AttributeSelection::CALL),
        MessageKind::Other => (Label::Unknown, AttributeSelection::NONE),
    }
}
