use std::fmt::Display;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorError {
    InvalidData,
    IOError,
    Connect,
    /// The bus daemon answered `BecomeMonitor` with an error reply.
    Rejected {
        name: String,
        message: String,
    },
    Dispatch,
}

impl Display for MonitorError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorError::Rejected { name, message } => {
                write!(f, "error {}: \"{}\"", name, message)
            }
            _ => {
                let (code, desc) = error_desc(self);
                write!(f, "{}({}).", code, desc)
            }
        }
    }
}

impl std::error::Error for MonitorError {}

pub fn error_desc(error: &MonitorError) -> (i32, &'static str) {
    match error {
        MonitorError::InvalidData => (-1, "Invalid data"),
        MonitorError::IOError => (-2, "IO error"),
        MonitorError::Connect => (-3, "Bus connection error"),
        MonitorError::Rejected { .. } => (-4, "Monitor registration rejected"),
        MonitorError::Dispatch => (-5, "Dispatch error"),
    }
}
