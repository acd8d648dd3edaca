use std::{fmt::Display, path::PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusTarget {
    System,
    Session,
    Address(String),
}

impl Display for BusTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BusTarget::System => write!(f, "system bus"),
            BusTarget::Session => write!(f, "session bus"),
            BusTarget::Address(a) => write!(f, "bus at {}", a),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    #[default]
    Profile,
    Binary,
    Pcap,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusSelection {
    pub target: BusTarget,
    /// More than one of `--system`/`--session` was given.
    pub conflict: bool,
}

/// Picks the bus from the last command line positions of `--system` and
/// `--session` and the number of times either was given. The flag given last
/// wins, the system bus is the default.
pub fn resolve_bus(
    system_at: Option<usize>,
    session_at: Option<usize>,
    selections: usize,
) -> BusSelection {
    let target = match (system_at, session_at) {
        (Some(sys), Some(ses)) if ses > sys => BusTarget::Session,
        (None, Some(_)) => BusTarget::Session,
        _ => BusTarget::System,
    };

    BusSelection {
        target,
        conflict: selections > 1,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorConfig {
    pub target: BusTarget,
    pub mode: OutputMode,
    /// Raw filters as given, without the eavesdrop predicate.
    pub filters: Vec<String>,
    pub output: Option<PathBuf>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            target: BusTarget::System,
            mode: OutputMode::Profile,
            filters: Vec::new(),
            output: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_system() {
        let sel = resolve_bus(None, None, 0);
        assert_eq!(sel.target, BusTarget::System);
        assert!(!sel.conflict);

        let cfg = MonitorConfig::default();
        assert_eq!(cfg.target, BusTarget::System);
        assert_eq!(cfg.mode, OutputMode::Profile);
    }

    #[test]
    fn single_selection() {
        assert_eq!(resolve_bus(None, Some(1), 1).target, BusTarget::Session);
        assert_eq!(resolve_bus(Some(3), None, 1).target, BusTarget::System);
        assert!(!resolve_bus(None, Some(1), 1).conflict);
    }

    #[test]
    fn last_one_wins() {
        let sel = resolve_bus(Some(1), Some(2), 2);
        assert_eq!(sel.target, BusTarget::Session);
        assert!(sel.conflict);

        let sel = resolve_bus(Some(4), Some(2), 2);
        assert_eq!(sel.target, BusTarget::System);
        assert!(sel.conflict);

        let sel = resolve_bus(Some(2), None, 2);
        assert_eq!(sel.target, BusTarget::System);
        assert!(sel.conflict);
    }

    #[test]
    fn target_display() {
        assert_eq!(BusTarget::Session.to_string(), "session bus");
        assert_eq!(
            BusTarget::Address("unix:path=/tmp/bus".to_string()).to_string(),
            "bus at unix:path=/tmp/bus"
        );
    }
}
