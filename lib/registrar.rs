#[allow(unused)]
use {
    crate::{
        rule::MatchRule,
        transport::{BusTransport, MonitorRequest, BECOME_MONITOR},
        MonitorError,
    },
    error_stack::{Report, Result, ResultExt},
    jlogger_tracing::{jdebug, jerror, jinfo, jtrace, jwarn},
};

/// Switches the connection into monitor mode for `rules`.
///
/// Waits for the daemon's answer with no timeout. Must run once, before any
/// message is read from the connection.
pub async fn become_monitor<T: BusTransport>(
    transport: &mut T,
    rules: Vec<MatchRule>,
) -> Result<(), MonitorError> {
    let request = MonitorRequest::new(rules);

    if request.rules().is_empty() {
        jinfo!("Calling {} without match rules", BECOME_MONITOR);
    }
    for rule in request.rules() {
        jinfo!("Monitor rule: {}", rule);
    }

    transport.call_blocking(request).await?;

    jinfo!("Connection is now a monitor");
    Ok(())
}
