#[allow(unused)]
use {
    crate::{
        registrar::become_monitor, rule::MatchRule, transport::BusTransport, MessageHandler,
        MonitorError,
    },
    error_stack::{Report, Result, ResultExt},
    jlogger_tracing::{jdebug, jerror, jinfo, jtrace, jwarn},
    std::future::Future,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The connection reported the local `Disconnected` signal.
    Disconnected,
    /// `shutdown` completed.
    Interrupted,
}

/// Registers as a monitor and feeds every message to `handler` until the bus
/// disconnects, `shutdown` resolves or something fails.
///
/// The connection is closed on every way out.
pub async fn run_session<T, H, S>(
    transport: &mut T,
    rules: Vec<MatchRule>,
    handler: &mut H,
    shutdown: S,
) -> Result<SessionEnd, MonitorError>
where
    T: BusTransport,
    H: MessageHandler + ?Sized,
    S: Future<Output = ()>,
{
    if let Err(e) = become_monitor(transport, rules).await {
        if let Err(ce) = transport.close().await {
            jwarn!("{:?}", ce);
        }
        return Err(e);
    }

    tokio::pin!(shutdown);

    let mut count = 0_u64;
    let ret = loop {
        tokio::select! {
            result = transport.next_message() => {
                let msg = match result {
                    Ok(msg) => msg,
                    Err(e) => break Err(e),
                };

                if let Err(e) = handler.handle(&msg) {
                    break Err(e);
                }
                count += 1;

                if msg.is_local_disconnect() {
                    jinfo!("Disconnected from the bus");
                    break Ok(SessionEnd::Disconnected);
                }
            },

            _ = &mut shutdown => {
                jinfo!("Quit");
                break Ok(SessionEnd::Interrupted);
            },
        }
    };

    jdebug!("{} messages handled", count);

    if let Err(e) = transport.close().await {
        jwarn!("{:?}", e);
    }

    ret
}
