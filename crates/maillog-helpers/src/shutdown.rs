use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Cancels `token` on SIGTERM or SIGINT.
///
/// Returns early without cancelling when the token is cancelled elsewhere,
/// so a finished scan does not leave the listener parked.
pub async fn listen_shutdown(token: CancellationToken) {
    tokio::select! {
        _ = token.cancelled() => {}
        signal = wait_for_signal() => {
            warn!("shutdown signal received: {signal}");
            token.cancel();
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    let (mut sigterm, mut sigint) =
        match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
            (Ok(sigterm), Ok(sigint)) => (sigterm, sigint),
            (Err(err), _) | (_, Err(err)) => {
                warn!("failed to install signal handlers: error={err}");
                return ctrl_c().await;
            }
        };

    tokio::select! {
        _ = sigterm.recv() => "SIGTERM",
        _ = sigint.recv() => "SIGINT",
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("failed to wait for ctrl-c: error={err}");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
