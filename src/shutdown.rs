use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;

/// Cancel the returned token on SIGTERM or SIGINT.
///
/// Callers watch the token and kill their in-flight jobs when it fires.
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let fired = token.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM, killing running jobs");
            }
            _ = sigint.recv() => {
                tracing::info!("Received SIGINT, killing running jobs");
            }
        }
        fired.cancel();
    });

    Ok(token)
}
