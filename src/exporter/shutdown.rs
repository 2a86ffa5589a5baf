use tokio::signal;
use tracing::debug;

/// Resolve on SIGINT or SIGTERM (Ctrl+C only off unix).
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        let mut sigint = signal::unix::signal(signal::unix::SignalKind::interrupt())
            .expect("install SIGINT handler");

        let mut sigterm = signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("install SIGTERM handler");

        tokio::select! {
            _ = sigint.recv()  => debug!("received SIGINT"),
            _ = sigterm.recv() => debug!("received SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = signal::ctrl_c().await;
    }
}
