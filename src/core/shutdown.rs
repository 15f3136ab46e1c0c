use tokio::signal;

/// Resolves when the process is asked to stop. A failed handler install is
/// logged and that source is ignored rather than aborting startup.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => "ctrl-c",
            Err(err) => {
                tracing::error!(error = %err, "Failed to install Ctrl+C handler");
                std::future::pending::<&'static str>().await
            }
        }
    };

    let received = tokio::select! {
        name = ctrl_c => name,
        name = terminate() => name,
    };

    tracing::info!(signal = received, "shutdown signal received");
}

async fn terminate() -> &'static str {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                return "sigterm";
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
            }
        }
    }

    std::future::pending::<&'static str>().await
}
