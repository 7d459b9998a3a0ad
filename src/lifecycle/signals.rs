//! OS signal handling.
//!
//! Translates ctrl-c / SIGTERM into the internal shutdown signal.

use crate::lifecycle::shutdown::Shutdown;

/// Spawn a task that triggers shutdown on ctrl-c.
pub fn spawn_signal_listener(shutdown: &Shutdown) {
    let trigger = shutdown.trigger_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown signal received");
            let _ = trigger.send(());
        }
    });
}
