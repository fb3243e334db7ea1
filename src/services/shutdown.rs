//! Process-wide shutdown signal.
//!
//! A `watch` channel carrying `true` once shutdown has begun. Late
//! subscribers still observe the current value.

use std::time::Duration;
use tokio::sync::watch;

pub type ShutdownSender = watch::Sender<bool>;
pub type ShutdownReceiver = watch::Receiver<bool>;

pub fn channel() -> (ShutdownSender, ShutdownReceiver) {
    watch::channel(false)
}

pub fn is_shutdown(rx: &ShutdownReceiver) -> bool {
    *rx.borrow()
}

/// Resolve once shutdown has begun. Never resolves if the sender is gone
/// without signalling.
pub async fn wait(rx: &mut ShutdownReceiver) {
    loop {
        if is_shutdown(rx) {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Sleep for `delay` unless shutdown fires first. Returns `true` on shutdown.
pub async fn sleep_or_shutdown(delay: Duration, rx: &mut ShutdownReceiver) -> bool {
    if is_shutdown(rx) {
        return true;
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return false,
            changed = rx.changed() => match changed {
                Ok(()) if is_shutdown(rx) => return true,
                Ok(()) => continue,
                // Sender gone: nobody can signal shutdown any more.
                Err(_) => {
                    (&mut sleep).await;
                    return false;
                }
            },
        }
    }
}
