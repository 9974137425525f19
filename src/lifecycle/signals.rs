//! OS signal handling.
//!
//! Only SIGINT is handled. The handler is registered synchronously in
//! [`listen`], so calling it before the listener starts guarantees that a
//! signal arriving right after startup is buffered rather than lost.

use std::io;

use crate::lifecycle::shutdown::{Shutdown, TerminationSignal};

/// Register the SIGINT handler and forward the first signal to `shutdown`.
///
/// Later signals are logged and ignored; a shutdown already in progress is
/// never restarted.
#[cfg(unix)]
pub fn listen(shutdown: Shutdown) -> io::Result<tokio::task::JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut interrupt = signal(SignalKind::interrupt())?;

    Ok(tokio::spawn(async move {
        let mut forwarded = false;
        while interrupt.recv().await.is_some() {
            if forwarded {
                tracing::warn!(signal = %TerminationSignal::Interrupt, "Shutdown already in progress, ignoring signal");
                continue;
            }
            forwarded = true;
            if !shutdown.trigger(TerminationSignal::Interrupt) {
                tracing::warn!("Signal received with no shutdown subscriber");
            }
        }
    }))
}

/// Register the Ctrl+C handler and forward it to `shutdown`.
#[cfg(not(unix))]
pub fn listen(shutdown: Shutdown) -> io::Result<tokio::task::JoinHandle<()>> {
    Ok(tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                shutdown.trigger(TerminationSignal::Interrupt);
            }
            Err(e) => tracing::error!(error = %e, "Failed to listen for Ctrl+C"),
        }
    }))
}
