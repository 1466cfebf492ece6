use tokio::sync::watch;

/// The writable half of a cancellation signal. Dropping it leaves existing
/// tokens in their last state; call [`CancellationSource::cancel`] instead.
#[derive(Clone)]
pub struct CancellationSource {
    tx: watch::Sender<bool>,
}

/// A cheaply-cloneable handle that can be polled or awaited for
/// cancellation. Passed into `stream_fn` and `Tool::call` so both can react
/// to a cancellation request raised between turns or between tool calls
/// (spec's single-threaded cooperative-cancellation model).
#[derive(Clone)]
pub struct CancellationToken {
    rx: watch::Receiver<bool>,
}

impl CancellationSource {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancellationToken {
        CancellationToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Raise the cancellation flag. Idempotent; further calls are no-ops.
    pub fn cancel(&self) {
        let _ = self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
    }
}

impl Default for CancellationSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancellationToken {
    /// Non-blocking check, used at loop suspension points (turn boundaries,
    /// between tool calls).
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancellation is raised. Already-cancelled tokens
    /// resolve immediately.
    pub async fn cancelled(&mut self) {
        if self.is_cancelled() {
            return;
        }
        while self.rx.changed().await.is_ok() {
            if self.is_cancelled() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn token_observes_cancel() {
        let source = CancellationSource::new();
        let mut token = source.token();
        assert!(!token.is_cancelled());
        source.cancel();
        token.cancelled().await;
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancel_is_idempotent() {
        let source = CancellationSource::new();
        source.cancel();
        source.cancel();
        assert!(source.token().is_cancelled());
    }
}
