//! Cooperative mission cancellation

use std::sync::Arc;
use tokio::sync::watch;

/// Handle used to ask a running mission to stop.
///
/// Cancellation takes effect at the next phase boundary, or immediately
/// while the mission is waiting on an approval.
#[derive(Debug, Clone)]
pub struct CancellationHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancellationHandle {
    pub fn new() -> Self {
        let (sender, _) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }

    pub(crate) fn subscribe(&self) -> watch::Receiver<bool> {
        self.sender.subscribe()
    }
}

impl Default for CancellationHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolves once cancellation has been requested.
pub(crate) async fn cancelled(receiver: &mut watch::Receiver<bool>) {
    if receiver.wait_for(|c| *c).await.is_err() {
        // Sender gone: nobody can cancel any more.
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_cancel_is_observed() {
        let handle = CancellationHandle::new();
        let mut receiver = handle.subscribe();
        assert!(!handle.is_cancelled());

        let clone = handle.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(5)).await;
            clone.cancel();
        });
        cancelled(&mut receiver).await;
        assert!(handle.is_cancelled());
    }
}
