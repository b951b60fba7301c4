//! Producer side of the notification bridge.

use std::sync::Arc;

use tracing::error;

use super::NOTIFY_TOKEN;
use crate::persistence::NotificationQueue;

/// Appends [`NOTIFY_TOKEN`] to a named queue.
#[derive(Debug, Clone)]
pub struct Notifier {
    queue: Arc<dyn NotificationQueue>,
    key: String,
}

impl Notifier {
    /// Creates a notifier for queue `key`.
    #[must_use]
    pub fn new(queue: Arc<dyn NotificationQueue>, key: impl Into<String>) -> Self {
        Self {
            queue,
            key: key.into(),
        }
    }

    /// Queue this notifier writes to.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Pushes one token. A failed push is logged and otherwise ignored; it
    /// never holds up indexing. Returns whether the push succeeded.
    pub async fn signal(&self) -> bool {
        match self.queue.push(&self.key, NOTIFY_TOKEN).await {
            Ok(()) => true,
            Err(e) => {
                error!(queue = %self.key, error = %e, "failed to push notification token");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryQueue;

    #[tokio::test]
    async fn each_signal_pushes_one_token() {
        let queue = Arc::new(MemoryQueue::new());
        let notifier = Notifier::new(Arc::clone(&queue) as Arc<dyn NotificationQueue>, "k");

        assert!(notifier.signal().await);
        assert!(notifier.signal().await);

        assert_eq!(queue.len("k"), 2);
        assert_eq!(queue.len("other"), 0);
    }
}
