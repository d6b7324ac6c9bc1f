//! # Queue Facade

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::backend::QueueBackend;
use crate::error::{Result, StorageError};
use azstore_model::queue::clamp_message_count;
use azstore_model::{QueueMessage, validate_queue_name};

/// Queue operations scoped by queue name
#[derive(Clone)]
pub struct EasyQueue {
    backend: Arc<dyn QueueBackend>,
}

impl EasyQueue {
    pub fn new(backend: Arc<dyn QueueBackend>) -> Self {
        Self { backend }
    }

    /// # Errors
    ///
    /// Returns an error if the queue name is invalid or the service call fails.
    pub async fn create_queue_if_not_exist(&self, queue: &str) -> Result<()> {
        validate_queue_name(queue)?;
        if self.backend.create_queue_if_not_exists(queue).await? {
            info!(queue = %queue, "Queue created");
        }
        Ok(())
    }

    /// # Errors
    ///
    /// Propagates service errors.
    pub async fn queue_exists(&self, queue: &str) -> Result<bool> {
        self.backend.queue_exists(queue).await
    }

    /// # Errors
    ///
    /// Returns an error if the queue name is invalid or the service call fails.
    pub async fn delete_queue_if_exists(&self, queue: &str) -> Result<bool> {
        validate_queue_name(queue)?;
        let deleted = self.backend.delete_queue_if_exists(queue).await?;
        if deleted {
            info!(queue = %queue, "Queue deleted");
        }
        Ok(deleted)
    }

    /// # Errors
    ///
    /// A missing queue is a 404 service error.
    pub async fn send(&self, queue: &str, body: &str) -> Result<QueueMessage> {
        let message = self.backend.send_message(queue, body).await?;
        debug!(queue = %queue, message_id = %message.message_id, "Message sent");
        Ok(message)
    }

    /// Look at up to `max` visible messages without hiding them.
    ///
    /// # Errors
    ///
    /// A missing queue is a 404 service error.
    pub async fn peek(&self, queue: &str, max: usize) -> Result<Vec<QueueMessage>> {
        self.backend.peek_messages(queue, clamp_message_count(max)).await
    }

    /// Take up to `max` visible messages, hiding them for `visibility_timeout`.
    ///
    /// # Errors
    ///
    /// A missing queue is a 404 service error. A visibility timeout above
    /// seven days is a 400.
    pub async fn receive(&self, queue: &str, max: usize, visibility_timeout: Duration) -> Result<Vec<QueueMessage>> {
        let messages = self
            .backend
            .receive_messages(queue, clamp_message_count(max), visibility_timeout)
            .await?;
        debug!(queue = %queue, received = messages.len(), "Messages received");
        Ok(messages)
    }

    /// Delete a received message.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Config` when the message carries no pop
    /// receipt (peeked messages do not); service errors propagate.
    pub async fn delete_message(&self, queue: &str, message: &QueueMessage) -> Result<()> {
        let pop_receipt = message.pop_receipt.as_deref().ok_or_else(|| {
            StorageError::Config(format!(
                "message '{}' has no pop receipt; only received messages can be deleted",
                message.message_id
            ))
        })?;

        self.backend
            .delete_message(queue, &message.message_id, pop_receipt)
            .await?;
        debug!(queue = %queue, message_id = %message.message_id, "Message deleted");
        Ok(())
    }

    /// # Errors
    ///
    /// A missing queue is a 404 service error.
    pub async fn clear(&self, queue: &str) -> Result<()> {
        self.backend.clear_messages(queue).await?;
        info!(queue = %queue, "Queue cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use tokio_test::assert_ok;

    const QUEUE: &str = "work-items";

    async fn setup() -> EasyQueue {
        let queues = EasyQueue::new(Arc::new(InMemoryBackend::new()));
        queues.create_queue_if_not_exist(QUEUE).await.unwrap();
        queues
    }

    #[tokio::test]
    async fn test_lifecycle() {
        let queues = setup().await;
        assert!(queues.queue_exists(QUEUE).await.unwrap());
        assert!(queues.delete_queue_if_exists(QUEUE).await.unwrap());
        assert!(!queues.queue_exists(QUEUE).await.unwrap());
        assert!(queues.send(QUEUE, "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_receive_hides_and_delete_removes() {
        let queues = setup().await;
        for i in 0..3 {
            queues.send(QUEUE, &format!("job-{i}")).await.unwrap();
        }

        let peeked = queues.peek(QUEUE, 0).await.unwrap();
        assert_eq!(peeked.len(), 1);
        assert!(peeked[0].pop_receipt.is_none());
        assert!(queues.delete_message(QUEUE, &peeked[0]).await.is_err());

        let received = queues.receive(QUEUE, 2, Duration::from_secs(30)).await.unwrap();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].body, "job-0");
        assert_eq!(received[0].dequeue_count, 1);

        let remaining = queues.peek(QUEUE, 32).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].body, "job-2");

        for message in &received {
            assert_ok!(queues.delete_message(QUEUE, message).await);
        }

        assert_ok!(queues.clear(QUEUE).await);
        assert!(queues.peek(QUEUE, 32).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_receive_rejects_oversized_visibility_timeout() {
        let queues = setup().await;
        queues.send(QUEUE, "job").await.unwrap();

        let err = queues
            .receive(QUEUE, 1, Duration::from_secs(u64::MAX))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert_eq!(queues.peek(QUEUE, 1).await.unwrap().len(), 1);
    }
}
