//! Best-effort replies with optional self-expiry.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// A message the bot can later delete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef {
    pub chat_id: i64,
    pub message_id: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextFormat {
    #[default]
    Markdown,
    /// Sent verbatim, markup and mentions neutralised.
    Plain,
}

/// Outbound side of the chat platform. `chat_id` is the conversation messages go to.
#[async_trait]
pub trait ReplyChannel: Send + Sync {
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        format: TextFormat,
    ) -> anyhow::Result<MessageRef>;

    async fn delete_message(&self, message: MessageRef) -> anyhow::Result<()>;
}

struct PendingDeletion {
    generation: u64,
    handle: AbortHandle,
}

pub struct Notifier {
    channel: Arc<dyn ReplyChannel>,
    pending: Arc<DashMap<MessageRef, PendingDeletion>>,
    generation: AtomicU64,
}

impl Notifier {
    pub fn new(channel: Arc<dyn ReplyChannel>) -> Self {
        Self {
            channel,
            pending: Arc::new(DashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    /// Sends a message. Delivery failures are logged and dropped.
    pub async fn send(&self, chat_id: i64, text: &str, format: TextFormat) -> Option<MessageRef> {
        match self.channel.send_text(chat_id, text, format).await {
            Ok(sent) => Some(sent),
            Err(e) => {
                warn!(chat_id, "Failed to send message: {:?}", e);
                None
            }
        }
    }

    /// Replies to a command. With `expire_after`, both the reply and the triggering
    /// message are removed once the delay passes.
    pub async fn reply(
        &self,
        chat_id: i64,
        trigger: Option<MessageRef>,
        text: &str,
        expire_after: Option<Duration>,
    ) -> Option<MessageRef> {
        let sent = self.send(chat_id, text, TextFormat::Markdown).await?;

        if let Some(delay) = expire_after {
            self.schedule_deletion(sent, delay);
            if let Some(trigger) = trigger {
                self.schedule_deletion(trigger, delay);
            }
        }

        Some(sent)
    }

    /// Deletes `message` after `delay`. Rescheduling a message replaces its timer.
    pub fn schedule_deletion(&self, message: MessageRef, delay: Duration) {
        let channel = self.channel.clone();
        let pending = self.pending.clone();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let (registered_tx, registered_rx) = oneshot::channel::<()>();

        let task = tokio::spawn(async move {
            // The timer only starts once its handle is in `pending`.
            if registered_rx.await.is_err() {
                return;
            }
            sleep(delay).await;
            pending.remove_if(&message, |_, entry| entry.generation == generation);
            if let Err(e) = channel.delete_message(message).await {
                debug!(
                    chat_id = message.chat_id,
                    message_id = message.message_id,
                    "Could not delete expired message: {:?}",
                    e
                );
            }
        });

        let entry = PendingDeletion {
            generation,
            handle: task.abort_handle(),
        };
        if let Some(previous) = self.pending.insert(message, entry) {
            previous.handle.abort();
        }
        let _ = registered_tx.send(());
    }

    /// Returns `true` if a deletion was pending.
    pub fn cancel_deletion(&self, message: MessageRef) -> bool {
        match self.pending.remove(&message) {
            Some((_, entry)) => {
                entry.handle.abort();
                true
            }
            None => false,
        }
    }

    pub fn pending_deletions(&self) -> usize {
        self.pending.len()
    }

    /// Abandons every scheduled deletion.
    pub fn shutdown(&self) {
        let keys: Vec<MessageRef> = self.pending.iter().map(|entry| *entry.key()).collect();
        for key in &keys {
            if let Some((_, entry)) = self.pending.remove(key) {
                entry.handle.abort();
            }
        }
        info!("Abandoned {} pending message deletions", keys.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicI64;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        next_id: AtomicI64,
        sent: Mutex<Vec<(i64, String)>>,
        deleted: Mutex<Vec<MessageRef>>,
        fail_send: bool,
        fail_delete: bool,
    }

    #[async_trait]
    impl ReplyChannel for Recorder {
        async fn send_text(
            &self,
            chat_id: i64,
            text: &str,
            _format: TextFormat,
        ) -> anyhow::Result<MessageRef> {
            if self.fail_send {
                anyhow::bail!("send failed");
            }
            self.sent.lock().unwrap().push((chat_id, text.to_string()));
            Ok(MessageRef {
                chat_id,
                message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1000,
            })
        }

        async fn delete_message(&self, message: MessageRef) -> anyhow::Result<()> {
            self.deleted.lock().unwrap().push(message);
            if self.fail_delete {
                anyhow::bail!("message to delete not found");
            }
            Ok(())
        }
    }

    fn trigger() -> MessageRef {
        MessageRef {
            chat_id: 7,
            message_id: 1,
        }
    }

    #[tokio::test]
    async fn test_reply_without_expiry_is_kept() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone());

        let sent = notifier.reply(7, Some(trigger()), "hello", None).await;

        assert!(sent.is_some());
        assert_eq!(recorder.sent.lock().unwrap().as_slice(), &[(7, "hello".to_string())]);
        assert_eq!(notifier.pending_deletions(), 0);
    }

    #[tokio::test]
    async fn test_expiring_reply_deletes_reply_and_trigger() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone());

        let sent = notifier
            .reply(7, Some(trigger()), "hello", Some(Duration::from_millis(20)))
            .await
            .unwrap();
        assert_eq!(notifier.pending_deletions(), 2);

        sleep(Duration::from_millis(200)).await;

        let deleted = recorder.deleted.lock().unwrap().clone();
        assert_eq!(deleted.len(), 2);
        assert!(deleted.contains(&sent));
        assert!(deleted.contains(&trigger()));
        assert_eq!(notifier.pending_deletions(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_deletion_never_runs() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone());

        notifier.schedule_deletion(trigger(), Duration::from_millis(20));
        assert!(notifier.cancel_deletion(trigger()));
        assert!(!notifier.cancel_deletion(trigger()));

        sleep(Duration::from_millis(100)).await;
        assert!(recorder.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failures_are_swallowed() {
        let recorder = Arc::new(Recorder {
            fail_delete: true,
            ..Default::default()
        });
        let notifier = Notifier::new(recorder.clone());

        notifier
            .reply(7, None, "bye", Some(Duration::from_millis(10)))
            .await
            .unwrap();
        sleep(Duration::from_millis(100)).await;
        assert_eq!(recorder.deleted.lock().unwrap().len(), 1);

        let failing = Notifier::new(Arc::new(Recorder {
            fail_send: true,
            ..Default::default()
        }));
        assert!(failing.send(7, "hi", TextFormat::Plain).await.is_none());
        assert_eq!(failing.pending_deletions(), 0);
    }

    #[tokio::test]
    async fn test_shutdown_abandons_pending_deletions() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone());

        notifier.schedule_deletion(trigger(), Duration::from_millis(50));
        notifier.shutdown();
        assert_eq!(notifier.pending_deletions(), 0);

        sleep(Duration::from_millis(150)).await;
        assert!(recorder.deleted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_immediate_deletions_leave_nothing_pending() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone());

        for message_id in 0..50 {
            notifier.schedule_deletion(
                MessageRef {
                    chat_id: 7,
                    message_id,
                },
                Duration::ZERO,
            );
        }

        sleep(Duration::from_millis(200)).await;
        assert_eq!(notifier.pending_deletions(), 0);
        assert_eq!(recorder.deleted.lock().unwrap().len(), 50);
    }

    #[tokio::test]
    async fn test_rescheduled_deletion_keeps_new_timer() {
        let recorder = Arc::new(Recorder::default());
        let notifier = Notifier::new(recorder.clone());

        notifier.schedule_deletion(trigger(), Duration::from_millis(20));
        notifier.schedule_deletion(trigger(), Duration::from_millis(300));

        sleep(Duration::from_millis(100)).await;
        assert!(recorder.deleted.lock().unwrap().is_empty());
        assert_eq!(notifier.pending_deletions(), 1);

        sleep(Duration::from_millis(400)).await;
        assert_eq!(recorder.deleted.lock().unwrap().as_slice(), &[trigger()]);
        assert_eq!(notifier.pending_deletions(), 0);
    }
}
