use orion_channels::ChannelEvent;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

/// Reply used when a forwarded utterance gets no answer in time.
pub const TOOL_TIMEOUT_REPLY: &str = "Tool execution timed out";

/// Outcome of waiting for the reply to a forwarded utterance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correlated {
    /// The next reply-complete event arrived.
    Reply(String),
    /// Nothing arrived in time, or the channel's event stream ended.
    TimedOut,
    /// The bridge was torn down while waiting.
    Cancelled,
}

impl Correlated {
    /// Text to surface, if the outcome should be surfaced at all.
    pub fn into_reply(self) -> Option<String> {
        match self {
            Correlated::Reply(text) => Some(text),
            Correlated::TimedOut => Some(TOOL_TIMEOUT_REPLY.to_string()),
            Correlated::Cancelled => None,
        }
    }
}

/// Wait for the next `ReplyComplete` on `events`.
///
/// `events` must be subscribed before the utterance is sent so the reply
/// cannot slip past. Any change on `cancel` abandons the wait.
pub async fn await_reply(
    events: &mut broadcast::Receiver<ChannelEvent>,
    timeout: Duration,
    cancel: &mut watch::Receiver<u64>,
) -> Correlated {
    let next_completion = async {
        loop {
            match events.recv().await {
                Ok(ChannelEvent::ReplyComplete { full_text }) => return Some(full_text),
                Ok(other) => debug!(event = ?other, "Ignoring event while awaiting reply"),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Reply watcher lagged behind the channel");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    };

    tokio::select! {
        outcome = tokio::time::timeout(timeout, next_completion) => match outcome {
            Ok(Some(text)) => Correlated::Reply(text),
            Ok(None) => {
                warn!("Channel event stream closed while awaiting reply");
                Correlated::TimedOut
            }
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "Tool execution timed out");
                Correlated::TimedOut
            }
        },
        _ = cancel.changed() => Correlated::Cancelled,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn complete(text: &str) -> ChannelEvent {
        ChannelEvent::ReplyComplete {
            full_text: text.into(),
        }
    }

    #[tokio::test]
    async fn test_first_completion_wins() {
        let (tx, mut rx) = broadcast::channel(16);
        let (_cancel_tx, mut cancel) = watch::channel(0);

        tx.send(ChannelEvent::PartialToken { text: "x".into() }).unwrap();
        tx.send(complete("first")).unwrap();
        tx.send(complete("second")).unwrap();

        let out = await_reply(&mut rx, Duration::from_secs(1), &mut cancel).await;
        assert_eq!(out, Correlated::Reply("first".into()));
    }

    #[tokio::test]
    async fn test_timeout_yields_sentinel() {
        let (_tx, mut rx) = broadcast::channel::<ChannelEvent>(16);
        let (_cancel_tx, mut cancel) = watch::channel(0);

        let out = await_reply(&mut rx, Duration::from_millis(100), &mut cancel).await;
        assert_eq!(out, Correlated::TimedOut);
        assert_eq!(out.into_reply().as_deref(), Some(TOOL_TIMEOUT_REPLY));
    }

    #[tokio::test]
    async fn test_cancel_abandons_wait() {
        let (_tx, mut rx) = broadcast::channel::<ChannelEvent>(16);
        let (cancel_tx, mut cancel) = watch::channel(0u64);

        let waiter = tokio::spawn(async move {
            await_reply(&mut rx, Duration::from_secs(5), &mut cancel).await
        });
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel_tx.send_modify(|epoch| *epoch += 1);

        let out = waiter.await.unwrap();
        assert_eq!(out, Correlated::Cancelled);
        assert!(out.into_reply().is_none());
    }

    #[tokio::test]
    async fn test_closed_stream_times_out_immediately() {
        let (tx, mut rx) = broadcast::channel::<ChannelEvent>(16);
        let (_cancel_tx, mut cancel) = watch::channel(0);
        drop(tx);

        let out = await_reply(&mut rx, Duration::from_secs(5), &mut cancel).await;
        assert_eq!(out, Correlated::TimedOut);
    }
}
