use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes request/reply exchanges over one text channel.
///
/// Replies carry no correlation id, so whoever holds the permit owns the
/// next reply-complete the channel emits. Typed input and voice-forwarded
/// utterances both claim the gate before sending.
#[derive(Debug, Clone, Default)]
pub struct ExchangeGate {
    inner: Arc<Mutex<()>>,
}

/// Proof of ownership of the channel's next reply. Dropping it releases the
/// gate.
#[derive(Debug)]
pub struct ExchangePermit {
    _guard: OwnedMutexGuard<()>,
}

impl ExchangeGate {
    /// A free gate.
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the gate if nobody holds it.
    pub fn try_claim(&self) -> Option<ExchangePermit> {
        self.inner
            .clone()
            .try_lock_owned()
            .ok()
            .map(|guard| ExchangePermit { _guard: guard })
    }

    /// Wait until the gate is free, then claim it.
    pub async fn claim(&self) -> ExchangePermit {
        ExchangePermit {
            _guard: self.inner.clone().lock_owned().await,
        }
    }

    /// Whether an exchange currently holds the gate.
    pub fn is_claimed(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_single_holder() {
        let gate = ExchangeGate::new();
        let permit = gate.try_claim().unwrap();
        assert!(gate.is_claimed());
        assert!(gate.clone().try_claim().is_none());
        drop(permit);
        assert!(!gate.is_claimed());
        assert!(gate.try_claim().is_some());
    }

    #[tokio::test]
    async fn test_claim_waits_for_release() {
        let gate = ExchangeGate::new();
        let permit = gate.try_claim().unwrap();

        let waiter = gate.clone();
        let task = tokio::spawn(async move {
            let _permit = waiter.claim().await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!task.is_finished());

        drop(permit);
        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
    }
}
