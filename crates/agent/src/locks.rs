//! Per-conversation write serialization.
//!
//! A turn holds its conversation's lock across read-merge-write, so two
//! concurrent turns on the same conversation apply in some serial order
//! while distinct conversations never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, OwnedMutexGuard};

use sakan_core::state::ConversationId;

#[derive(Default)]
pub struct ConversationLocks {
    locks: Mutex<HashMap<ConversationId, Arc<Mutex<()>>>>,
}

impl ConversationLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for one conversation, creating it on first use.
    /// The guard owns its mutex, so the registry lock is held only for
    /// the map lookup.
    pub async fn acquire(&self, id: &ConversationId) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(*id).or_insert_with(|| Arc::new(Mutex::new(()))))
        };
        lock.lock_owned().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_conversation_serializes() {
        let locks = Arc::new(ConversationLocks::new());
        let id = ConversationId::new();
        let counter = Arc::new(std::sync::atomic::AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let locks = Arc::clone(&locks);
            let counter = Arc::clone(&counter);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire(&id).await;
                let seen = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
                tokio::task::yield_now().await;
                // No other task advanced the counter while we held the lock.
                assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), seen + 1);
            }));
        }
        for handle in handles {
            handle.await.expect("turn task");
        }
        assert_eq!(counter.load(std::sync::atomic::Ordering::SeqCst), 8);
    }

    #[tokio::test]
    async fn distinct_conversations_do_not_contend() {
        let locks = ConversationLocks::new();
        let a = ConversationId::new();
        let b = ConversationId::new();
        let _guard_a = locks.acquire(&a).await;
        // Acquiring a different conversation's lock must not block.
        let _guard_b = locks.acquire(&b).await;
    }
}
