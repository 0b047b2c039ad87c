use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use watch_core::model::ProgressKey;

/// Idle entries are swept once the table grows past this many keys.
const PRUNE_THRESHOLD: usize = 1024;

/// One async mutex per progress key.
///
/// Holders of the same key run one at a time; different keys never contend
/// beyond the short critical section on the table itself.
#[derive(Default)]
pub(crate) struct KeyedLocks {
    slots: Mutex<HashMap<ProgressKey, Arc<AsyncMutex<()>>>>,
}

impl KeyedLocks {
    pub(crate) async fn lock(&self, key: &ProgressKey) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().unwrap_or_else(PoisonError::into_inner);
            if slots.len() >= PRUNE_THRESHOLD {
                // Only the table holds an idle slot.
                slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            }
            Arc::clone(slots.entry(key.clone()).or_default())
        };
        slot.lock_owned().await
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
