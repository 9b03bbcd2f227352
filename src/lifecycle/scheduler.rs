use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serenity::all::ChannelId;
use tokio::task::JoinHandle;

struct Entry {
    generation: u64,
    handle: JoinHandle<()>,
}

/// One-shot deletion timers, at most one per room.
///
/// Scheduling always supersedes: an existing timer for the room is
/// cancelled before the new one is armed, so the delay restarts and the
/// callback can fire at most once per armed timer. Timers are process
/// local and intentionally not persisted; reconciliation re-arms them for
/// empty rooms after a restart.
#[derive(Default)]
pub struct DeleteScheduler {
    timers: Arc<Mutex<HashMap<ChannelId, Entry>>>,
    next_generation: AtomicU64,
}

impl DeleteScheduler {
    /// Arm a deletion timer for `room_id`, replacing any pending one.
    pub fn schedule<F>(&self, room_id: ChannelId, delay: Duration, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let timers = Arc::clone(&self.timers);

        let Ok(mut map) = self.timers.lock() else {
            return;
        };
        if let Some(prev) = map.remove(&room_id) {
            prev.handle.abort();
        }
        // Holding the lock across spawn is fine (spawn is synchronous) and
        // guarantees the entry is visible before the task's first poll.
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            {
                let Ok(mut map) = timers.lock() else { return };
                // Only the currently-armed timer may fire; a superseded
                // task that outraced its abort backs off here.
                let armed = map
                    .get(&room_id)
                    .is_some_and(|entry| entry.generation == generation);
                if !armed {
                    return;
                }
                map.remove(&room_id);
            }
            callback.await;
        });
        map.insert(room_id, Entry { generation, handle });
    }

    /// Cancel the pending timer for `room_id`. No-op when none is armed.
    pub fn cancel(&self, room_id: ChannelId) -> bool {
        if let Ok(mut map) = self.timers.lock()
            && let Some(entry) = map.remove(&room_id)
        {
            entry.handle.abort();
            return true;
        }
        false
    }

    pub fn is_pending(&self, room_id: ChannelId) -> bool {
        self.timers
            .lock()
            .map(|map| map.contains_key(&room_id))
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn counter() -> (Arc<AtomicUsize>, impl Fn() -> usize) {
        let c = Arc::new(AtomicUsize::new(0));
        let read = {
            let c = Arc::clone(&c);
            move || c.load(Ordering::SeqCst)
        };
        (c, read)
    }

    fn bump(c: &Arc<AtomicUsize>) -> impl Future<Output = ()> + Send + 'static {
        let c = Arc::clone(c);
        async move {
            c.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_after_the_delay() {
        let s = DeleteScheduler::default();
        let (c, fired) = counter();
        s.schedule(ChannelId::new(1), Duration::from_secs(10), bump(&c));
        assert!(s.is_pending(ChannelId::new(1)));

        tokio::time::sleep(Duration::from_secs(9)).await;
        assert_eq!(fired(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(fired(), 1);
        assert!(!s.is_pending(ChannelId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_suppresses_the_callback() {
        let s = DeleteScheduler::default();
        let (c, fired) = counter();
        s.schedule(ChannelId::new(1), Duration::from_secs(10), bump(&c));
        assert!(s.cancel(ChannelId::new(1)));

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(fired(), 0);
        assert!(!s.is_pending(ChannelId::new(1)));
        // Cancelling again is a no-op
        assert!(!s.cancel(ChannelId::new(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn reschedule_supersedes_and_restarts_the_delay() {
        let s = DeleteScheduler::default();
        let (c, fired) = counter();

        // Armed at t=0 for t=10, superseded at t=5 for t=15
        s.schedule(ChannelId::new(1), Duration::from_secs(10), bump(&c));
        tokio::time::sleep(Duration::from_secs(5)).await;
        s.schedule(ChannelId::new(1), Duration::from_secs(10), bump(&c));

        tokio::time::sleep(Duration::from_secs(6)).await; // t=11
        assert_eq!(fired(), 0);
        tokio::time::sleep(Duration::from_secs(5)).await; // t=16
        assert_eq!(fired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_then_join_then_empty_restarts_from_second_leave() {
        // Room empties at t=0 (10s delay), member joins at t=5, empties
        // again at t=20; deletion must fire once at t=30.
        let s = DeleteScheduler::default();
        let (c, fired) = counter();

        s.schedule(ChannelId::new(7), Duration::from_secs(10), bump(&c));
        tokio::time::sleep(Duration::from_secs(5)).await;
        s.cancel(ChannelId::new(7));

        tokio::time::sleep(Duration::from_secs(15)).await; // t=20
        assert_eq!(fired(), 0);
        s.schedule(ChannelId::new(7), Duration::from_secs(10), bump(&c));

        tokio::time::sleep(Duration::from_secs(9)).await; // t=29
        assert_eq!(fired(), 0);
        tokio::time::sleep(Duration::from_secs(2)).await; // t=31
        assert_eq!(fired(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rooms_are_independent() {
        let s = DeleteScheduler::default();
        let (c1, fired1) = counter();
        let (c2, fired2) = counter();

        s.schedule(ChannelId::new(1), Duration::from_secs(10), bump(&c1));
        s.schedule(ChannelId::new(2), Duration::from_secs(20), bump(&c2));
        s.cancel(ChannelId::new(1));

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(fired1(), 0);
        assert_eq!(fired2(), 1);
    }
}
