use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use serenity::all::{GuildId, UserId};

type Key = (GuildId, UserId);

/// In-flight creation lock set.
///
/// Joining the creator channel can be delivered more than once (duplicate
/// gateway events, rapid re-joins, handler re-entrancy). Holding a permit
/// for a (guild, user) pair makes every later attempt a silent no-op until
/// the first attempt finishes. The set is process-local and starts empty
/// on restart, so a crash never leaves a stale lock.
#[derive(Default)]
pub struct CreationGuard {
    in_flight: Arc<Mutex<HashSet<Key>>>,
}

impl CreationGuard {
    /// Claim the (guild, user) slot. Returns None when a creation is
    /// already in flight for the pair; the caller should drop the event.
    pub fn try_acquire(&self, guild_id: GuildId, user_id: UserId) -> Option<CreationPermit> {
        let mut set = self.in_flight.lock().ok()?;
        if !set.insert((guild_id, user_id)) {
            return None;
        }
        Some(CreationPermit {
            key: (guild_id, user_id),
            in_flight: Arc::clone(&self.in_flight),
        })
    }

    pub fn is_held(&self, guild_id: GuildId, user_id: UserId) -> bool {
        self.in_flight
            .lock()
            .map(|set| set.contains(&(guild_id, user_id)))
            .unwrap_or(false)
    }
}

/// Releases the slot when dropped, on every exit path including errors.
pub struct CreationPermit {
    key: Key,
    in_flight: Arc<Mutex<HashSet<Key>>>,
}

impl Drop for CreationPermit {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> (GuildId, UserId) {
        (GuildId::new(1), UserId::new(2))
    }

    #[test]
    fn second_acquire_is_refused_while_held() {
        let guard = CreationGuard::default();
        let (g, u) = key();
        let permit = guard.try_acquire(g, u);
        assert!(permit.is_some());
        assert!(guard.try_acquire(g, u).is_none());
        assert!(guard.is_held(g, u));
    }

    #[test]
    fn drop_releases_the_slot() {
        let guard = CreationGuard::default();
        let (g, u) = key();
        drop(guard.try_acquire(g, u));
        assert!(!guard.is_held(g, u));
        assert!(guard.try_acquire(g, u).is_some());
    }

    #[test]
    fn release_happens_on_error_paths_too() {
        let guard = CreationGuard::default();
        let (g, u) = key();

        let attempt = |guard: &CreationGuard| -> Result<(), &'static str> {
            let _permit = guard.try_acquire(g, u).ok_or("duplicate")?;
            Err("creation failed")
        };
        assert!(attempt(&guard).is_err());
        // The failed attempt must not leave the pair locked
        assert!(!guard.is_held(g, u));
    }

    #[test]
    fn pairs_are_independent() {
        let guard = CreationGuard::default();
        let _a = guard.try_acquire(GuildId::new(1), UserId::new(2)).unwrap();
        assert!(guard.try_acquire(GuildId::new(1), UserId::new(3)).is_some());
        assert!(guard.try_acquire(GuildId::new(9), UserId::new(2)).is_some());
    }
}
