pub mod admission;
pub mod guard;
pub mod ownership;
pub mod scheduler;

use std::sync::Arc;

use serenity::all::Context as SerenityContext;
use serenity::prelude::TypeMapKey;

pub use guard::CreationGuard;
pub use scheduler::DeleteScheduler;

/// Process-local lifecycle state: the deletion timer set and the creation
/// dedup lock set. Both are caches of intent, never authoritative; the
/// database is the source of truth and this state is rebuilt from it at
/// startup by reconciliation.
///
/// Owned by one instance injected through the client's data map so tests
/// can construct independent instances.
#[derive(Default)]
pub struct Lifecycle {
    pub guard: CreationGuard,
    pub scheduler: DeleteScheduler,
}

impl Lifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(ctx: &SerenityContext) -> Arc<Lifecycle> {
        ctx.data
            .read()
            .await
            .get::<LifecycleKey>()
            .cloned()
            .expect("Lifecycle inserted at client init")
    }
}

pub struct LifecycleKey;

impl TypeMapKey for LifecycleKey {
    type Value = Arc<Lifecycle>;
}

/// Current time as epoch milliseconds, the unit all cooldown and claim
/// arithmetic is defined over.
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
