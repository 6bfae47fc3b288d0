//! Tiering combinators: backing, pushing and combining storages.
//!
//! A *front* tier is consulted first; a *back* tier is the fallback. Reads
//! fall through front → back, optionally pulling the found value into the
//! front. Writes go to one tier and are pushed to the other, aborting as
//! soon as the first attempted tier fails so that tiers never silently
//! diverge.

use serde::{Deserialize, Serialize};

use crate::config::CombinationConfig;
use crate::error::StorageResult;
use crate::storage::{ReadOnlyStorage, Storage, WriteOnlyStorage};
use crate::trace_decision;
use crate::traits::{ReadWrite, Readable, StorageKey, StorageValue, Writable};

/// When a value found in the back tier is copied into the front tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullStrategy {
    /// Write the value into the front, then complete.
    #[default]
    PullThenComplete,
    /// Complete immediately; write into the front in the background.
    CompleteThenPull,
    /// Never write back into the front.
    NeverPull,
}

impl PullStrategy {
    /// Whether a back-tier hit is copied into the front tier.
    #[must_use]
    pub fn pulls(self) -> bool {
        !matches!(self, Self::NeverPull)
    }
}

/// Which tiers a write goes to, and in which order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetStrategy {
    /// Write the front; on success push to the back.
    #[default]
    FrontFirst,
    /// Write the back; on success push to the front.
    BackFirst,
    /// Write the front only.
    FrontOnly,
    /// Write the back only.
    BackOnly,
}

impl SetStrategy {
    /// Whether a write reaches the back tier.
    #[must_use]
    pub fn pushes_to_back(self) -> bool {
        !matches!(self, Self::FrontOnly)
    }
}

/// Name of a two-tier composite: `<->` pulls and pushes, `<-` only pulls,
/// `->` only pushes, `-` does neither.
pub(crate) fn composite_name(front: &str, back: &str, pulling: bool, pushing: bool) -> String {
    let sign = match (pulling, pushing) {
        (true, true) => "<->",
        (true, false) => "<-",
        (false, true) => "->",
        (false, false) => "-",
    };
    format!("{front}{sign}{back}")
}

/// Front-then-back read. `pull_into` is the front's write half, if any.
async fn retrieve_backed<K: StorageKey, V: StorageValue>(
    front: ReadOnlyStorage<K, V>,
    back: ReadOnlyStorage<K, V>,
    pull_into: Option<(WriteOnlyStorage<K, V>, PullStrategy)>,
    key: K,
) -> StorageResult<V> {
    match front.retrieve(key.clone()).await {
        Ok(value) => {
            trace_decision!(storage = front.name(), "hit");
            return Ok(value);
        }
        Err(error) => {
            trace_decision!(
                storage = front.name(),
                %error,
                "miss, retrieving from {}",
                back.name()
            );
        }
    }

    let value = match back.retrieve(key.clone()).await {
        Ok(value) => value,
        Err(error) => {
            trace_decision!(
                storage = back.name(),
                %error,
                "miss in final tier, completing with failure"
            );
            return Err(error);
        }
    };

    let Some((front_write, strategy)) = pull_into else {
        return Ok(value);
    };

    match strategy {
        PullStrategy::PullThenComplete => {
            trace_decision!(storage = back.name(), "hit, setting value back to {}", front_write.name());
            // A failed write-back must not override the successful read.
            if let Err(error) = front_write.set(value.clone(), key).await {
                trace_decision!(storage = front_write.name(), %error, "write-back failed");
            }
        }
        PullStrategy::CompleteThenPull => {
            trace_decision!(storage = back.name(), "hit, completing, then setting value back to {}", front_write.name());
            detach_write_back(front_write, value.clone(), key).await;
        }
        PullStrategy::NeverPull => {
            trace_decision!(storage = back.name(), "hit, not pulling");
        }
    }
    Ok(value)
}

/// Runs the write-back on the ambient tokio runtime without waiting for it.
///
/// Outside a runtime there is nothing to detach onto, so the write-back is
/// awaited in place.
async fn detach_write_back<K: StorageKey, V: StorageValue>(
    front_write: WriteOnlyStorage<K, V>,
    value: V,
    key: K,
) {
    let name = front_write.name().to_owned();
    let write_back = async move {
        if let Err(error) = front_write.set(value, key).await {
            trace_decision!(storage = %name, %error, "background write-back failed");
        }
    };
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(write_back);
        }
        Err(_) => write_back.await,
    }
}

/// Sets `first`; only if that succeeds, sets `then`.
async fn set_pushing<K: StorageKey, V: StorageValue>(
    first: WriteOnlyStorage<K, V>,
    then: WriteOnlyStorage<K, V>,
    value: V,
    key: K,
) -> StorageResult<()> {
    if let Err(error) = first.set(value.clone(), key.clone()).await {
        trace_decision!(storage = first.name(), %error, "set failed, aborting");
        return Err(error);
    }
    trace_decision!(storage = first.name(), "set succeeded, pushing to {}", then.name());
    then.set(value, key).await
}

async fn set_with_strategy<K: StorageKey, V: StorageValue>(
    front: WriteOnlyStorage<K, V>,
    back: WriteOnlyStorage<K, V>,
    strategy: SetStrategy,
    value: V,
    key: K,
) -> StorageResult<()> {
    match strategy {
        SetStrategy::FrontFirst => set_pushing(front, back, value, key).await,
        SetStrategy::BackFirst => set_pushing(back, front, value, key).await,
        SetStrategy::FrontOnly => front.set(value, key).await,
        SetStrategy::BackOnly => back.set(value, key).await,
    }
}

fn backed_read<K: StorageKey, V: StorageValue>(
    name: &str,
    front: ReadOnlyStorage<K, V>,
    back: ReadOnlyStorage<K, V>,
    pull_into: Option<(WriteOnlyStorage<K, V>, PullStrategy)>,
) -> ReadOnlyStorage<K, V> {
    ReadOnlyStorage::new(name, move |key| {
        retrieve_backed(front.clone(), back.clone(), pull_into.clone(), key)
    })
}

fn strategy_write<K: StorageKey, V: StorageValue>(
    name: &str,
    front: WriteOnlyStorage<K, V>,
    back: WriteOnlyStorage<K, V>,
    strategy: SetStrategy,
) -> WriteOnlyStorage<K, V> {
    WriteOnlyStorage::new(name, move |value, key| {
        set_with_strategy(front.clone(), back.clone(), strategy, value, key)
    })
}

impl<K: StorageKey, V: StorageValue> ReadOnlyStorage<K, V> {
    /// Falls back to `back` when this storage misses.
    ///
    /// `back` is consulted only after this storage failed; its error is the
    /// one reported when both miss. A read-only front has nowhere to pull
    /// into, so nothing is written back.
    #[must_use]
    pub fn backed_by(self, back: impl Readable<K, V> + 'static) -> Self {
        let back = back.into_read_only();
        let name = composite_name(self.name(), back.name(), true, false);
        backed_read(&name, self, back, None)
    }
}

impl<K: StorageKey, V: StorageValue> WriteOnlyStorage<K, V> {
    /// Pushes every successful write on to `back`.
    ///
    /// When this storage fails to set, `back` is never written and the
    /// failure is reported as is.
    #[must_use]
    pub fn pushing_to(self, back: impl Writable<K, V> + 'static) -> Self {
        let back = back.into_write_only();
        let name = composite_name(self.name(), back.name(), false, true);
        strategy_write(&name, self, back, SetStrategy::FrontFirst)
    }
}

impl<K: StorageKey, V: StorageValue> Storage<K, V> {
    /// Falls back to `back` on a read miss, pulling per `pull_strategy`.
    ///
    /// Writes go to this storage only.
    #[must_use]
    pub fn backed_by(self, back: impl Readable<K, V> + 'static, pull_strategy: PullStrategy) -> Self {
        let back = back.into_read_only();
        let name = composite_name(self.name(), back.name(), pull_strategy.pulls(), false);
        let (front_read, front_write) = self.into_halves();
        let read = backed_read(
            &name,
            front_read,
            back,
            Some((front_write.clone(), pull_strategy)),
        );
        Self::from_parts(name, read, front_write)
    }

    /// Writes to both tiers per `set_strategy`; reads this storage only.
    #[must_use]
    pub fn pushing_to(self, back: impl Writable<K, V> + 'static, set_strategy: SetStrategy) -> Self {
        let back = back.into_write_only();
        let name = composite_name(self.name(), back.name(), false, set_strategy.pushes_to_back());
        let (front_read, front_write) = self.into_halves();
        let write = strategy_write(&name, front_write, back, set_strategy);
        Self::from_parts(name, front_read, write)
    }

    /// Layers this storage in front of `back` for both reads and writes.
    #[must_use]
    pub fn combined(
        self,
        back: impl ReadWrite<K, V> + 'static,
        pull_strategy: PullStrategy,
        set_strategy: SetStrategy,
    ) -> Self {
        let back = back.into_storage();
        let name = composite_name(
            self.name(),
            back.name(),
            pull_strategy.pulls(),
            set_strategy.pushes_to_back(),
        );
        let (front_read, front_write) = self.into_halves();
        let (back_read, back_write) = back.into_halves();
        let read = backed_read(
            &name,
            front_read,
            back_read,
            Some((front_write.clone(), pull_strategy)),
        );
        let write = strategy_write(&name, front_write, back_write, set_strategy);
        Self::from_parts(name, read, write)
    }

    /// [`combined`](Self::combined) with the strategies of `config`.
    #[must_use]
    pub fn combined_with(self, back: impl ReadWrite<K, V> + 'static, config: &CombinationConfig) -> Self {
        self.combined(back, config.pull_strategy, config.set_strategy)
    }

    /// [`combined`](Self::combined) with the default strategies:
    /// pull-then-complete and front-first.
    #[must_use]
    pub fn combined_default(self, back: impl ReadWrite<K, V> + 'static) -> Self {
        self.combined(back, PullStrategy::default(), SetStrategy::default())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use proptest::prelude::*;
    use tokio::sync::Notify;

    use super::*;
    use crate::error::StorageError;
    use crate::memory::MemoryStorage;
    use crate::traits::StorageDesign;

    /// Counts calls and delegates to an inner memory storage.
    #[derive(Clone)]
    struct Spy {
        inner: MemoryStorage<u32, String>,
        retrieves: Arc<AtomicUsize>,
        sets: Arc<AtomicUsize>,
    }

    impl Spy {
        fn new(name: &str) -> Self {
            Self {
                inner: MemoryStorage::new().named(name),
                retrieves: Arc::new(AtomicUsize::new(0)),
                sets: Arc::new(AtomicUsize::new(0)),
            }
        }

        fn storage(&self) -> Storage<u32, String> {
            let read_inner = self.inner.clone();
            let write_inner = self.inner.clone();
            let retrieves = Arc::clone(&self.retrieves);
            let sets = Arc::clone(&self.sets);
            Storage::new(
                self.inner.storage_name().to_owned(),
                move |key| {
                    retrieves.fetch_add(1, Ordering::SeqCst);
                    let inner = read_inner.clone();
                    async move { inner.retrieve(key).await }
                },
                move |value, key| {
                    sets.fetch_add(1, Ordering::SeqCst);
                    let inner = write_inner.clone();
                    async move { inner.set(value, key).await }
                },
            )
        }

        fn retrieves(&self) -> usize {
            self.retrieves.load(Ordering::SeqCst)
        }

        fn sets(&self) -> usize {
            self.sets.load(Ordering::SeqCst)
        }
    }

    fn failing_writes(name: &str) -> Storage<u32, String> {
        Storage::from_halves(
            MemoryStorage::<u32, String>::new().named(name).into_read_only(),
            WriteOnlyStorage::new(name, |_, _| async { Err(StorageError::ReadOnly) }),
        )
        .renaming(name)
    }

    // --- backed ---

    #[tokio::test]
    async fn front_hit_never_consults_back() {
        let front = MemoryStorage::<u32, String>::new();
        front.set("front".into(), 1).await.unwrap();
        let back = Spy::new("back");

        let backed = front.into_read_only().backed_by(back.storage());
        assert_eq!(backed.retrieve(1).await.unwrap(), "front");
        assert_eq!(back.retrieves(), 0);
    }

    #[tokio::test]
    async fn front_miss_falls_through_to_back() {
        let front = MemoryStorage::<u32, String>::new();
        let back = MemoryStorage::<u32, String>::new();
        back.set("back".into(), 1).await.unwrap();

        let backed = front.into_read_only().backed_by(back);
        assert_eq!(backed.retrieve(1).await.unwrap(), "back");
    }

    #[tokio::test]
    async fn both_missing_reports_back_error() {
        let front = MemoryStorage::<u32, String>::new().into_read_only();
        let backed = front.backed_by(ReadOnlyStorage::empty());
        assert!(matches!(backed.retrieve(1).await, Err(StorageError::Empty)));
    }

    #[tokio::test]
    async fn pull_then_complete_writes_back_before_completing() {
        let front = MemoryStorage::<u32, String>::new();
        let back = MemoryStorage::<u32, String>::new();
        back.set("back".into(), 7).await.unwrap();

        let storage = front
            .clone()
            .into_storage()
            .backed_by(back, PullStrategy::PullThenComplete);
        assert_eq!(storage.retrieve(7).await.unwrap(), "back");
        assert_eq!(front.retrieve(7).await.unwrap(), "back");
    }

    #[tokio::test]
    async fn never_pull_leaves_front_untouched() {
        let front = MemoryStorage::<u32, String>::new();
        let back = MemoryStorage::<u32, String>::new();
        back.set("back".into(), 7).await.unwrap();

        let storage = front
            .clone()
            .into_storage()
            .backed_by(back, PullStrategy::NeverPull);
        assert_eq!(storage.retrieve(7).await.unwrap(), "back");
        assert!(matches!(front.retrieve(7).await, Err(StorageError::NoValue)));
    }

    #[tokio::test]
    async fn complete_then_pull_eventually_writes_back() {
        let front = MemoryStorage::<u32, String>::new();
        let back = MemoryStorage::<u32, String>::new();
        back.set("back".into(), 7).await.unwrap();

        let storage = front
            .clone()
            .into_storage()
            .backed_by(back, PullStrategy::CompleteThenPull);
        assert_eq!(storage.retrieve(7).await.unwrap(), "back");

        for _ in 0..100 {
            if front.retrieve(7).await.is_ok() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("write-back never reached the front tier");
    }

    #[tokio::test]
    async fn complete_then_pull_completes_before_the_write_back() {
        let front = MemoryStorage::<u32, String>::new();
        let back = MemoryStorage::<u32, String>::new();
        back.set("back".into(), 7).await.unwrap();

        let release = Arc::new(Notify::new());
        let gated_front = {
            let front = front.clone();
            let release = Arc::clone(&release);
            WriteOnlyStorage::new("front", move |value, key| {
                let front = front.clone();
                let release = Arc::clone(&release);
                async move {
                    release.notified().await;
                    front.set(value, key).await
                }
            })
        };
        let storage = Storage::from_halves(front.clone().into_read_only(), gated_front)
            .backed_by(back, PullStrategy::CompleteThenPull);

        assert_eq!(storage.retrieve(7).await.unwrap(), "back");
        tokio::task::yield_now().await;
        assert!(matches!(front.retrieve(7).await, Err(StorageError::NoValue)));

        release.notify_one();
        for _ in 0..100 {
            if front.retrieve(7).await.is_ok() {
                return;
            }
            tokio::task::yield_now().await;
        }
        panic!("write-back never reached the front tier");
    }

    #[tokio::test]
    async fn failed_write_back_does_not_fail_the_read() {
        let back = MemoryStorage::<u32, String>::new();
        back.set("back".into(), 3).await.unwrap();

        for strategy in [PullStrategy::PullThenComplete, PullStrategy::CompleteThenPull] {
            let storage = failing_writes("front").backed_by(back.clone(), strategy);
            assert_eq!(storage.retrieve(3).await.unwrap(), "back");
        }
    }

    #[tokio::test]
    async fn backed_storage_writes_front_only() {
        let front = Spy::new("front");
        let back = Spy::new("back");
        let storage = front
            .storage()
            .backed_by(back.storage(), PullStrategy::PullThenComplete);

        storage.set("v".into(), 1).await.unwrap();
        assert_eq!(front.sets(), 1);
        assert_eq!(back.sets(), 0);
    }

    // --- pushing ---

    #[tokio::test]
    async fn pushing_writes_front_then_back() {
        let front = MemoryStorage::<u32, String>::new();
        let back = MemoryStorage::<u32, String>::new();

        let pushing = front.clone().into_write_only().pushing_to(back.clone());
        pushing.set("v".into(), 1).await.unwrap();
        assert_eq!(front.retrieve(1).await.unwrap(), "v");
        assert_eq!(back.retrieve(1).await.unwrap(), "v");
    }

    #[tokio::test]
    async fn failed_front_write_never_reaches_back() {
        let back = Spy::new("back");
        let pushing = failing_writes("front")
            .into_write_only()
            .pushing_to(back.storage());

        let result = pushing.set("v".into(), 1).await;
        assert!(matches!(result, Err(StorageError::ReadOnly)));
        assert_eq!(back.sets(), 0);
    }

    #[tokio::test]
    async fn failed_back_write_fails_after_front_succeeded() {
        let front = MemoryStorage::<u32, String>::new();
        let pushing = front
            .clone()
            .into_write_only()
            .pushing_to(WriteOnlyStorage::empty());

        assert!(matches!(pushing.set("v".into(), 1).await, Err(StorageError::Empty)));
        assert_eq!(front.retrieve(1).await.unwrap(), "v");
    }

    #[tokio::test]
    async fn storage_pushing_reads_front_only() {
        let front = Spy::new("front");
        let back = Spy::new("back");
        let storage = front
            .storage()
            .pushing_to(back.storage(), SetStrategy::FrontFirst);

        storage.set("v".into(), 1).await.unwrap();
        assert_eq!(storage.retrieve(1).await.unwrap(), "v");
        assert_eq!(back.sets(), 1);
        assert_eq!(back.retrieves(), 0);
    }

    // --- combined ---

    #[tokio::test]
    async fn combined_front_first_sets_both() {
        let front = MemoryStorage::<u32, String>::new();
        let back = MemoryStorage::<u32, String>::new();
        let combined = front.clone().into_storage().combined_default(back.clone());

        combined.set("v".into(), 4).await.unwrap();
        assert_eq!(front.retrieve(4).await.unwrap(), "v");
        assert_eq!(back.retrieve(4).await.unwrap(), "v");
    }

    #[tokio::test]
    async fn combined_back_first_aborts_on_back_failure() {
        let front = Spy::new("front");
        let combined = front.storage().combined(
            failing_writes("back"),
            PullStrategy::PullThenComplete,
            SetStrategy::BackFirst,
        );

        assert!(matches!(combined.set("v".into(), 1).await, Err(StorageError::ReadOnly)));
        assert_eq!(front.sets(), 0);
    }

    #[tokio::test]
    async fn combined_front_first_aborts_on_front_failure() {
        let back = Spy::new("back");
        let combined = failing_writes("front").combined(
            back.storage(),
            PullStrategy::PullThenComplete,
            SetStrategy::FrontFirst,
        );

        assert!(combined.set("v".into(), 1).await.is_err());
        assert_eq!(back.sets(), 0);
    }

    #[tokio::test]
    async fn combined_single_tier_strategies() {
        let front = Spy::new("front");
        let back = Spy::new("back");

        let front_only = front.storage().combined(
            back.storage(),
            PullStrategy::NeverPull,
            SetStrategy::FrontOnly,
        );
        front_only.set("a".into(), 1).await.unwrap();
        assert_eq!((front.sets(), back.sets()), (1, 0));

        let back_only = front.storage().combined(
            back.storage(),
            PullStrategy::NeverPull,
            SetStrategy::BackOnly,
        );
        back_only.set("b".into(), 2).await.unwrap();
        assert_eq!((front.sets(), back.sets()), (1, 1));
    }

    #[tokio::test]
    async fn combined_read_pulls_into_front() {
        let front = MemoryStorage::<u32, String>::new();
        let back = MemoryStorage::<u32, String>::new();
        back.set("deep".into(), 9).await.unwrap();

        let combined = front.clone().into_storage().combined_default(back);
        assert_eq!(combined.retrieve(9).await.unwrap(), "deep");
        assert_eq!(front.retrieve(9).await.unwrap(), "deep");
    }

    #[tokio::test]
    async fn three_tier_chain_falls_through_and_pulls_everywhere() {
        let l1 = MemoryStorage::<u32, String>::new().named("l1");
        let l2 = MemoryStorage::<u32, String>::new().named("l2");
        let l3 = MemoryStorage::<u32, String>::new().named("l3");
        l3.set("bottom".into(), 1).await.unwrap();

        let chain = l1
            .clone()
            .into_storage()
            .combined_default(l2.clone().into_storage().combined_default(l3));
        assert_eq!(chain.name(), "l1<->l2<->l3");
        assert_eq!(chain.retrieve(1).await.unwrap(), "bottom");
        assert_eq!(l1.retrieve(1).await.unwrap(), "bottom");
        assert_eq!(l2.retrieve(1).await.unwrap(), "bottom");
    }

    #[test]
    fn composite_names() {
        assert_eq!(composite_name("a", "b", true, true), "a<->b");
        assert_eq!(composite_name("a", "b", true, false), "a<-b");
        assert_eq!(composite_name("a", "b", false, true), "a->b");
        assert_eq!(composite_name("a", "b", false, false), "a-b");
    }

    #[test]
    fn strategies_deserialize_from_snake_case() {
        let pull: PullStrategy = serde_json::from_str("\"complete_then_pull\"").unwrap();
        assert_eq!(pull, PullStrategy::CompleteThenPull);
        let set: SetStrategy = serde_json::from_str("\"back_only\"").unwrap();
        assert_eq!(set, SetStrategy::BackOnly);
    }

    proptest! {
        #[test]
        fn hit_short_circuits_for_any_key(key in any::<u32>(), value in ".{0,16}") {
            let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
            runtime.block_on(async {
                let front = MemoryStorage::<u32, String>::new();
                front.set(value.clone(), key).await.unwrap();
                let back = Spy::new("back");
                let backed = front.into_storage().backed_by(back.storage(), PullStrategy::PullThenComplete);
                assert_eq!(backed.retrieve(key).await.unwrap(), value);
                assert_eq!(back.retrieves(), 0);
            });
        }
    }
}
