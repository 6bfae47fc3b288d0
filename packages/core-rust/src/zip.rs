//! Joining two storages into one that reads and writes pairs.
//!
//! [`CompletionZip`] is the synchronizer underneath: it buffers completions
//! arriving from two independent operations and hands out pairs according
//! to a [`ZipStrategy`]. The `zip*` functions run both sides concurrently
//! and complete with the first pair formed for that call.

use std::collections::VecDeque;
use std::future::Future;

use futures_util::join;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{zip_results, StorageResult};
use crate::storage::{ReadOnlyStorage, Storage, WriteOnlyStorage};
use crate::trace_decision;
use crate::traits::{ReadWrite, Readable, StorageKey, StorageValue, Writable};

/// How completions from the two sides are paired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZipStrategy {
    /// Pair the most recent value of each side on every arrival.
    #[default]
    Latest,
    /// Pair the Nth left value with the Nth right value.
    WithSameIndex,
}

struct Buffers<L, R> {
    left: VecDeque<L>,
    right: VecDeque<R>,
}

/// Pairs left and right completions and passes each pair to a callback.
///
/// With [`ZipStrategy::Latest`] every arrival that finds the other side
/// non-empty produces a pair of the newest values, which stay buffered for
/// later pairings. With [`ZipStrategy::WithSameIndex`] values are paired in
/// arrival order and consumed.
///
/// The callback runs while the buffers are locked, so pairings never
/// interleave.
pub struct CompletionZip<L, R, F> {
    strategy: ZipStrategy,
    buffers: Mutex<Buffers<L, R>>,
    on_pair: F,
}

impl<L, R, F> CompletionZip<L, R, F>
where
    L: Clone,
    R: Clone,
    F: Fn(L, R),
{
    #[must_use]
    pub fn new(strategy: ZipStrategy, on_pair: F) -> Self {
        Self {
            strategy,
            buffers: Mutex::new(Buffers {
                left: VecDeque::new(),
                right: VecDeque::new(),
            }),
            on_pair,
        }
    }

    /// Records a completion of the left operation.
    pub fn complete_left(&self, value: L) {
        let mut buffers = self.buffers.lock();
        if self.strategy == ZipStrategy::Latest {
            buffers.left.clear();
        }
        buffers.left.push_back(value);
        self.pair(&mut buffers);
    }

    /// Records a completion of the right operation.
    pub fn complete_right(&self, value: R) {
        let mut buffers = self.buffers.lock();
        if self.strategy == ZipStrategy::Latest {
            buffers.right.clear();
        }
        buffers.right.push_back(value);
        self.pair(&mut buffers);
    }

    fn pair(&self, buffers: &mut Buffers<L, R>) {
        match self.strategy {
            ZipStrategy::Latest => {
                if let (Some(left), Some(right)) = (buffers.left.back(), buffers.right.back()) {
                    (self.on_pair)(left.clone(), right.clone());
                }
            }
            ZipStrategy::WithSameIndex => {
                while !buffers.left.is_empty() && !buffers.right.is_empty() {
                    if let (Some(left), Some(right)) =
                        (buffers.left.pop_front(), buffers.right.pop_front())
                    {
                        (self.on_pair)(left, right);
                    }
                }
            }
        }
    }
}

/// Runs both operations concurrently and completes with the first pair.
async fn zip_operations<A, B>(
    strategy: ZipStrategy,
    left: impl Future<Output = StorageResult<A>>,
    right: impl Future<Output = StorageResult<B>>,
) -> StorageResult<(A, B)>
where
    A: Clone,
    B: Clone,
{
    let first: Mutex<Option<StorageResult<(A, B)>>> = Mutex::new(None);
    {
        let zip = CompletionZip::new(strategy, |left_result, right_result| {
            first.lock().get_or_insert_with(|| zip_results(left_result, right_result));
        });
        join!(
            async { zip.complete_left(left.await) },
            async { zip.complete_right(right.await) }
        );
    }
    match first.into_inner() {
        Some(result) => result,
        None => unreachable!("both sides completed, so a pair was formed"),
    }
}

fn zip_name(left: &str, right: &str) -> String {
    format!("{left}+{right}")
}

/// Reads a pair of values, one from each storage, for the same key.
///
/// Fails with [`StorageError::Zipped`](crate::StorageError::Zipped) when
/// either side fails, keeping the error of every failed side.
#[must_use]
pub fn zip_read_only<K, A, B>(
    left: impl Readable<K, A> + 'static,
    right: impl Readable<K, B> + 'static,
    strategy: ZipStrategy,
) -> ReadOnlyStorage<K, (A, B)>
where
    K: StorageKey,
    A: StorageValue,
    B: StorageValue,
{
    let (left, right) = (left.into_read_only(), right.into_read_only());
    let name = zip_name(left.name(), right.name());
    ReadOnlyStorage::new(name, move |key: K| {
        let left = left.retrieve(key.clone());
        let right = right.retrieve(key);
        async move { zip_operations(strategy, left, right).await }
    })
}

/// Writes each half of a pair to its own storage under the same key.
#[must_use]
pub fn zip_write_only<K, A, B>(
    left: impl Writable<K, A> + 'static,
    right: impl Writable<K, B> + 'static,
    strategy: ZipStrategy,
) -> WriteOnlyStorage<K, (A, B)>
where
    K: StorageKey,
    A: StorageValue,
    B: StorageValue,
{
    let (left, right) = (left.into_write_only(), right.into_write_only());
    let name = zip_name(left.name(), right.name());
    WriteOnlyStorage::new(name.clone(), move |(a, b): (A, B), key: K| {
        let left = left.set(a, key.clone());
        let right = right.set(b, key);
        let name = name.clone();
        async move {
            let result = zip_operations(strategy, left, right).await.map(|((), ())| ());
            if let Err(error) = &result {
                trace_decision!(storage = %name, %error, "zipped set failed");
            }
            result
        }
    })
}

/// Zips both the read and the write paths of two storages.
#[must_use]
pub fn zip<K, A, B>(
    left: impl ReadWrite<K, A> + 'static,
    right: impl ReadWrite<K, B> + 'static,
    strategy: ZipStrategy,
) -> Storage<K, (A, B)>
where
    K: StorageKey,
    A: StorageValue,
    B: StorageValue,
{
    let (left_read, left_write) = left.into_storage().into_halves();
    let (right_read, right_write) = right.into_storage().into_halves();
    let name = zip_name(left_read.name(), right_read.name());
    Storage::from_parts(
        name,
        zip_read_only(left_read, right_read, strategy),
        zip_write_only(left_write, right_write, strategy),
    )
}

fn flatten_right<T, U, W>((t, (u, w)): (T, (U, W))) -> (T, U, W) {
    (t, u, w)
}

fn nest_right<T, U, W>((t, u, w): (T, U, W)) -> (T, (U, W)) {
    (t, (u, w))
}

fn flatten_left<T, U, W>(((t, u), w): ((T, U), W)) -> (T, U, W) {
    (t, u, w)
}

fn nest_left<T, U, W>((t, u, w): (T, U, W)) -> ((T, U), W) {
    ((t, u), w)
}

impl<K: StorageKey, T: StorageValue, U: StorageValue, W: StorageValue>
    ReadOnlyStorage<K, (T, (U, W))>
{
    /// Flattens `(T, (U, W))` values into `(T, U, W)`.
    #[must_use]
    pub fn flat_right(self) -> ReadOnlyStorage<K, (T, U, W)> {
        self.map_values(|value| Ok(flatten_right(value)))
    }
}

impl<K: StorageKey, T: StorageValue, U: StorageValue, W: StorageValue>
    ReadOnlyStorage<K, ((T, U), W)>
{
    /// Flattens `((T, U), W)` values into `(T, U, W)`.
    #[must_use]
    pub fn flat_left(self) -> ReadOnlyStorage<K, (T, U, W)> {
        self.map_values(|value| Ok(flatten_left(value)))
    }
}

impl<K: StorageKey, T: StorageValue, U: StorageValue, W: StorageValue> Storage<K, (T, (U, W))> {
    /// Flattens `(T, (U, W))` values into `(T, U, W)` on both paths.
    #[must_use]
    pub fn flat_right(self) -> Storage<K, (T, U, W)> {
        self.map_values(|value| Ok(flatten_right(value)), |value| Ok(nest_right(value)))
    }
}

impl<K: StorageKey, T: StorageValue, U: StorageValue, W: StorageValue> Storage<K, ((T, U), W)> {
    /// Flattens `((T, U), W)` values into `(T, U, W)` on both paths.
    #[must_use]
    pub fn flat_left(self) -> Storage<K, (T, U, W)> {
        self.map_values(|value| Ok(flatten_left(value)), |value| Ok(nest_left(value)))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::error::StorageError;
    use crate::memory::MemoryStorage;

    fn recorder<L: Send + 'static, R: Send + 'static>() -> (Arc<Mutex<Vec<(L, R)>>>, impl Fn(L, R)) {
        let pairs = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&pairs);
        (pairs, move |left, right| sink.lock().push((left, right)))
    }

    #[test]
    fn latest_pairs_on_every_arrival() {
        let (pairs, on_pair) = recorder::<i32, &str>();
        let zip = CompletionZip::new(ZipStrategy::Latest, on_pair);

        zip.complete_left(1);
        assert!(pairs.lock().is_empty());
        zip.complete_right("a");
        zip.complete_left(2);
        zip.complete_right("b");

        assert_eq!(*pairs.lock(), vec![(1, "a"), (2, "a"), (2, "b")]);
    }

    #[test]
    fn same_index_pairs_in_arrival_order() {
        let (pairs, on_pair) = recorder::<i32, &str>();
        let zip = CompletionZip::new(ZipStrategy::WithSameIndex, on_pair);

        zip.complete_left(1);
        zip.complete_left(2);
        zip.complete_right("a");
        zip.complete_left(3);
        zip.complete_right("b");
        zip.complete_right("c");

        assert_eq!(*pairs.lock(), vec![(1, "a"), (2, "b"), (3, "c")]);
    }

    #[tokio::test]
    async fn zipped_read_succeeds_with_both_values() {
        let numbers = MemoryStorage::<u8, i32>::new();
        let letters = MemoryStorage::<u8, String>::new();
        numbers.set(10, 1).await.unwrap();
        letters.set("x".into(), 1).await.unwrap();

        for strategy in [ZipStrategy::Latest, ZipStrategy::WithSameIndex] {
            let zipped = zip_read_only(numbers.clone(), letters.clone(), strategy);
            assert_eq!(zipped.retrieve(1).await.unwrap(), (10, "x".to_string()));
        }
    }

    #[tokio::test]
    async fn zipped_read_keeps_both_errors() {
        let zipped = zip_read_only(
            ReadOnlyStorage::<u8, i32>::empty(),
            MemoryStorage::<u8, String>::new(),
            ZipStrategy::Latest,
        );

        let err = zipped.retrieve(1).await.unwrap_err();
        let zipped_err = err.as_zipped().expect("zipped error");
        assert!(matches!(zipped_err.left, Some(StorageError::Empty)));
        assert!(matches!(zipped_err.right, Some(StorageError::NoValue)));
    }

    #[tokio::test]
    async fn zipped_read_fails_when_one_side_fails() {
        let numbers = MemoryStorage::<u8, i32>::new();
        numbers.set(10, 1).await.unwrap();
        let zipped = zip_read_only(numbers, ReadOnlyStorage::<u8, bool>::empty(), ZipStrategy::Latest);

        let err = zipped.retrieve(1).await.unwrap_err();
        let zipped_err = err.as_zipped().expect("zipped error");
        assert!(zipped_err.left.is_none());
        assert!(matches!(zipped_err.right, Some(StorageError::Empty)));
    }

    #[tokio::test(start_paused = true)]
    async fn sides_run_concurrently() {
        let slow = |delay: u64| {
            ReadOnlyStorage::<u8, u64>::new("slow", move |_| async move {
                tokio::time::sleep(Duration::from_millis(delay)).await;
                Ok(delay)
            })
        };
        let zipped = zip_read_only(slow(40), slow(40), ZipStrategy::Latest);

        let started = tokio::time::Instant::now();
        assert_eq!(zipped.retrieve(0).await.unwrap(), (40, 40));
        assert!(started.elapsed() < Duration::from_millis(80));
    }

    #[tokio::test]
    async fn zipped_write_splits_the_pair() {
        let numbers = MemoryStorage::<u8, i32>::new();
        let letters = MemoryStorage::<u8, String>::new();
        let zipped = zip(numbers.clone(), letters.clone(), ZipStrategy::WithSameIndex);

        zipped.set((5, "five".into()), 3).await.unwrap();
        assert_eq!(numbers.retrieve(3).await.unwrap(), 5);
        assert_eq!(letters.retrieve(3).await.unwrap(), "five");
        assert_eq!(zipped.retrieve(3).await.unwrap(), (5, "five".to_string()));
    }

    #[tokio::test]
    async fn zipped_write_reports_failed_side() {
        let numbers = MemoryStorage::<u8, i32>::new();
        let zipped = zip_write_only(
            numbers.clone(),
            WriteOnlyStorage::<u8, bool>::empty(),
            ZipStrategy::Latest,
        );

        let err = zipped.set((1, true), 0).await.unwrap_err();
        let zipped_err = err.as_zipped().expect("zipped error");
        assert!(zipped_err.left.is_none());
        assert!(matches!(zipped_err.right, Some(StorageError::Empty)));
        // The left side is not rolled back.
        assert_eq!(numbers.retrieve(0).await.unwrap(), 1);
    }

    #[test]
    fn zip_name_joins_both_sides() {
        let zipped = zip(
            MemoryStorage::<u8, u8>::new().named("a"),
            MemoryStorage::<u8, u8>::new().named("b"),
            ZipStrategy::default(),
        );
        assert_eq!(zipped.name(), "a+b");
    }

    #[tokio::test]
    async fn flat_helpers_reassociate_triples() {
        let a = MemoryStorage::<u8, i32>::new();
        let b = MemoryStorage::<u8, bool>::new();
        let c = MemoryStorage::<u8, String>::new();

        let right = zip(a.clone(), zip(b.clone(), c.clone(), ZipStrategy::Latest), ZipStrategy::Latest)
            .flat_right();
        right.set((1, true, "one".into()), 1).await.unwrap();
        assert_eq!(right.retrieve(1).await.unwrap(), (1, true, "one".to_string()));

        let left = zip(zip(a, b, ZipStrategy::Latest), c, ZipStrategy::Latest)
            .as_read_only()
            .flat_left();
        assert_eq!(left.retrieve(1).await.unwrap(), (1, true, "one".to_string()));
    }
}
