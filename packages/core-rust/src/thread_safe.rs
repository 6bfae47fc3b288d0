//! Reader-writer protected value.

use parking_lot::RwLock;

/// A value whose every access is mediated by a reader-writer lock.
///
/// Readers run concurrently while no writer holds the lock; writers are
/// exclusive. No reference to the inner value outlives a lock guard: reads
/// either clone the value or run a closure under the shared lock.
#[derive(Debug, Default)]
pub struct ThreadSafe<T> {
    value: RwLock<T>,
}

impl<T> ThreadSafe<T> {
    /// Wraps `value`.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            value: RwLock::new(value),
        }
    }

    /// Runs `f` against the value under the shared lock.
    pub fn read_with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.value.read())
    }

    /// Replaces the value.
    pub fn write(&self, new_value: T) {
        *self.value.write() = new_value;
    }

    /// Mutates the value in place under the exclusive lock.
    pub fn write_with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        f(&mut self.value.write())
    }

    /// Consumes the container, returning the value.
    pub fn into_inner(self) -> T {
        self.value.into_inner()
    }
}

impl<T: Clone> ThreadSafe<T> {
    /// Returns a consistent snapshot of the value.
    #[must_use]
    pub fn read(&self) -> T {
        self.value.read().clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    #[test]
    fn read_returns_written_value() {
        let cell = ThreadSafe::new(1);
        cell.write(5);
        assert_eq!(cell.read(), 5);
    }

    #[test]
    fn write_with_mutates_in_place() {
        let cell = ThreadSafe::new(vec![1, 2]);
        let len = cell.write_with(|v| {
            v.push(3);
            v.len()
        });
        assert_eq!(len, 3);
        assert_eq!(cell.read_with(|v| v.iter().sum::<i32>()), 6);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let cell = Arc::new(ThreadSafe::new(0_u64));
        let handles: Vec<_> = (0..16)
            .map(|_| {
                let cell = Arc::clone(&cell);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        cell.write_with(|n| *n += 1);
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(cell.read(), 16_000);
    }

    #[test]
    fn readers_never_observe_partial_mutation() {
        // Writers keep both halves equal; a torn read would see them differ.
        let cell = Arc::new(ThreadSafe::new((0_u32, 0_u32)));
        let writer = {
            let cell = Arc::clone(&cell);
            thread::spawn(move || {
                for i in 0..10_000 {
                    cell.write_with(|pair| {
                        pair.0 = i;
                        pair.1 = i;
                    });
                }
            })
        };
        for _ in 0..10_000 {
            let (a, b) = cell.read();
            assert_eq!(a, b);
        }
        writer.join().unwrap();
    }
}
