//! Reusable codec instances.

use parking_lot::Mutex;

/// Upper bound on idle instances kept per pool.
const MAX_IDLE: usize = 32;

type Factory<C> = Box<dyn Fn() -> Box<C> + Send + Sync>;

/// A cache of codec instances built by one factory.
///
/// [`with`](Pool::with) takes an idle instance (or builds a fresh one), lends
/// it to the closure and puts it back afterwards. Concurrent callers each get
/// their own instance; exclusivity lasts for a single call only.
pub struct Pool<C: ?Sized> {
    factory: Factory<C>,
    idle: Mutex<Vec<Box<C>>>,
    content_types: Vec<String>,
}

impl<C: ?Sized + Send> Pool<C> {
    pub(crate) fn new(factory: Factory<C>, content_types: Vec<String>) -> Self {
        Self { factory, idle: Mutex::new(Vec::new()), content_types }
    }

    /// Runs `f` with a borrowed instance.
    pub fn with<R>(&self, f: impl FnOnce(&mut C) -> R) -> R {
        let mut codec = self.take();
        let out = f(&mut codec);
        self.give_back(codec);
        out
    }

    /// The content types this pool was registered under, in registration order.
    pub fn content_types(&self) -> &[String] {
        &self.content_types
    }

    pub fn idle(&self) -> usize {
        self.idle.lock().len()
    }

    fn take(&self) -> Box<C> {
        // Pop under the lock, build outside it.
        let cached = self.idle.lock().pop();
        cached.unwrap_or_else(|| (self.factory)())
    }

    fn give_back(&self, codec: Box<C>) {
        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE {
            idle.push(codec);
        }
    }
}

impl<C: ?Sized> std::fmt::Debug for Pool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("content_types", &self.content_types)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Barrier};

    use super::*;

    struct Counter {
        uses: usize,
    }

    fn counting_pool(built: &Arc<AtomicUsize>) -> Pool<Counter> {
        let built = Arc::clone(built);
        Pool::new(
            Box::new(move || {
                built.fetch_add(1, Ordering::SeqCst);
                Box::new(Counter { uses: 0 })
            }),
            vec!["application/test".to_owned()],
        )
    }

    #[test]
    fn sequential_borrows_reuse_one_instance() {
        let built = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&built);

        for _ in 0..5 {
            pool.with(|c| c.uses += 1);
        }

        assert_eq!(built.load(Ordering::SeqCst), 1);
        assert_eq!(pool.idle(), 1);
        assert_eq!(pool.with(|c| c.uses), 5);
    }

    #[test]
    fn concurrent_borrows_get_distinct_instances() {
        let built = Arc::new(AtomicUsize::new(0));
        let pool = counting_pool(&built);
        let barrier = Barrier::new(4);

        std::thread::scope(|s| {
            for _ in 0..4 {
                s.spawn(|| {
                    pool.with(|c| {
                        c.uses += 1;
                        // Hold the instance until every thread has one.
                        barrier.wait();
                    })
                });
            }
        });

        assert_eq!(built.load(Ordering::SeqCst), 4);
        assert_eq!(pool.idle(), 4);
    }
}
