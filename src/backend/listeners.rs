use parking_lot::Mutex;
use std::sync::Arc;

pub type ListenerId = u64;

/// Callback registry shared by the auth client, the auth store and the SDK.
///
/// Callbacks are never invoked while the lock is held, so a callback may
/// register or remove listeners itself.
pub struct Listeners<F: ?Sized> {
    inner: Mutex<Inner<F>>,
}

struct Inner<F: ?Sized> {
    next_id: ListenerId,
    entries: Vec<(ListenerId, Arc<F>)>,
}

impl<F: ?Sized> Listeners<F> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                next_id: 1,
                entries: Vec::new(),
            }),
        }
    }

    pub fn add(&self, listener: Arc<F>) -> ListenerId {
        let mut inner = self.inner.lock();
        let id = inner.next_id;
        inner.next_id += 1;
        inner.entries.push((id, listener));
        id
    }

    pub fn remove(&self, id: ListenerId) -> bool {
        let mut inner = self.inner.lock();
        let before = inner.entries.len();
        inner.entries.retain(|(entry_id, _)| *entry_id != id);
        inner.entries.len() != before
    }

    pub fn snapshot(&self) -> Vec<Arc<F>> {
        self.inner
            .lock()
            .entries
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect()
    }
}

impl<F: ?Sized> Default for Listeners<F> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Callback = dyn Fn(usize) + Send + Sync;

    #[test]
    fn test_add_remove_and_snapshot() {
        let listeners: Listeners<Callback> = Listeners::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let counter = hits.clone();
        let first = listeners.add(Arc::new(move |n| {
            counter.fetch_add(n, Ordering::SeqCst);
        }));
        let counter = hits.clone();
        let second = listeners.add(Arc::new(move |n| {
            counter.fetch_add(n * 10, Ordering::SeqCst);
        }));
        assert_ne!(first, second);

        for listener in listeners.snapshot() {
            listener(1);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 11);

        assert!(listeners.remove(second));
        assert!(!listeners.remove(second));
        for listener in listeners.snapshot() {
            listener(1);
        }
        assert_eq!(hits.load(Ordering::SeqCst), 12);
        assert_eq!(listeners.snapshot().len(), 1);
    }
}
