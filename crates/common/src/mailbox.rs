use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Single-slot, overwrite-on-write register connecting two timing domains.
///
/// Only the newest value matters: a publish replaces whatever is held, and
/// intermediate values may be lost. `take` reports each value at most once;
/// `peek` always returns the latest value without consuming it.
///
/// Values are held behind an `Arc`: the critical section only swaps or copies
/// a pointer, so no caller ever waits on anything but another caller's swap.
/// Readers share the published value instead of cloning it.
#[derive(Debug)]
pub struct Mailbox<T> {
    slot: Mutex<Slot<T>>,
}

#[derive(Debug)]
struct Slot<T> {
    latest: Option<Arc<T>>,
    fresh: bool,
}

impl<T> Default for Mailbox<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Mailbox<T> {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: None,
                fresh: false,
            }),
        }
    }

    /// Create a mailbox already holding a value, which counts as unread.
    pub fn with_value(value: T) -> Self {
        Self {
            slot: Mutex::new(Slot {
                latest: Some(Arc::new(value)),
                fresh: true,
            }),
        }
    }

    /// Replace the held value.
    pub fn publish(&self, value: T) {
        let value = Arc::new(value);
        let previous = {
            let mut slot = self.lock();
            slot.fresh = true;
            slot.latest.replace(value)
        };
        // The superseded value is freed outside the lock.
        drop(previous);
    }

    /// Whether a value has been published since the last `take`.
    pub fn has_fresh(&self) -> bool {
        self.lock().fresh
    }

    // A panic while holding the lock cannot leave the slot half-written:
    // both fields are plain assignments. Recover instead of propagating.
    fn lock(&self) -> MutexGuard<'_, Slot<T>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Return the value published since the last take, or `None` if nothing
    /// new arrived. The value stays available to `peek`.
    pub fn take(&self) -> Option<Arc<T>> {
        let mut slot = self.lock();
        if !slot.fresh {
            return None;
        }
        slot.fresh = false;
        slot.latest.clone()
    }

    /// Return the latest value without consuming it.
    pub fn peek(&self) -> Option<Arc<T>> {
        self.lock().latest.clone()
    }
}

impl<T: Copy> Mailbox<T> {
    /// Copy of the latest value, for small `Copy` payloads.
    pub fn peek_copied(&self) -> Option<T> {
        self.peek().map(|value| *value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn empty_mailbox_has_nothing() {
        let mb: Mailbox<u32> = Mailbox::new();
        assert_eq!(mb.take(), None);
        assert_eq!(mb.peek_copied(), None);
        assert!(!mb.has_fresh());
    }

    #[test]
    fn newest_publish_wins_and_is_taken_once() {
        let mb = Mailbox::new();
        mb.publish(1);
        mb.publish(2);
        assert_eq!(mb.take().as_deref(), Some(&2));
        assert_eq!(mb.take(), None);
    }

    #[test]
    fn peek_does_not_consume() {
        let mb = Mailbox::new();
        mb.publish("a");
        assert_eq!(mb.peek_copied(), Some("a"));
        assert_eq!(mb.peek_copied(), Some("a"));
        assert_eq!(mb.take().as_deref(), Some(&"a"));
        // Taken values remain visible to peek.
        assert_eq!(mb.peek_copied(), Some("a"));
    }

    #[test]
    fn publish_after_take_is_fresh_again() {
        let mb = Mailbox::with_value(10);
        assert!(mb.has_fresh());
        assert_eq!(mb.take().as_deref(), Some(&10));
        mb.publish(11);
        assert_eq!(mb.take().as_deref(), Some(&11));
    }

    #[test]
    fn readers_share_one_allocation() {
        let mb = Mailbox::new();
        mb.publish(vec![1, 2, 3]);
        let peeked = mb.peek().unwrap();
        let taken = mb.take().unwrap();
        assert!(Arc::ptr_eq(&peeked, &taken));

        // Replacing the slot leaves earlier readers' values intact.
        mb.publish(vec![4]);
        assert_eq!(*taken, vec![1, 2, 3]);
        assert_eq!(mb.peek().as_deref(), Some(&vec![4]));
    }

    #[test]
    fn concurrent_publish_and_take_never_tears() {
        // Each value is a pair whose halves must always agree.
        let mb = Arc::new(Mailbox::new());
        let writer = {
            let mb = Arc::clone(&mb);
            thread::spawn(move || {
                for i in 0..10_000u64 {
                    mb.publish((i, i.wrapping_mul(3)));
                }
            })
        };

        let mut last_seen = 0;
        let mut reads = 0;
        while !writer.is_finished() || mb.has_fresh() {
            if let Some(&(a, b)) = mb.take().as_deref() {
                assert_eq!(b, a.wrapping_mul(3));
                assert!(a >= last_seen, "single producer values arrive in order");
                last_seen = a;
                reads += 1;
            }
        }
        writer.join().unwrap();
        assert!(reads > 0);
        assert_eq!(mb.peek_copied(), Some((9_999, 29_997)));
    }
}
