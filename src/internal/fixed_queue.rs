//! Fixed-capacity FIFO ring buffer.
//!
//! Backs the replay buffer of keyless events. The capacity never changes
//! implicitly; [`FixedQueue::ensure_capacity`] is the only way to resize.

use std::fmt;

use crate::error::ChannelError;

/// Bounded circular queue.
pub(crate) struct FixedQueue<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    len: usize,
}

impl<T> FixedQueue<T> {
    /// Creates an empty queue holding at most `capacity` items.
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: empty_slots(capacity),
            head: 0,
            len: 0,
        }
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub(crate) fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    /// Appends at the tail; fails when full.
    pub(crate) fn enqueue(&mut self, item: T) -> Result<(), ChannelError> {
        if self.is_full() {
            return Err(ChannelError::QueueFull {
                capacity: self.capacity(),
            });
        }
        let tail = self.wrap(self.head + self.len);
        self.slots[tail] = Some(item);
        self.len += 1;
        Ok(())
    }

    /// Removes from the head; fails when empty.
    pub(crate) fn dequeue(&mut self) -> Result<T, ChannelError> {
        if self.is_empty() {
            return Err(ChannelError::QueueEmpty);
        }
        let item = self.slots[self.head].take();
        self.head = self.wrap(self.head + 1);
        self.len -= 1;
        item.ok_or(ChannelError::QueueEmpty)
    }

    /// Appends, evicting and returning the oldest item when full.
    ///
    /// With capacity 0 the item itself is returned.
    pub(crate) fn push_evict(&mut self, item: T) -> Option<T> {
        if self.capacity() == 0 {
            return Some(item);
        }
        let evicted = if self.is_full() {
            self.dequeue().ok()
        } else {
            None
        };
        // cannot fail: one slot is free at this point
        let _ = self.enqueue(item);
        evicted
    }

    /// Removes every item, oldest first.
    pub(crate) fn drain(&mut self) -> Vec<T> {
        let mut out = Vec::with_capacity(self.len);
        while let Ok(item) = self.dequeue() {
            out.push(item);
        }
        self.head = 0;
        out
    }

    /// Reallocates to exactly `capacity` slots, keeping FIFO order.
    ///
    /// Fails without changes if `capacity` is smaller than the current length.
    pub(crate) fn ensure_capacity(&mut self, capacity: usize) -> Result<(), ChannelError> {
        if capacity < self.len {
            return Err(ChannelError::QueueFull { capacity });
        }
        let mut slots = empty_slots(capacity);
        for (i, slot) in slots.iter_mut().take(self.len).enumerate() {
            let idx = self.wrap(self.head + i);
            *slot = self.slots[idx].take();
        }
        self.slots = slots;
        self.head = 0;
        Ok(())
    }

    #[inline]
    fn wrap(&self, idx: usize) -> usize {
        let cap = self.capacity();
        if idx >= cap {
            idx - cap
        } else {
            idx
        }
    }
}

fn empty_slots<T>(capacity: usize) -> Box<[Option<T>]> {
    (0..capacity).map(|_| None).collect()
}

impl<T> fmt::Debug for FixedQueue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FixedQueue")
            .field("len", &self.len)
            .field("capacity", &self.capacity())
            .finish()
    }
}
