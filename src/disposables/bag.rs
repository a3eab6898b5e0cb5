//! Disposable aggregation helpers.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::disposables::Dispose;
use crate::error::ChannelError;

type Boxed = Box<dyn Dispose>;

/// Collection disposed as a unit.
///
/// Adding to an already disposed bag disposes the newcomer immediately.
///
/// # Example
/// ```
/// use eventvisor::{Dispose, DisposableBag, EventFactory};
///
/// let factory = EventFactory::default();
/// let ticks = factory.event::<u32>();
/// let bag = DisposableBag::new();
/// bag.add(ticks.subscribe_fn(|_| Ok(())).unwrap())
///     .add(ticks.subscribe_fn(|_| Ok(())).unwrap());
///
/// assert_eq!(bag.len(), 2);
/// bag.dispose();
/// assert!(bag.is_disposed());
/// ```
pub struct DisposableBag {
    items: Mutex<Option<Vec<Boxed>>>,
}

impl DisposableBag {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self {
            items: Mutex::new(Some(Vec::new())),
        }
    }

    /// Adds a disposable; returns `&self` for chaining.
    pub fn add(&self, item: impl Dispose + 'static) -> &Self {
        let mut items = self.items.lock();
        match items.as_mut() {
            Some(list) => list.push(Box::new(item)),
            None => {
                drop(items);
                item.dispose();
            }
        }
        self
    }

    /// Number of disposables currently held.
    pub fn len(&self) -> usize {
        self.items.lock().as_ref().map_or(0, Vec::len)
    }

    /// True when the bag holds nothing.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once [`dispose`](Dispose::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        self.items.lock().is_none()
    }
}

impl Default for DisposableBag {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispose for DisposableBag {
    /// Disposes every item in insertion order, outside the bag's lock.
    fn dispose(&self) {
        let items = self.items.lock().take();
        for item in items.into_iter().flatten() {
            item.dispose();
        }
    }
}

impl fmt::Debug for DisposableBag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisposableBag")
            .field("len", &self.len())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

enum Slot {
    Empty,
    Assigned(Boxed),
    Disposed,
}

/// Holder for exactly one disposable.
///
/// Assigning twice is a programming error ([`ChannelError::AlreadyAssigned`]).
/// Assigning after disposal is a benign race with teardown: the newcomer is
/// disposed immediately and `Ok(())` is returned.
pub struct SingleAssignment {
    slot: Mutex<Slot>,
}

impl SingleAssignment {
    /// Creates an unassigned holder.
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(Slot::Empty),
        }
    }

    /// Assigns the inner disposable.
    pub fn set(&self, item: impl Dispose + 'static) -> Result<(), ChannelError> {
        let mut slot = self.slot.lock();
        match &*slot {
            Slot::Empty => {
                *slot = Slot::Assigned(Box::new(item));
                Ok(())
            }
            Slot::Assigned(_) => Err(ChannelError::AlreadyAssigned),
            Slot::Disposed => {
                drop(slot);
                item.dispose();
                Ok(())
            }
        }
    }

    /// True once something has been assigned (and not yet disposed).
    pub fn is_assigned(&self) -> bool {
        matches!(&*self.slot.lock(), Slot::Assigned(_))
    }

    /// True once [`dispose`](Dispose::dispose) has been called.
    pub fn is_disposed(&self) -> bool {
        matches!(&*self.slot.lock(), Slot::Disposed)
    }
}

impl Default for SingleAssignment {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispose for SingleAssignment {
    fn dispose(&self) {
        let previous = std::mem::replace(&mut *self.slot.lock(), Slot::Disposed);
        if let Slot::Assigned(item) = previous {
            item.dispose();
        }
    }
}

impl fmt::Debug for SingleAssignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SingleAssignment")
            .field("assigned", &self.is_assigned())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

/// Disposes the shared holder when dropped.
///
/// Owned by futures and streams that wrap a subscription, so abandoning
/// them unsubscribes as well.
pub(crate) struct DisposeOnDrop(Arc<SingleAssignment>);

impl DisposeOnDrop {
    pub(crate) fn new(holder: Arc<SingleAssignment>) -> Self {
        Self(holder)
    }
}

impl Drop for DisposeOnDrop {
    fn drop(&mut self) {
        self.0.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counted(Arc<AtomicUsize>);

    impl Dispose for Counted {
        fn dispose(&self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_bag_disposes_all_and_late_adds() {
        let hits = Arc::new(AtomicUsize::new(0));
        let bag = DisposableBag::new();
        bag.add(Counted(Arc::clone(&hits)))
            .add(Counted(Arc::clone(&hits)));
        assert_eq!(bag.len(), 2);

        bag.dispose();
        bag.dispose();
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert!(bag.is_empty());

        bag.add(Counted(Arc::clone(&hits)));
        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_single_assignment_rejects_second_set() {
        let hits = Arc::new(AtomicUsize::new(0));
        let single = SingleAssignment::new();
        single.set(Counted(Arc::clone(&hits))).unwrap();
        assert!(single.is_assigned());
        assert_eq!(
            single.set(Counted(Arc::clone(&hits))),
            Err(ChannelError::AlreadyAssigned)
        );

        single.dispose();
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_assignment_after_dispose_disposes_newcomer() {
        let hits = Arc::new(AtomicUsize::new(0));
        let single = SingleAssignment::new();
        single.dispose();

        assert_eq!(single.set(Counted(Arc::clone(&hits))), Ok(()));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert!(single.is_disposed());
    }

    #[test]
    fn test_dispose_on_drop_releases_holder() {
        let hits = Arc::new(AtomicUsize::new(0));
        let holder = Arc::new(SingleAssignment::new());
        holder.set(Counted(Arc::clone(&hits))).unwrap();

        drop(DisposeOnDrop::new(Arc::clone(&holder)));
        assert!(holder.is_disposed());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }
}
