//! A Lock-Free unbounded MPMC-Queue, that can be used with any of the Reclamation-Schemes of
//! this Crate
//!
//! # Example
//! ```rust
//! use lfcds::queue::MsQueue;
//!
//! let queue = MsQueue::new();
//! let handle = queue.domain().attach().unwrap();
//!
//! queue.enqueue(&handle, 13);
//! queue.enqueue(&handle, 14);
//!
//! assert_eq!(Some(13), queue.dequeue(&handle));
//! assert_eq!(Some(14), queue.dequeue(&handle));
//! assert_eq!(None, queue.dequeue(&handle));
//! ```
//!
//! # Reference:
//! * [Simple, Fast, and Practical Non-Blocking and Blocking Concurrent Queue Algorithms](https://www.cs.rochester.edu/u/scott/papers/1996_PODC_queues.pdf)

use std::{fmt::Debug, marker::PhantomData, mem::MaybeUninit};

use crossbeam_utils::{Backoff, CachePadded};

use crate::{
    hazard_ptr,
    reclaim::{DropBox, LocalReclaim, Reclaim, Shield},
    sync::atomic,
};

struct Node<T> {
    /// Uninitialized for the current Dummy-Node
    value: MaybeUninit<T>,
    next: atomic::AtomicPtr<Node<T>>,
}

impl<T> Node<T> {
    fn alloc(value: MaybeUninit<T>) -> *mut Self {
        Box::into_raw(Box::new(Self {
            value,
            next: atomic::AtomicPtr::new(std::ptr::null_mut()),
        }))
    }
}

/// The Michael-Scott-Queue, which uses the Reclamation-Domain `R` to safely free the Nodes it
/// removed.
///
/// The Head of the Queue always points to a Dummy-Node, whose Value was already dequeued, and
/// the actual first Value is stored in its successor.
pub struct MsQueue<T, R = hazard_ptr::Domain>
where
    R: Reclaim,
{
    head: CachePadded<atomic::AtomicPtr<Node<T>>>,
    tail: CachePadded<atomic::AtomicPtr<Node<T>>>,
    len: atomic::AtomicUsize,
    domain: R,
    _marker: PhantomData<T>,
}

// Safety:
// Values are only moved in and out of the Queue, so sharing the Queue is safe as long as the
// Values can be send to other Threads
unsafe impl<T, R> Sync for MsQueue<T, R>
where
    T: Send,
    R: Reclaim,
{
}
unsafe impl<T, R> Send for MsQueue<T, R>
where
    T: Send,
    R: Reclaim,
{
}

impl<T> MsQueue<T> {
    /// Creates a new empty Queue that uses the default Hazard-Domain
    pub fn new() -> Self {
        Self::new_in(hazard_ptr::domain().clone())
    }
}

impl<T> Default for MsQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> MsQueue<T, R>
where
    R: Reclaim,
{
    /// Creates a new empty Queue that uses the given Domain to reclaim its Nodes
    pub fn new_in(domain: R) -> Self {
        let dummy = Node::alloc(MaybeUninit::uninit());

        Self {
            head: CachePadded::new(atomic::AtomicPtr::new(dummy)),
            tail: CachePadded::new(atomic::AtomicPtr::new(dummy)),
            len: atomic::AtomicUsize::new(0),
            domain,
            _marker: PhantomData,
        }
    }

    /// The Domain used by this Queue, every Handle passed to it must be attached to it
    pub fn domain(&self) -> &R {
        &self.domain
    }

    fn check_handle(&self, local: &R::Local) {
        assert!(
            self.domain.owns(local),
            "protocol violation: the handle is attached to a different domain than the queue"
        );
    }

    /// Appends the Value at the End of the Queue
    pub fn enqueue(&self, local: &R::Local, value: T) {
        self.check_handle(local);

        let node = Node::alloc(MaybeUninit::new(value));
        self.len.fetch_add(1, atomic::Ordering::Relaxed);

        let mut shield = local.shield();
        let backoff = Backoff::new();
        loop {
            let tail = shield.protect(&*self.tail);
            // Safety:
            // The Tail is never Null and protected by the Shield
            let tail_next = &unsafe { &*tail }.next;
            let next = tail_next.load(atomic::Ordering::Acquire);

            if tail != self.tail.load(atomic::Ordering::Acquire) {
                continue;
            }

            // The Tail is lagging behind, so we help to move it forward
            if !next.is_null() {
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                );
                continue;
            }

            if tail_next
                .compare_exchange(
                    std::ptr::null_mut(),
                    node,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Acquire,
                )
                .is_ok()
            {
                let _ = self.tail.compare_exchange(
                    tail,
                    node,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                );
                return;
            }

            backoff.spin();
        }
    }

    /// Removes the first Value from the Queue
    pub fn dequeue(&self, local: &R::Local) -> Option<T> {
        self.check_handle(local);

        let mut head_shield = local.shield();
        let mut next_shield = local.shield();
        let backoff = Backoff::new();
        loop {
            let head = head_shield.protect(&*self.head);
            let tail = self.tail.load(atomic::Ordering::Acquire);
            // Safety:
            // The Head is never Null and protected by the Shield
            let next = next_shield.protect(&unsafe { &*head }.next);

            if head != self.head.load(atomic::Ordering::Acquire) {
                continue;
            }
            if next.is_null() {
                return None;
            }

            // The Head can never move past the Tail, otherwise the Tail could point to a Node
            // that was already retired
            if head == tail {
                let _ = self.tail.compare_exchange(
                    tail,
                    next,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Relaxed,
                );
                continue;
            }

            if self
                .head
                .compare_exchange(
                    head,
                    next,
                    atomic::Ordering::AcqRel,
                    atomic::Ordering::Acquire,
                )
                .is_err()
            {
                backoff.spin();
                continue;
            }

            self.len.fetch_sub(1, atomic::Ordering::Relaxed);

            // Safety:
            // The successful CAS made `next` the new Dummy and only this Thread reads its Value,
            // which was initialized when the Node was enqueued
            let value = unsafe { std::ptr::read((*next).value.as_ptr()) };

            head_shield.release();
            next_shield.release();
            // Safety:
            // The old Dummy was unlinked by the CAS and is only retired by this Thread. Dropping
            // the Node does not drop its Value, as it is stored in a MaybeUninit
            unsafe { local.retire(head, DropBox) };

            return Some(value);
        }
    }

    /// An Alias for [`MsQueue::enqueue`]
    pub fn push(&self, local: &R::Local, value: T) {
        self.enqueue(local, value)
    }

    /// An Alias for [`MsQueue::dequeue`]
    pub fn pop(&self, local: &R::Local) -> Option<T> {
        self.dequeue(local)
    }

    /// Checks if the Queue is currently empty, this is based on [`MsQueue::len`] and therefore
    /// only a Snapshot as well
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The Number of Values currently stored in the Queue.
    ///
    /// Values are counted from the Moment their Enqueue started, so this might include Values
    /// that can not be dequeued yet
    pub fn len(&self) -> usize {
        self.len.load(atomic::Ordering::Relaxed)
    }

    /// Removes all the Values from the Queue
    pub fn clear(&self, local: &R::Local) {
        while self.dequeue(local).is_some() {}
    }
}

impl<T, R> Debug for MsQueue<T, R>
where
    R: Reclaim + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "MsQueue ( len = {}, domain = {:?} )", self.len(), self.domain)
    }
}

impl<T, R> Drop for MsQueue<T, R>
where
    R: Reclaim,
{
    fn drop(&mut self) {
        // Safety:
        // No other Thread can access the Queue anymore and the Nodes still linked into it were
        // never retired. The first Node is the Dummy, whose Value was already taken out
        let dummy = unsafe { Box::from_raw(self.head.load(atomic::Ordering::Acquire)) };
        let mut current = dummy.next.load(atomic::Ordering::Acquire);
        drop(dummy);

        while !current.is_null() {
            let mut node = unsafe { Box::from_raw(current) };
            current = node.next.load(atomic::Ordering::Acquire);
            unsafe { node.value.assume_init_drop() };
        }
    }
}
