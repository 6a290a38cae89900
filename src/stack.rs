//! A Lock-Free Stack, that can be used with any of the Reclamation-Schemes of this Crate
//!
//! # Example
//! ```rust
//! use lfcds::stack::TreiberStack;
//!
//! let stack = TreiberStack::new();
//! let handle = stack.domain().attach().unwrap();
//!
//! stack.push(&handle, 13);
//! stack.push(&handle, 14);
//!
//! assert_eq!(Some(14), stack.pop(&handle));
//! assert_eq!(Some(13), stack.pop(&handle));
//! assert_eq!(None, stack.pop(&handle));
//! ```

use std::{fmt::Debug, marker::PhantomData, mem::ManuallyDrop};

use crossbeam_utils::{Backoff, CachePadded};

use crate::{
    hazard_ptr,
    reclaim::{DropBox, LocalReclaim, Reclaim, Shield},
    sync::atomic,
};

struct Node<T> {
    /// Moved out by the Thread that popped the Node, so it is never dropped with the Node
    value: ManuallyDrop<T>,
    next: *mut Node<T>,
}

/// A Lock-Free Treiber-Stack, which uses the Reclamation-Domain `R` to safely free the Nodes it
/// removed
pub struct TreiberStack<T, R = hazard_ptr::Domain>
where
    R: Reclaim,
{
    head: CachePadded<atomic::AtomicPtr<Node<T>>>,
    len: atomic::AtomicUsize,
    domain: R,
    _marker: PhantomData<T>,
}

// Safety:
// Values are only ever moved in and out of the Stack by value, no Thread can get a Reference to
// a Value stored by another Thread, so it is enough for T to be Send
unsafe impl<T, R> Sync for TreiberStack<T, R>
where
    T: Send,
    R: Reclaim,
{
}
unsafe impl<T, R> Send for TreiberStack<T, R>
where
    T: Send,
    R: Reclaim,
{
}

impl<T> TreiberStack<T> {
    /// Creates a new empty Stack that uses the default Hazard-Domain
    pub fn new() -> Self {
        Self::new_in(hazard_ptr::domain().clone())
    }
}

impl<T> Default for TreiberStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, R> TreiberStack<T, R>
where
    R: Reclaim,
{
    /// Creates a new empty Stack that uses the given Domain to reclaim its Nodes
    pub fn new_in(domain: R) -> Self {
        Self {
            head: CachePadded::new(atomic::AtomicPtr::new(std::ptr::null_mut())),
            len: atomic::AtomicUsize::new(0),
            domain,
            _marker: PhantomData,
        }
    }

    /// The Domain used by this Stack, every Handle passed to it must be attached to it
    pub fn domain(&self) -> &R {
        &self.domain
    }

    fn check_handle(&self, local: &R::Local) {
        assert!(
            self.domain.owns(local),
            "protocol violation: the handle is attached to a different domain than the stack"
        );
    }

    /// Pushes a new Value on top of the Stack
    pub fn push(&self, local: &R::Local, value: T) {
        self.check_handle(local);

        let node = Box::into_raw(Box::new(Node {
            value: ManuallyDrop::new(value),
            next: std::ptr::null_mut(),
        }));

        // Counted before the Node is visible, so a concurrent Pop can never underflow it
        self.len.fetch_add(1, atomic::Ordering::Relaxed);

        let backoff = Backoff::new();
        let mut head = self.head.load(atomic::Ordering::Acquire);
        loop {
            // Safety:
            // The Node is not shared yet
            unsafe { (*node).next = head };

            match self.head.compare_exchange_weak(
                head,
                node,
                atomic::Ordering::AcqRel,
                atomic::Ordering::Acquire,
            ) {
                Ok(_) => return,
                Err(current) => {
                    head = current;
                    backoff.spin();
                }
            }
        }
    }

    /// Removes the Value at the top of the Stack
    pub fn pop(&self, local: &R::Local) -> Option<T> {
        self.check_handle(local);

        let mut shield = local.shield();
        let backoff = Backoff::new();
        loop {
            let head = shield.protect(&*self.head);
            if head.is_null() {
                return None;
            }

            // Safety:
            // The Node is protected by the Shield and the next Ptr is never changed after the
            // Node was published
            let next = unsafe { (*head).next };

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
            // Only the Thread that unlinked the Node moves the Value out of it
            let value = unsafe { std::ptr::read(std::ptr::addr_of!((*head).value)) };

            shield.release();
            // Safety:
            // The Node was unlinked by the CAS above and is only retired by this Thread
            unsafe { local.retire(head, DropBox) };

            return Some(ManuallyDrop::into_inner(value));
        }
    }

    /// Checks if the Stack is currently empty
    pub fn is_empty(&self) -> bool {
        self.head.load(atomic::Ordering::Acquire).is_null()
    }

    /// The Number of Values currently stored in the Stack.
    ///
    /// This is only a Snapshot, as other Threads might modify the Stack at the same time
    pub fn len(&self) -> usize {
        self.len.load(atomic::Ordering::Relaxed)
    }

    /// Removes all the Values from the Stack
    pub fn clear(&self, local: &R::Local) {
        while self.pop(local).is_some() {}
    }
}

impl<T, R> Debug for TreiberStack<T, R>
where
    R: Reclaim + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "TreiberStack ( len = {}, domain = {:?} )", self.len(), self.domain)
    }
}

impl<T, R> Drop for TreiberStack<T, R>
where
    R: Reclaim,
{
    fn drop(&mut self) {
        let mut current = self.head.load(atomic::Ordering::Acquire);
        while !current.is_null() {
            // Safety:
            // No other Thread can access the Stack anymore and Nodes that are still linked were
            // never retired
            let mut node = unsafe { Box::from_raw(current) };
            current = node.next;
            unsafe { ManuallyDrop::drop(&mut node.value) };
        }
    }
}

#[cfg(all(test, not(loom)))]
mod tests {
    use super::*;

    use std::sync::Arc;

    #[test]
    fn lifo_order() {
        let stack = TreiberStack::new_in(hazard_ptr::Domain::new());
        let handle = stack.domain().attach().unwrap();
        assert!(stack.is_empty());

        for i in 0..10 {
            stack.push(&handle, i);
        }
        assert_eq!(10, stack.len());
        assert!(!stack.is_empty());

        for i in (0..10).rev() {
            assert_eq!(Some(i), stack.pop(&handle));
        }
        assert_eq!(None, stack.pop(&handle));
        assert_eq!(0, stack.len());
    }

    #[test]
    fn popped_nodes_are_reclaimed() {
        let domain = hazard_ptr::Domain::new();
        let stack = TreiberStack::new_in(domain.clone());
        let handle = domain.attach().unwrap();

        for i in 0..5u64 {
            stack.push(&handle, i);
        }
        stack.clear(&handle);
        assert!(stack.is_empty());

        handle.scan();
        let stats = domain.statistics();
        assert_eq!(5, stats.retired);
        assert_eq!(5, stats.freed);
    }

    #[test]
    fn drop_releases_values() {
        let value = Arc::new(());

        let stack = TreiberStack::new_in(hazard_ptr::Domain::new());
        let handle = stack.domain().attach().unwrap();
        stack.push(&handle, value.clone());
        stack.push(&handle, value.clone());
        assert_eq!(3, Arc::strong_count(&value));

        let popped = stack.pop(&handle);
        drop(handle);
        drop(stack);

        assert_eq!(2, Arc::strong_count(&value));
        drop(popped);
        assert_eq!(1, Arc::strong_count(&value));
    }

    #[test]
    #[cfg(feature = "epoch")]
    fn epoch_domain() {
        let stack = TreiberStack::new_in(crate::epoch::Domain::new());
        let handle = stack.domain().attach().unwrap();

        stack.push(&handle, "first".to_string());
        stack.push(&handle, "second".to_string());

        assert_eq!(Some("second".to_string()), stack.pop(&handle));
        assert_eq!(Some("first".to_string()), stack.pop(&handle));
        assert!(stack.is_empty());
    }

    #[test]
    #[should_panic(expected = "different domain")]
    fn foreign_handle() {
        let stack = TreiberStack::<u8, _>::new_in(hazard_ptr::Domain::new());
        let other = hazard_ptr::Domain::new();
        let handle = other.attach().unwrap();

        stack.push(&handle, 0);
    }

    #[test]
    fn concurrent_push_pop() {
        let stack = Arc::new(TreiberStack::new_in(hazard_ptr::Domain::new()));

        let threads: Vec<_> = (0..4)
            .map(|_| {
                let stack = stack.clone();
                std::thread::spawn(move || {
                    let handle = stack.domain().attach().unwrap();
                    let mut popped = 0;
                    for i in 0..1000 {
                        stack.push(&handle, i);
                        if stack.pop(&handle).is_some() {
                            popped += 1;
                        }
                    }
                    popped
                })
            })
            .collect();

        let popped: usize = threads.into_iter().map(|t| t.join().unwrap()).sum();
        assert_eq!(4000, popped);
        assert!(stack.is_empty());
    }
}
