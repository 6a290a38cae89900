//! The Per-Thread Lists of retired Ptrs that are waiting to be reclaimed

use std::fmt::Debug;

use crate::{reclaim::Disposer, Error, Result};

/// The RetireNode stores a single Pointer to retire as well as the Disposer that should be used
/// to reclaim the given Piece of Data savely
pub(crate) struct RetireNode {
    /// The Data-Pointer that should be reclaimed eventually
    ptr: *mut (),
    /// The type-erased Disposer
    disposer: *mut (),
    /// Reclaims the Data-Pointer using the Disposer, both have to be passed to it
    dispose_fn: unsafe fn(*mut (), *mut ()),
}

// Safety:
// The Disposer is required to be Send and the Data-Ptr is owned by the RetireNode, as it was
// unlinked from the shared Datastructure before it was retired
unsafe impl Send for RetireNode {}

unsafe fn dispose_erased<T, D>(ptr: *mut (), disposer: *mut ())
where
    D: Disposer<T>,
{
    let disposer = unsafe { Box::from_raw(disposer as *mut D) };
    unsafe { disposer.dispose(ptr as *mut T) };
}

impl RetireNode {
    /// Creates a new RetireNode with the given Data.
    ///
    /// Zero-Sized Disposers, like closures that capture nothing, do not allocate
    pub fn new<T, D>(ptr: *mut T, disposer: D) -> Self
    where
        D: Disposer<T>,
    {
        Self {
            ptr: ptr as *mut (),
            disposer: Box::into_raw(Box::new(disposer)) as *mut (),
            dispose_fn: dispose_erased::<T, D>,
        }
    }

    /// The Ptr that will be reclaimed
    pub fn ptr(&self) -> *mut () {
        self.ptr
    }

    /// Actually performs the reclamation of the Data
    ///
    /// # Safety
    /// No other Thread is allowed to still access the Data behind the Ptr
    pub unsafe fn dispose(self) {
        unsafe { (self.dispose_fn)(self.ptr, self.disposer) };
    }
}

impl Debug for RetireNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RetireNode ( ptr = {:p} )", self.ptr)
    }
}

/// A List of RetireNodes, each tagged with a Stamp of type `S` that the Reclamation-Scheme can
/// use to decide if it is safe to reclaim the Node
pub(crate) struct RetiredList<S = ()> {
    nodes: Vec<(S, RetireNode)>,
}

impl<S> Debug for RetiredList<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "RetiredList ( len = {} )", self.nodes.len())
    }
}

impl<S> RetiredList<S> {
    /// Creates a new List, that can hold `capacity` Nodes before it needs to grow
    pub fn try_with_capacity(capacity: usize) -> Result<Self> {
        let mut nodes = Vec::new();
        nodes
            .try_reserve_exact(capacity)
            .map_err(|_| Error::AllocationFailed {
                size: capacity * std::mem::size_of::<(S, RetireNode)>(),
            })?;

        Ok(Self { nodes })
    }

    pub fn push(&mut self, stamp: S, node: RetireNode) {
        self.nodes.push((stamp, node));
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Checks if the given Ptr is currently waiting to be reclaimed
    pub fn contains(&self, ptr: *mut ()) -> bool {
        self.nodes.iter().any(|(_, node)| node.ptr() == ptr)
    }

    /// Takes all the Nodes out of the List, leaving it empty
    pub fn take(&mut self) -> Self {
        Self {
            nodes: std::mem::take(&mut self.nodes),
        }
    }

    /// Moves all the Nodes from the other List into this one
    pub fn merge(&mut self, mut other: Self) {
        if self.nodes.is_empty() && other.nodes.capacity() >= self.nodes.capacity() {
            std::mem::swap(&mut self.nodes, &mut other.nodes);
            return;
        }

        self.nodes.append(&mut other.nodes);
    }

    /// Disposes every Node for which `can_free` returns true and keeps the rest. Returns the
    /// Number of disposed Nodes.
    ///
    /// # Safety
    /// `can_free` must only return true for Nodes that can not be accessed by any other Thread
    pub unsafe fn reclaim<F>(&mut self, mut can_free: F) -> usize
    where
        F: FnMut(&S, *mut ()) -> bool,
    {
        let mut freed = 0;
        let mut index = 0;
        while index < self.nodes.len() {
            let (stamp, node) = &self.nodes[index];
            if !can_free(stamp, node.ptr()) {
                index += 1;
                continue;
            }

            let (_, node) = self.nodes.swap_remove(index);
            unsafe { node.dispose() };
            freed += 1;
        }

        freed
    }
}

impl<S> Drop for RetiredList<S> {
    fn drop(&mut self) {
        debug_assert!(
            self.nodes.is_empty() || std::thread::panicking(),
            "retired nodes would be leaked by dropping their list"
        );
    }
}
