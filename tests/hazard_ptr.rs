use std::sync::{
    atomic::{self, AtomicPtr, AtomicUsize},
    mpsc, Arc, Barrier,
};

use lfcds::{hazard_ptr, reclaim::DropBox, Config};

struct Element {
    value: u32,
    dropped: Arc<AtomicUsize>,
}
impl Drop for Element {
    fn drop(&mut self) {
        self.dropped.fetch_add(1, atomic::Ordering::SeqCst);
    }
}

fn element(value: u32, dropped: &Arc<AtomicUsize>) -> *mut Element {
    Box::into_raw(Box::new(Element {
        value,
        dropped: dropped.clone(),
    }))
}

#[test]
fn protect_boxed() {
    let dropped_initial = Arc::new(AtomicUsize::new(0));
    let initial_ptr = element(0, &dropped_initial);
    let list_head = AtomicPtr::new(initial_ptr);

    hazard_ptr::with_handle(|handle| {
        let mut initial_guard = handle.guard();
        let initial = initial_guard.protect(&list_head);

        let new_ptr = element(1, &Arc::new(AtomicUsize::new(0)));
        if list_head
            .compare_exchange(
                initial_ptr,
                new_ptr,
                atomic::Ordering::SeqCst,
                atomic::Ordering::SeqCst,
            )
            .is_ok()
        {
            unsafe { handle.retire(initial_ptr, DropBox) };
        }

        assert_eq!(0, unsafe { &*initial }.value);

        let mut new_guard = handle.guard();
        assert_eq!(1, unsafe { &*new_guard.protect(&list_head) }.value);

        drop(initial_guard);
        handle.scan();
        assert_eq!(1, dropped_initial.load(atomic::Ordering::SeqCst));

        drop(new_guard);
        let last = list_head.swap(std::ptr::null_mut(), atomic::Ordering::SeqCst);
        unsafe { handle.retire(last, DropBox) };
    })
    .unwrap();

    hazard_ptr::reclaim().unwrap();
    hazard_ptr::detach();
}

#[test]
fn single_thread_protect_retire_scan() {
    let domain = hazard_ptr::Domain::new();
    let handle = domain.attach().unwrap();

    let dropped = Arc::new(AtomicUsize::new(0));
    let x = element(7, &dropped);
    let slot_a = AtomicPtr::new(x);

    let mut guard = handle.guard();
    assert_eq!(x, guard.protect(&slot_a));

    slot_a.store(std::ptr::null_mut(), atomic::Ordering::SeqCst);
    unsafe { handle.retire(x, DropBox) };

    assert_eq!(0, handle.scan());
    assert_eq!(0, dropped.load(atomic::Ordering::SeqCst));

    drop(guard);
    assert_eq!(1, handle.scan());
    assert_eq!(1, dropped.load(atomic::Ordering::SeqCst));

    assert_eq!(0, handle.scan());
    assert_eq!(1, dropped.load(atomic::Ordering::SeqCst));
}

#[test]
fn scan_observes_other_threads() {
    let domain = hazard_ptr::Domain::new();
    let dropped = Arc::new(AtomicUsize::new(0));
    let shared = Arc::new(AtomicPtr::new(element(3, &dropped)));

    let (protected_tx, protected_rx) = mpsc::channel();
    let (scanned_tx, scanned_rx) = mpsc::channel();
    let (released_tx, released_rx) = mpsc::channel();

    let reader = {
        let domain = domain.clone();
        let shared = shared.clone();
        std::thread::spawn(move || {
            let handle = domain.attach().unwrap();
            let mut guard = handle.guard();
            let y = guard.protect(&*shared);
            protected_tx.send(()).unwrap();

            scanned_rx.recv().unwrap();
            assert_eq!(3, unsafe { &*y }.value);

            drop(guard);
            released_tx.send(()).unwrap();
        })
    };

    let handle = domain.attach().unwrap();
    protected_rx.recv().unwrap();

    let y = shared.swap(std::ptr::null_mut(), atomic::Ordering::SeqCst);
    unsafe { handle.retire(y, DropBox) };
    assert_eq!(0, handle.scan());
    assert_eq!(0, dropped.load(atomic::Ordering::SeqCst));
    scanned_tx.send(()).unwrap();

    released_rx.recv().unwrap();
    assert_eq!(1, handle.scan());
    assert_eq!(1, dropped.load(atomic::Ordering::SeqCst));

    reader.join().unwrap();
}

/// Disposes a boxed Index and counts the invocation for that Index
fn counting(invocations: &Arc<Vec<AtomicUsize>>) -> impl FnOnce(*mut usize) + Send + 'static {
    let invocations = invocations.clone();
    move |ptr: *mut usize| {
        let index = *unsafe { Box::from_raw(ptr) };
        invocations[index].fetch_add(1, atomic::Ordering::SeqCst);
    }
}

#[test]
fn every_retired_node_is_disposed_once() {
    const THREADS: usize = 4;
    const NODES: usize = 10_000;

    let domain = hazard_ptr::Domain::with_config(Config::default().with_hazards_per_thread(1))
        .unwrap();
    // One Counter for every Node, including the initial one
    let invocations: Arc<Vec<AtomicUsize>> =
        Arc::new((0..=THREADS * NODES).map(|_| AtomicUsize::new(0)).collect());
    let shared = Arc::new(AtomicPtr::new(Box::into_raw(Box::new(THREADS * NODES))));
    let barrier = Arc::new(Barrier::new(THREADS));

    let threads: Vec<_> = (0..THREADS)
        .map(|id| {
            let domain = domain.clone();
            let shared = shared.clone();
            let barrier = barrier.clone();
            let invocations = invocations.clone();
            std::thread::spawn(move || {
                let handle = domain.attach().unwrap();
                barrier.wait();

                for i in 0..NODES {
                    let mut guard = handle.guard();
                    let current = guard.protect(&*shared);
                    assert!(unsafe { *current } <= THREADS * NODES);
                    drop(guard);

                    let n_ptr = Box::into_raw(Box::new(id * NODES + i));
                    let old = shared.swap(n_ptr, atomic::Ordering::SeqCst);
                    unsafe { handle.retire(old, counting(&invocations)) };
                }
            })
        })
        .collect();
    for thread in threads {
        thread.join().unwrap();
    }

    let handle = domain.attach().unwrap();
    let last = shared.swap(std::ptr::null_mut(), atomic::Ordering::SeqCst);
    unsafe { handle.retire(last, counting(&invocations)) };
    drop(handle);
    domain.collect().unwrap();

    let stats = domain.statistics();
    assert_eq!((THREADS * NODES + 1) as u64, stats.retired);
    assert_eq!(stats.retired, stats.freed);
    assert!(invocations
        .iter()
        .all(|count| count.load(atomic::Ordering::SeqCst) == 1));
}

lfcds::create_hazard_domain!(
    /// A Domain only used by this Test
    test_domain
);

#[test]
fn custom_process_domain() {
    let dropped = Arc::new(AtomicUsize::new(0));
    let ptr = element(9, &dropped);
    let shared = AtomicPtr::new(ptr);

    let value = test_domain::with_handle(|handle| {
        let mut guard = handle.guard();
        unsafe { &*guard.protect(&shared) }.value
    })
    .unwrap();
    assert_eq!(9, value);

    shared.store(std::ptr::null_mut(), atomic::Ordering::SeqCst);
    unsafe { test_domain::retire(ptr, DropBox) }.unwrap();
    assert_eq!(1, test_domain::reclaim().unwrap());
    assert_eq!(1, dropped.load(atomic::Ordering::SeqCst));

    assert_eq!(1, test_domain::domain().statistics().attached);
    test_domain::detach();
    assert_eq!(0, test_domain::domain().statistics().attached);
}

lfcds::create_hazard_domain!(
    /// A Domain whose Disposers retire more Ptrs
    chained_domain
);

struct Link {
    inner: *mut Element,
}

fn unchain(ptr: *mut Link) {
    let link = unsafe { Box::from_raw(ptr) };
    unsafe { chained_domain::retire(link.inner, DropBox) }.unwrap();
}

#[test]
fn disposers_can_retire() {
    const LINKS: usize = 200;

    let dropped = Arc::new(AtomicUsize::new(0));
    for i in 0..LINKS {
        let link = Box::into_raw(Box::new(Link {
            inner: element(i as u32, &dropped),
        }));
        unsafe { chained_domain::retire(link, unchain) }.unwrap();
    }

    // The first Round disposes the remaining Links, the second one the Elements they retired
    chained_domain::reclaim().unwrap();
    chained_domain::reclaim().unwrap();

    let stats = chained_domain::domain().statistics();
    assert_eq!(2 * LINKS as u64, stats.retired);
    assert_eq!(stats.retired, stats.freed);
    assert_eq!(LINKS, dropped.load(atomic::Ordering::SeqCst));

    chained_domain::detach();
}

lfcds::create_hazard_domain!(
    /// A Domain used while its Thread is exiting
    exiting_domain
);

#[test]
fn handle_is_unavailable_while_thread_exits() {
    let (tx, rx) = mpsc::channel();

    std::thread::spawn(move || {
        // Only disposed by the final Scan, when the Thread-Local Handle is already being dropped
        let disposer = move |ptr: *mut u8| {
            drop(unsafe { Box::from_raw(ptr) });
            tx.send(exiting_domain::with_handle(|_| ())).unwrap();
        };
        unsafe { exiting_domain::retire(Box::into_raw(Box::new(0u8)), disposer) }.unwrap();
    })
    .join()
    .unwrap();

    assert_eq!(Err(lfcds::Error::ThreadExiting), rx.recv().unwrap());
    assert_eq!(0, exiting_domain::domain().statistics().pending());
}
