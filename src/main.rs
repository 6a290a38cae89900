use std::{sync::Arc, thread, time::Instant};

use lfcds::{
    epoch, hazard_ptr, queue::MsQueue, reclaim::Reclaim, stack::TreiberStack, Config, Result,
};
use tracing_subscriber::EnvFilter;

const ITERATIONS: usize = 100000;
const THREADS: usize = 8;

/// Every Thread pushes and pops on a shared Stack and Queue, so Nodes are constantly retired
/// while other Threads are still reading them
fn stress<R>(name: &'static str, domain: R) -> Result<()>
where
    R: Reclaim,
{
    let stack = Arc::new(TreiberStack::new_in(domain.clone()));
    let queue = Arc::new(MsQueue::new_in(domain.clone()));

    let start = Instant::now();
    let ths: Vec<_> = (0..THREADS)
        .map(|_| {
            let stack = stack.clone();
            let queue = queue.clone();
            thread::spawn(move || -> Result<usize> {
                let handle = stack.domain().attach()?;

                let mut received = 0;
                for i in 0..ITERATIONS {
                    stack.push(&handle, i as u64);
                    queue.enqueue(&handle, i as u64);

                    if stack.pop(&handle).is_some() {
                        received += 1;
                    }
                    if queue.dequeue(&handle).is_some() {
                        received += 1;
                    }
                }

                Ok(received)
            })
        })
        .collect();

    let mut received = 0;
    for th in ths {
        received += th.join().expect("stress thread panicked")?;
    }
    let duration = start.elapsed();

    // Detaching the last Handle adopts and reclaims everything the stress Threads left behind
    let handle = domain.attach()?;
    stack.clear(&handle);
    queue.clear(&handle);
    drop(handle);

    let stats = domain.statistics();
    tracing::info!(
        name,
        ?duration,
        received,
        retired = stats.retired,
        freed = stats.freed,
        pending = stats.pending(),
        scans = stats.scans,
        registered = stats.registered,
        "finished stress run"
    );

    Ok(())
}

pub fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lfcds=info")),
        )
        .init();

    let config = Config::default().with_scan_threshold(128);

    stress("hazard-pointers", hazard_ptr::Domain::with_config(config)?)?;
    stress("epoch", epoch::Domain::with_config(config)?)?;

    Ok(())
}
