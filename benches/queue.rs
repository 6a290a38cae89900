use std::sync::Arc;

use criterion::{black_box, Criterion, Throughput};
use lfcds::{epoch, hazard_ptr, queue::MsQueue, reclaim::Reclaim};

const THREADS: usize = 4;
const CONCURRENT_OPS: usize = 1000;

fn single<R>(group_name: &str, domain: R, ctx: &mut Criterion)
where
    R: Reclaim,
{
    let mut group = ctx.benchmark_group("queue-enqueue-dequeue");
    group.throughput(Throughput::Elements(2));

    group.bench_function(group_name, |b| {
        let queue = MsQueue::new_in(domain.clone());
        let handle = domain.attach().unwrap();

        b.iter(|| {
            queue.enqueue(&handle, black_box(13u64));
            assert_eq!(Some(13), queue.dequeue(&handle));
        });
    });
}

pub fn enqueue_dequeue(ctx: &mut Criterion) {
    single("hazard-ptr", hazard_ptr::Domain::new(), ctx);
    single("epoch", epoch::Domain::new(), ctx);
}

fn concurrent<R>(queue: &Arc<MsQueue<u64, R>>)
where
    R: Reclaim,
{
    let ths: Vec<_> = (0..THREADS)
        .map(|_| {
            let queue = queue.clone();
            std::thread::spawn(move || {
                let handle = queue.domain().attach().unwrap();
                for i in 0..CONCURRENT_OPS {
                    queue.enqueue(&handle, i as u64);
                    black_box(queue.dequeue(&handle));
                }
            })
        })
        .collect();

    for th in ths {
        th.join().unwrap();
    }
}

pub fn concurrent_enqueue_dequeue(ctx: &mut Criterion) {
    let mut group = ctx.benchmark_group("queue-concurrent");
    group.throughput(Throughput::Elements((THREADS * CONCURRENT_OPS * 2) as u64));

    let hazard = Arc::new(MsQueue::new_in(hazard_ptr::Domain::new()));
    group.bench_function("hazard-ptr", |b| b.iter(|| concurrent(&hazard)));

    let epoch = Arc::new(MsQueue::new_in(epoch::Domain::new()));
    group.bench_function("epoch", |b| b.iter(|| concurrent(&epoch)));
}
