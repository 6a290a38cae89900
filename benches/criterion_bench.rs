use criterion::{criterion_group, criterion_main};

mod queue;

criterion_group!(
    containers,
    stack::push_pop,
    stack::concurrent_push_pop,
    queue::enqueue_dequeue,
    queue::concurrent_enqueue_dequeue,
);

criterion_group!(reclamation, stack::retire_scan);

criterion_main!(containers, reclamation);
