use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ember_core::event::{Event, EventDispatcher};
use ember_core::pool::{Poolable, Pooled};

#[derive(Debug, Default)]
struct Plan {
    order: Vec<u32>,
}

impl Poolable for Plan {
    fn new_empty() -> Self {
        Self::default()
    }
    fn reset(&mut self) {
        self.order.clear();
    }
}

#[derive(Debug)]
struct Resized {
    width: u32,
}

impl Event for Resized {
    fn name(&self) -> &'static str {
        "Resized"
    }
}

#[derive(Debug)]
struct Closed;

impl Event for Closed {
    fn name(&self) -> &'static str {
        "Closed"
    }
}

// ---------------------------------------------------------------------------
// Pool reuse
// ---------------------------------------------------------------------------

fn bench_pooled_frame_cycle(c: &mut Criterion) {
    let mut slot = Pooled::<Plan>::default();
    c.bench_function("pooled_plan_256", |b| {
        b.iter(|| {
            slot.activate().order.extend(0..black_box(256u32));
            slot.release();
        });
    });
}

fn bench_fresh_allocation(c: &mut Criterion) {
    c.bench_function("fresh_plan_256", |b| {
        b.iter(|| {
            let plan = Plan {
                order: (0..black_box(256u32)).collect(),
            };
            black_box(plan);
        });
    });
}

// ---------------------------------------------------------------------------
// Event dispatch
// ---------------------------------------------------------------------------

fn bench_dispatch(c: &mut Criterion) {
    c.bench_function("dispatch_two_handlers", |b| {
        b.iter(|| {
            let mut event = Resized { width: 1280 };
            let mut dispatcher = EventDispatcher::new(&mut event);
            let closed = dispatcher.dispatch(|_: &mut Closed| true);
            let resized = dispatcher.dispatch(|e: &mut Resized| black_box(e.width) > 0);
            black_box((closed, resized))
        });
    });
}

criterion_group!(
    benches,
    bench_pooled_frame_cycle,
    bench_fresh_allocation,
    bench_dispatch
);
criterion_main!(benches);
