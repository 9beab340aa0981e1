//! Benchmarks for the event scheduler

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use qnet_core::{EventKind, QnetResult, SimTime};
use qnet_scheduler::{EventHandler, Flow, RunBudget, Scheduler};

/// Each emit schedules one loss decision after a fixed delay
struct Relay {
    delay: SimTime,
    decisions: u64,
}

impl EventHandler for Relay {
    fn on_emit(&mut self, link: usize, scheduler: &mut Scheduler) -> QnetResult<Flow> {
        scheduler.schedule_after(self.delay, EventKind::LossDecision { link })?;
        Ok(Flow::Continue)
    }

    fn on_loss_decision(&mut self, _link: usize, _scheduler: &mut Scheduler) -> QnetResult<Flow> {
        self.decisions += 1;
        Ok(Flow::Continue)
    }

    fn on_measure(&mut self, _station: usize, _scheduler: &mut Scheduler) -> QnetResult<Flow> {
        Ok(Flow::Continue)
    }

    fn on_swap_done(&mut self, _station: usize, _scheduler: &mut Scheduler) -> QnetResult<Flow> {
        Ok(Flow::Continue)
    }
}

fn bench_dispatch(c: &mut Criterion) {
    let mut group = c.benchmark_group("scheduler_dispatch");
    let delay = SimTime::from_nanos(50_000.0).unwrap_or(SimTime::ZERO);

    for links in [16usize, 256, 4096] {
        group.throughput(Throughput::Elements(2 * links as u64));
        group.bench_with_input(BenchmarkId::from_parameter(links), &links, |b, &links| {
            b.iter(|| {
                let mut scheduler = Scheduler::new(RunBudget::unlimited());
                for link in 0..links {
                    let _ = scheduler.schedule_at(SimTime::ZERO, EventKind::Emit { link });
                }
                let mut relay = Relay { delay, decisions: 0 };
                let _ = scheduler.run_until_empty(&mut relay);
                black_box(relay.decisions)
            })
        });
    }
    group.finish();
}

fn bench_schedule_interleaved(c: &mut Criterion) {
    c.bench_function("scheduler_schedule_interleaved", |b| {
        b.iter(|| {
            let mut scheduler = Scheduler::default();
            for i in 0..1024u32 {
                let t = SimTime::from_nanos(f64::from(i % 37)).unwrap_or(SimTime::ZERO);
                let _ = scheduler.schedule_at(t, EventKind::Measure { station: i as usize });
            }
            black_box(scheduler.pending())
        })
    });
}

criterion_group!(benches, bench_dispatch, bench_schedule_interleaved);
criterion_main!(benches);
