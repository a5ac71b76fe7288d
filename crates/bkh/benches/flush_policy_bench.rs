//! 📊 Benchmarks the pure hot path: one policy verdict per consumed record.
//! If this ever shows up in a profile, something has gone very wrong —
//! it exists so we notice when something goes very wrong.

use std::time::{Duration, Instant};

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use bkh::policy::FlushPolicy;

fn bench_decide(c: &mut Criterion) {
    let policy = FlushPolicy::new(500, Duration::from_millis(5000));
    let now = Instant::now();
    let deadline = policy.arm(now);

    c.bench_function("flush_policy_decide", |b| {
        let mut record_count = 0u64;
        b.iter(|| {
            record_count += 1;
            black_box(policy.decide(false, black_box(record_count), deadline, now))
        })
    });

    c.bench_function("flush_policy_decide_heartbeat", |b| {
        b.iter(|| black_box(policy.decide(true, black_box(499), deadline, now)))
    });
}

criterion_group!(benches, bench_decide);
criterion_main!(benches);
