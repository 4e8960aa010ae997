use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::{TimeDelta, TimeZone, Utc};

use shiftcheck::model::{ResourceId, Span};
use shiftcheck::scheduler::ResourceScheduler;

const WORKERS: usize = 8;
const SLOTS_PER_WORKER: usize = 5_000;
const EMPLOYEES: usize = 50;
const MACHINES: usize = 10;

fn percentile(sorted: &[Duration], p: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let idx = ((sorted.len() as f64) * p / 100.0) as usize;
    sorted[idx.min(sorted.len() - 1)]
}

fn print_latency(label: &str, latencies: &mut [Duration]) {
    if latencies.is_empty() {
        println!("  {label}: n=0");
        return;
    }
    latencies.sort();
    let total: Duration = latencies.iter().sum();
    let avg = total / latencies.len() as u32;
    println!("  {label}:");
    println!(
        "    n={}, avg={:.3}ms, p50={:.3}ms, p95={:.3}ms, p99={:.3}ms, max={:.3}ms",
        latencies.len(),
        avg.as_secs_f64() * 1000.0,
        percentile(latencies, 50.0).as_secs_f64() * 1000.0,
        percentile(latencies, 95.0).as_secs_f64() * 1000.0,
        percentile(latencies, 99.0).as_secs_f64() * 1000.0,
        latencies[latencies.len() - 1].as_secs_f64() * 1000.0,
    );
}

/// Cheap deterministic pseudo-random sequence (xorshift).
fn next(state: &mut u64) -> u64 {
    *state ^= *state << 13;
    *state ^= *state >> 7;
    *state ^= *state << 17;
    *state
}

struct WorkerResult {
    accepted: Vec<Duration>,
    rejected: Vec<Duration>,
}

fn worker(scheduler: Arc<ResourceScheduler>, seed: u64) -> WorkerResult {
    let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut state = seed | 1;
    let mut result = WorkerResult {
        accepted: Vec::new(),
        rejected: Vec::new(),
    };

    for _ in 0..SLOTS_PER_WORKER {
        let employee = ResourceId::employee(format!("E{}", next(&mut state) as usize % EMPLOYEES));
        let machine = ResourceId::machine(format!("M{}", next(&mut state) as usize % MACHINES));
        // 30-minute grid over a year, 30-120 minute tasks
        let slot = (next(&mut state) % (365 * 48)) as i64;
        let length = 30 * (1 + (next(&mut state) % 4) as i64);
        let start = base + TimeDelta::minutes(slot * 30);
        let span = match Span::new(start, start + TimeDelta::minutes(length)) {
            Ok(span) => span,
            Err(_) => continue,
        };

        let t = Instant::now();
        let outcome = scheduler.book(&[employee, machine], span, "stress");
        let elapsed = t.elapsed();
        match outcome {
            Ok(_) => result.accepted.push(elapsed),
            Err(_) => result.rejected.push(elapsed),
        }
    }
    result
}

fn main() {
    println!("shiftcheck scheduler stress");
    println!(
        "  workers={WORKERS}, attempts/worker={SLOTS_PER_WORKER}, employees={EMPLOYEES}, machines={MACHINES}"
    );

    let scheduler = Arc::new(ResourceScheduler::new());
    let started = Instant::now();
    let handles: Vec<_> = (0..WORKERS)
        .map(|i| {
            let scheduler = scheduler.clone();
            thread::spawn(move || worker(scheduler, 0x9E37_79B9_7F4A_7C15 ^ (i as u64 + 1)))
        })
        .collect();

    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for h in handles {
        let r = h.join().expect("worker panicked");
        accepted.extend(r.accepted);
        rejected.extend(r.rejected);
    }
    let wall = started.elapsed();

    let attempts = accepted.len() + rejected.len();
    println!(
        "  {attempts} attempts in {:.2}s ({:.0} ops/s), {} booked",
        wall.as_secs_f64(),
        attempts as f64 / wall.as_secs_f64(),
        scheduler.booking_count()
    );
    print_latency("accepted", &mut accepted);
    print_latency("rejected", &mut rejected);

    // Invariant check: no resource is double-booked.
    for resource in scheduler.resources() {
        let schedule = scheduler.schedule_for(&resource);
        for pair in schedule.windows(2) {
            assert!(
                pair[0].span.end() <= pair[1].span.start(),
                "{resource} double-booked"
            );
        }
    }
    println!("  no double bookings");
}
