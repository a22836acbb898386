//! Wrap/drop churn for every handle kind, for watching steady memory use
//! from outside (top, heaptrack, a leak checker).
//!
//! The first argument bounds the iterations per phase; default is ten
//! million. Progress goes through the logger, so run with `RUST_LOG=info`.

use std::env;

use handle::{Handle, Unique};
use log::info;

const PROGRESS_EVERY: u64 = 1_000_000;
const DEFAULT_ITERATIONS: u64 = 10_000_000;

struct Payload {
    index: u64,
}

fn exclusive_churn(iterations: u64) -> u64 {
    info!("exclusive churn: {iterations} iterations");
    let mut checksum = 0u64;
    for index in 0..iterations {
        let sole = Unique::new(Payload { index });
        // Read through the handle so every wrap is actually exercised.
        checksum = checksum.wrapping_add(sole.index);
        if index % PROGRESS_EVERY == 0 {
            info!("exclusive churn at #{index}");
        }
    }
    checksum
}

fn shared_churn(iterations: u64) -> u64 {
    info!("shared churn: {iterations} iterations");
    let mut checksum = 0u64;
    for index in 0..iterations {
        let strong = Handle::new(Payload { index });
        let copy = strong.clone();
        checksum = checksum.wrapping_add(copy.index);
        if index % PROGRESS_EVERY == 0 {
            info!("shared churn at #{index}, ref-count {}", strong.ref_count());
        }
    }
    checksum
}

fn observer_churn(iterations: u64) -> u64 {
    info!("observer churn: {iterations} iterations");
    let mut checksum = 0u64;
    for index in 0..iterations {
        let strong = Handle::new(Payload { index });
        let observer = strong.create_ref();
        if let Some(locked) = observer.upgrade() {
            checksum = checksum.wrapping_add(locked.index);
        }
        // A second observer checks that abandoned weak counts are reclaimed.
        let _observer_copy = observer.clone();
        if index % PROGRESS_EVERY == 0 {
            info!("observer churn at #{index}, expired {}", observer.expired());
        }
    }
    checksum
}

fn main() {
    env_logger::init();

    let iterations = env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .unwrap_or(DEFAULT_ITERATIONS);

    let mut checksum = 0u64;
    checksum = checksum.wrapping_add(exclusive_churn(iterations));
    checksum = checksum.wrapping_add(shared_churn(iterations));
    checksum = checksum.wrapping_add(observer_churn(iterations));
    info!("done, checksum {checksum}; every allocation above should be reclaimed");
}
