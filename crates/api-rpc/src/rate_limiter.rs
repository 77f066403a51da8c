//! Token bucket guarding mutating RPC methods.
//!
//! State is one `AtomicU64`: the upper half holds the balance in
//! thousandths of a token, the lower half the last refill time in
//! milliseconds since the limiter was created. Updates are CAS loops.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

const MILLI: u64 = 1_000;

pub struct RateLimiter {
    packed: AtomicU64,
    origin: Instant,
    capacity_milli: u64,
    /// Tokens added per second
    refill_per_sec: u64,
}

fn pack(balance_milli: u64, at_ms: u32) -> u64 {
    (balance_milli << 32) | at_ms as u64
}

fn unpack(packed: u64) -> (u64, u32) {
    (packed >> 32, (packed & 0xFFFF_FFFF) as u32)
}

impl RateLimiter {
    /// `burst` tokens available up front, refilled at `per_sec` tokens per second.
    ///
    /// A zero burst is raised to one so the limiter never rejects everything.
    pub fn new(burst: u32, per_sec: u32) -> Self {
        // Balance must fit the upper 32 bits
        let capacity_milli = (burst.max(1) as u64 * MILLI).min(u32::MAX as u64);
        Self {
            packed: AtomicU64::new(pack(capacity_milli, 0)),
            origin: Instant::now(),
            capacity_milli,
            refill_per_sec: per_sec as u64,
        }
    }

    fn elapsed_ms(&self) -> u32 {
        u32::try_from(self.origin.elapsed().as_millis()).unwrap_or(u32::MAX)
    }

    /// Take one token; `false` when the bucket is empty
    pub fn try_acquire(&self) -> bool {
        loop {
            let current = self.packed.load(Ordering::Acquire);
            let (balance, last_ms) = unpack(current);
            let now_ms = self.elapsed_ms();

            // refill_per_sec tokens/s == refill_per_sec milli-tokens/ms
            let refill = now_ms.saturating_sub(last_ms) as u64 * self.refill_per_sec;
            let available = balance.saturating_add(refill).min(self.capacity_milli);

            let (next, granted) = if available >= MILLI {
                (available - MILLI, true)
            } else {
                (available, false)
            };

            if self
                .packed
                .compare_exchange(
                    current,
                    pack(next, now_ms),
                    Ordering::AcqRel,
                    Ordering::Acquire,
                )
                .is_ok()
            {
                return granted;
            }
        }
    }

    /// Whole tokens left (without refilling)
    pub fn available(&self) -> u64 {
        unpack(self.packed.load(Ordering::Acquire)).0 / MILLI
    }
}
