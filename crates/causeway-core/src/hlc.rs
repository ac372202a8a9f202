//! Hybrid logical clock.
//!
//! Timestamps pack wall-clock milliseconds and a logical counter into one
//! `u64` (`physical_ms << 16 | logical`) so they order correctly as plain
//! integers, both in memory and in the `structural_blobs.ts` column.

use std::fmt;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

const LOGICAL_BITS: u32 = 16;
const LOGICAL_MASK: u64 = (1 << LOGICAL_BITS) - 1;

/// Largest wall-clock value whose packed timestamp still fits in an `i64`.
pub const MAX_PHYSICAL_MS: u64 = (i64::MAX as u64) >> LOGICAL_BITS;

/// A packed HLC timestamp.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct HlcTimestamp(u64);

impl HlcTimestamp {
    pub const ZERO: Self = Self(0);

    pub const fn new(physical_ms: u64, logical: u16) -> Self {
        Self((physical_ms << LOGICAL_BITS) | logical as u64)
    }

    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    pub const fn physical_ms(&self) -> u64 {
        self.0 >> LOGICAL_BITS
    }

    pub const fn logical(&self) -> u16 {
        (self.0 & LOGICAL_MASK) as u16
    }

    /// The smallest timestamp strictly greater than `self`.
    pub const fn successor(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl fmt::Debug for HlcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hlc({}.{})", self.physical_ms(), self.logical())
    }
}

impl fmt::Display for HlcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.physical_ms(), self.logical())
    }
}

type WallClock = Box<dyn Fn() -> u64 + Send + Sync>;

/// Hybrid logical clock producing strictly increasing [`HlcTimestamp`]s.
///
/// - **Local event**: `physical = max(wall, last.physical)`; logical resets
///   when physical advances, otherwise increments.
/// - **Observe**: the next timestamp is also strictly greater than the
///   observed one, so a change always sorts after its dependencies.
pub struct HybridClock {
    last: Mutex<HlcTimestamp>,
    wall: WallClock,
}

impl HybridClock {
    pub fn new() -> Self {
        Self::with_wall_clock(wall_clock_ms)
    }

    /// A clock reading physical time from `wall` (milliseconds).
    pub fn with_wall_clock(wall: impl Fn() -> u64 + Send + Sync + 'static) -> Self {
        Self {
            last: Mutex::new(HlcTimestamp::ZERO),
            wall: Box::new(wall),
        }
    }

    /// Timestamp for a new local event.
    pub fn now(&self) -> HlcTimestamp {
        self.tick(HlcTimestamp::ZERO)
    }

    /// Timestamp for a local event that must follow `observed`.
    pub fn update(&self, observed: HlcTimestamp) -> HlcTimestamp {
        self.tick(observed)
    }

    /// The last timestamp handed out.
    pub fn last(&self) -> HlcTimestamp {
        *self.last.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn tick(&self, observed: HlcTimestamp) -> HlcTimestamp {
        let wall = HlcTimestamp::new((self.wall)(), 0);
        let mut last = self.last.lock().unwrap_or_else(|e| e.into_inner());

        let floor = (*last).max(observed).successor();
        let next = if wall >= floor { wall } else { floor };

        *last = next;
        next
    }
}

impl Default for HybridClock {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for HybridClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HybridClock").field("last", &self.last()).finish()
    }
}

fn wall_clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packing() {
        let ts = HlcTimestamp::new(1_700_000_000_000, 7);
        assert_eq!(ts.physical_ms(), 1_700_000_000_000);
        assert_eq!(ts.logical(), 7);
        assert!(HlcTimestamp::new(5, 0) > HlcTimestamp::new(4, u16::MAX));
    }

    #[test]
    fn test_monotonic_with_frozen_wall() {
        let clock = HybridClock::with_wall_clock(|| 1000);
        let a = clock.now();
        let b = clock.now();
        let c = clock.now();
        assert_eq!(a, HlcTimestamp::new(1000, 0));
        assert_eq!(b, HlcTimestamp::new(1000, 1));
        assert_eq!(c, HlcTimestamp::new(1000, 2));
    }

    #[test]
    fn test_update_jumps_past_observed() {
        let clock = HybridClock::with_wall_clock(|| 1000);
        let remote = HlcTimestamp::new(5000, 3);
        let ts = clock.update(remote);
        assert!(ts > remote);
        assert_eq!(ts, HlcTimestamp::new(5000, 4));
        assert!(clock.now() > ts);
    }

    #[test]
    fn test_wall_clock_ahead_resets_logical() {
        let clock = HybridClock::with_wall_clock(|| 9000);
        let ts = clock.update(HlcTimestamp::new(5000, 3));
        assert_eq!(ts, HlcTimestamp::new(9000, 0));
    }

    #[test]
    fn test_real_clock_strictly_increasing() {
        let clock = HybridClock::new();
        let mut prev = clock.now();
        for _ in 0..1000 {
            let next = clock.now();
            assert!(next > prev);
            prev = next;
        }
    }
}
