//! Fenced hardware cycle-counter reads.
//!
//! The fencing is asymmetric:
//! - `read_begin`: `lfence; rdtsc`. Earlier instructions retire before the
//!   counter is sampled.
//! - `read_end`: `rdtscp; lfence`. `rdtscp` waits for earlier instructions
//!   itself, and the trailing fence keeps later instructions from starting
//!   before the sample is taken.
//!
//! Readings are per-core. Run pinned to one CPU (taskset or
//! `[pinning] cpu_affinity`) so begin and end come from the same counter.

use latency_common::time::CycleTimestamp;

/// Source of begin/end timestamps for one measured interval.
pub trait ClockSource {
    /// Timestamp taken at the start of a measured interval.
    fn read_begin(&mut self) -> CycleTimestamp;

    /// Timestamp taken at the end of a measured interval.
    fn read_end(&mut self) -> CycleTimestamp;
}

/// The platform cycle counter.
#[derive(Debug, Clone, Copy, Default)]
pub struct Tsc;

impl Tsc {
    /// Counter name for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        #[cfg(target_arch = "x86_64")]
        {
            "rdtsc"
        }
        #[cfg(target_arch = "aarch64")]
        {
            "cntvct_el0"
        }
        #[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
        {
            "monotonic-ns"
        }
    }
}

impl ClockSource for Tsc {
    #[inline(always)]
    fn read_begin(&mut self) -> CycleTimestamp {
        CycleTimestamp(begin_cycles())
    }

    #[inline(always)]
    fn read_end(&mut self) -> CycleTimestamp {
        CycleTimestamp(end_cycles())
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn begin_cycles() -> u64 {
    use core::arch::x86_64::{_mm_lfence, _rdtsc};

    // SAFETY: lfence and rdtsc are available on every x86_64 CPU.
    unsafe {
        _mm_lfence();
        _rdtsc()
    }
}

#[cfg(target_arch = "x86_64")]
#[inline(always)]
fn end_cycles() -> u64 {
    use core::arch::x86_64::{__rdtscp, _mm_lfence};

    // The processor id written by rdtscp is unused; pinning is the caller's job.
    let mut aux = 0u32;
    // SAFETY: rdtscp is available on all x86_64 CPUs this tool targets
    // (invariant-TSC hardware); `aux` is a valid write target.
    unsafe {
        let cycles = __rdtscp(&mut aux);
        _mm_lfence();
        cycles
    }
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn begin_cycles() -> u64 {
    let cycles: u64;
    // SAFETY: reading the virtual counter is permitted at EL0 on Linux.
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {}, cntvct_el0",
            out(reg) cycles,
            options(nostack, nomem),
        );
    }
    cycles
}

#[cfg(target_arch = "aarch64")]
#[inline(always)]
fn end_cycles() -> u64 {
    let cycles: u64;
    // SAFETY: reading the virtual counter is permitted at EL0 on Linux.
    unsafe {
        std::arch::asm!(
            "isb",
            "mrs {}, cntvct_el0",
            "isb",
            out(reg) cycles,
            options(nostack, nomem),
        );
    }
    cycles
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
fn monotonic_ns() -> u64 {
    use std::sync::atomic::{compiler_fence, Ordering};
    use std::sync::OnceLock;
    use std::time::Instant;

    static START: OnceLock<Instant> = OnceLock::new();

    compiler_fence(Ordering::SeqCst);
    let ns = START.get_or_init(Instant::now).elapsed().as_nanos() as u64;
    compiler_fence(Ordering::SeqCst);
    ns
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn begin_cycles() -> u64 {
    monotonic_ns()
}

#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
#[inline]
fn end_cycles() -> u64 {
    monotonic_ns()
}

#[cfg(test)]
pub(crate) use scripted::ScriptedClock;

#[cfg(test)]
mod scripted {
    use super::ClockSource;
    use latency_common::time::CycleTimestamp;

    /// Clock that replays pre-recorded readings, for driving the engine in tests.
    ///
    /// Begin and end readings are drawn from separate queues. Once a queue is
    /// exhausted, further reads return its last value (or zero if it was empty).
    #[derive(Debug, Clone, Default)]
    pub(crate) struct ScriptedClock {
        begins: std::collections::VecDeque<u64>,
        ends: std::collections::VecDeque<u64>,
        last_begin: u64,
        last_end: u64,
    }

    impl ScriptedClock {
        /// Clock that yields `begins` from `read_begin` and `ends` from `read_end`.
        pub fn new(
            begins: impl IntoIterator<Item = u64>,
            ends: impl IntoIterator<Item = u64>,
        ) -> Self {
            Self {
                begins: begins.into_iter().collect(),
                ends: ends.into_iter().collect(),
                last_begin: 0,
                last_end: 0,
            }
        }

        /// Number of begin readings not yet consumed.
        #[must_use]
        pub fn remaining_begins(&self) -> usize {
            self.begins.len()
        }

        /// Number of end readings not yet consumed.
        #[must_use]
        pub fn remaining_ends(&self) -> usize {
            self.ends.len()
        }
    }

    impl ClockSource for ScriptedClock {
        fn read_begin(&mut self) -> CycleTimestamp {
            if let Some(v) = self.begins.pop_front() {
                self.last_begin = v;
            }
            CycleTimestamp(self.last_begin)
        }

        fn read_end(&mut self) -> CycleTimestamp {
            if let Some(v) = self.ends.pop_front() {
                self.last_end = v;
            }
            CycleTimestamp(self.last_end)
        }
    }
}
