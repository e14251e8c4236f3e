//! Command settle delay and the bounded busy-poll.

use embedded_hal::delay::DelayNs;

use crate::descriptor::DeviceDescriptor;
use crate::error::Error;

/// Core clock assumed when `Init` reports 0 Hz, and restored by `UnInit`.
pub const NOMINAL_CLOCK_HZ: u32 = 100_000_000;

/// Timing parameters of the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timing {
    /// CPU cycles between an erase/read command and the first STAT read.
    pub command_settle_cycles: u32,
    /// CPU cycles between a write command and the first STAT read.
    pub write_settle_cycles: u32,
    /// Delay between two STAT reads.
    pub poll_interval_us: u32,
    pub program_timeout_ms: u32,
    pub erase_timeout_ms: u32,
}

impl Timing {
    /// Settle delays of the controller, timeouts from the descriptor.
    pub const fn from_descriptor(descriptor: &DeviceDescriptor) -> Self {
        Self {
            command_settle_cycles: 4,
            write_settle_cycles: 5,
            poll_interval_us: 10,
            program_timeout_ms: descriptor.program_timeout_ms,
            erase_timeout_ms: descriptor.erase_timeout_ms,
        }
    }
}

/// Duration of `cycles` CPU cycles at `clock_hz`, rounded up.
pub fn cycles_to_ns(cycles: u32, clock_hz: u32) -> u32 {
    let clock_hz = if clock_hz == 0 {
        NOMINAL_CLOCK_HZ
    } else {
        clock_hz
    };
    let ns = (u64::from(cycles) * 1_000_000_000).div_ceil(u64::from(clock_hz));
    u32::try_from(ns).unwrap_or(u32::MAX)
}

/// Poll time left to one driver operation.
///
/// Every public operation starts one budget from its descriptor timeout and
/// spends it across all of its busy-polls, so a multi-granule program gives
/// up once the whole call has polled for the timeout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Budget {
    remaining_us: u64,
}

impl Budget {
    pub const fn from_ms(timeout_ms: u32) -> Self {
        Self {
            remaining_us: timeout_ms as u64 * 1000,
        }
    }

    pub fn remaining_us(&self) -> u64 {
        self.remaining_us
    }

    pub fn is_spent(&self) -> bool {
        self.remaining_us == 0
    }

    fn spend(&mut self, us: u32) {
        self.remaining_us = self.remaining_us.saturating_sub(u64::from(us));
    }
}

/// Calls `busy` until it returns `false`, sleeping `interval_us` between
/// calls and charging each sleep to `budget`. Fails with [`Error::Timeout`]
/// once the budget is spent and the controller is still busy.
pub fn wait_ready<D, F>(
    delay: &mut D,
    interval_us: u32,
    budget: &mut Budget,
    mut busy: F,
) -> Result<(), Error>
where
    D: DelayNs,
    F: FnMut() -> bool,
{
    let interval_us = interval_us.max(1);
    while busy() {
        if budget.is_spent() {
            error!("still busy, poll budget spent");
            return Err(Error::Timeout);
        }
        delay.delay_us(interval_us);
        budget.spend(interval_us);
    }
    Ok(())
}

/// Async counterpart of [`wait_ready`].
pub async fn wait_ready_async<D, F>(
    delay: &mut D,
    interval_us: u32,
    budget: &mut Budget,
    mut busy: F,
) -> Result<(), Error>
where
    D: embedded_hal_async::delay::DelayNs,
    F: FnMut() -> bool,
{
    let interval_us = interval_us.max(1);
    while busy() {
        if budget.is_spent() {
            error!("still busy, poll budget spent");
            return Err(Error::Timeout);
        }
        delay.delay_us(interval_us).await;
        budget.spend(interval_us);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Clock {
        ns: u64,
    }

    impl DelayNs for Clock {
        fn delay_ns(&mut self, ns: u32) {
            self.ns += u64::from(ns);
        }
    }

    #[test]
    fn settle_scales_with_clock() {
        assert_eq!(cycles_to_ns(4, 100_000_000), 40);
        assert_eq!(cycles_to_ns(5, 0), 50);
        assert_eq!(cycles_to_ns(4, 3_000_000), 1334);
    }

    #[test]
    fn ready_without_waiting() {
        let mut clock = Clock::default();
        let mut budget = Budget::from_ms(100);
        assert_eq!(wait_ready(&mut clock, 10, &mut budget, || false), Ok(()));
        assert_eq!(budget, Budget::from_ms(100));
        assert_eq!(clock.ns, 0);
    }

    #[test]
    fn ready_after_some_polls() {
        let mut clock = Clock::default();
        let mut polls = 0;
        let mut budget = Budget::from_ms(100);
        let result = wait_ready(&mut clock, 10, &mut budget, || {
            polls += 1;
            polls <= 3
        });
        assert_eq!(result, Ok(()));
        assert_eq!(polls, 4);
        assert_eq!(clock.ns, 30_000);
        assert_eq!(budget.remaining_us(), 100_000 - 30);
    }

    #[test]
    fn gives_up_at_deadline() {
        let mut clock = Clock::default();
        let mut budget = Budget::from_ms(100);
        let result = wait_ready(&mut clock, 10, &mut budget, || true);
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(clock.ns, 100 * 1_000_000);
        assert!(budget.is_spent());
    }

    #[test]
    fn budget_carries_over_between_waits() {
        let mut clock = Clock::default();
        let mut budget = Budget::from_ms(1);
        let mut first = 0;
        let result = wait_ready(&mut clock, 10, &mut budget, || {
            first += 1;
            first <= 60
        });
        assert_eq!(result, Ok(()));
        assert_eq!(budget.remaining_us(), 400);

        let mut second = 0;
        let result = wait_ready(&mut clock, 10, &mut budget, || {
            second += 1;
            second <= 60
        });
        assert_eq!(result, Err(Error::Timeout));
        assert_eq!(second, 41);
        assert_eq!(clock.ns, 1_000_000);
    }
}
