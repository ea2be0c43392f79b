//! Cooperative, single-threaded interleave of every device sharing the master clock.
//!
//! Every device keeps its own cycle counter in master clock ticks. Each scheduler pass advances
//! the devices in a fixed order up to a shared target, so a device never observes another
//! device's state from ahead of its own cycle. See [`Scheduler::run_frame`].

use bincode::{Decode, Encode};

/// Once the reference cycle counter crosses this threshold, the scheduler rebases every device's
/// counters down by `target - REBASE_MARGIN` to keep them away from `u64` overflow indefinitely.
/// Kept well below `u64::MAX`; the teacher's master-clock counters are 32-bit, but this backend
/// uses 64-bit counters and only needs to rebase often enough to keep displacement values compact.
const REBASE_THRESHOLD: u64 = 1 << 30;
const REBASE_MARGIN: u64 = 1 << 20;

/// A schedulable unit: a CPU core, the VDP, an audio chip, or the CD drive MCU. `run_until`
/// advances the device's internal state until its own cycle counter reaches (or passes) `target`,
/// returning the cycle it actually stopped at (which may overshoot `target` if the device can only
/// stop at instruction/sample boundaries).
pub trait Device {
    fn cycle(&self) -> u64;

    fn run_until(&mut self, target: u64) -> u64;

    /// Subtract `deduction` from every internal cycle tracker, saturating at 0.
    fn rebase(&mut self, deduction: u64);

    /// Signal that the device's running translation/loop should return to the scheduler at the
    /// next opportunity, without necessarily having reached `target`.
    fn request_exit(&mut self) {}
}

/// Orchestrates a fixed ordered list of [`Device`]s through one catch-up pass per frame slice.
/// The order devices are added in is the order they are caught up in every pass, matching the
/// CPU1 → CPU2 → VDP → audio → CD MCU dependency chain described by the scheduling model.
#[derive(Debug, Clone, Default, Encode, Decode)]
pub struct Scheduler {
    last_sync: u64,
}

impl Scheduler {
    #[must_use]
    pub fn new() -> Self {
        Self { last_sync: 0 }
    }

    #[must_use]
    pub fn last_sync(&self) -> u64 {
        self.last_sync
    }

    /// Runs one catch-up pass: each device in `devices` is advanced in order, up to the greatest
    /// cycle counter reached so far in this pass (or `self.last_sync + frame_slice` for the first
    /// device). Returns the new reference cycle, i.e. the cycle every device has now reached or
    /// passed.
    ///
    /// `devices` must be supplied in dependency order: a later device is allowed to observe the
    /// just-updated state of an earlier one.
    pub fn run_frame(&mut self, frame_slice: u64, devices: &mut [&mut dyn Device]) -> u64 {
        let mut target = self.last_sync + frame_slice;

        for device in devices.iter_mut() {
            let reached = device.run_until(target);
            target = target.max(reached);
        }

        self.last_sync = target;

        if target >= REBASE_THRESHOLD {
            let deduction = target - REBASE_MARGIN;
            for device in devices.iter_mut() {
                device.rebase(deduction);
            }
            self.last_sync -= deduction;
        }

        self.last_sync
    }

    pub fn request_exit_all(&self, devices: &mut [&mut dyn Device]) {
        for device in devices.iter_mut() {
            device.request_exit();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingDevice {
        cycle: u64,
        step: u64,
    }

    impl Device for CountingDevice {
        fn cycle(&self) -> u64 {
            self.cycle
        }

        fn run_until(&mut self, target: u64) -> u64 {
            while self.cycle < target {
                self.cycle += self.step;
            }
            self.cycle
        }

        fn rebase(&mut self, deduction: u64) {
            self.cycle = self.cycle.saturating_sub(deduction);
        }
    }

    #[test]
    fn later_device_catches_up_to_earlier_overshoot() {
        let mut scheduler = Scheduler::new();
        let mut cpu1 = CountingDevice { cycle: 0, step: 7 };
        let mut cpu2 = CountingDevice { cycle: 0, step: 3 };

        let reached = scheduler.run_frame(10, &mut [&mut cpu1, &mut cpu2]);

        // cpu1 overshoots 10 to land on 14; cpu2 must then catch up to (at least) 14, not just 10.
        assert!(cpu1.cycle >= 10);
        assert!(cpu2.cycle >= cpu1.cycle);
        assert_eq!(reached, cpu2.cycle);
    }

    #[test]
    fn crossing_rebase_threshold_subtracts_from_every_device() {
        let mut scheduler = Scheduler::new();
        scheduler.last_sync = REBASE_THRESHOLD - 5;
        let mut cpu1 = CountingDevice { cycle: REBASE_THRESHOLD - 5, step: 1 };

        let reached = scheduler.run_frame(10, &mut [&mut cpu1]);

        assert!(reached < REBASE_THRESHOLD);
        assert!(cpu1.cycle < REBASE_THRESHOLD);
    }
}
