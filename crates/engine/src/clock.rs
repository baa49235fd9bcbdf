use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::time::TimePosition;

/// Fixed-cadence sampler that drives
/// [`LoopController::sample_tick`](crate::LoopController::sample_tick).
pub trait ClockSource {
    fn start(&mut self, interval: TimePosition);

    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// Clock driven by hand, for deterministic hosts and tests.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ManualClock {
    interval: Option<TimePosition>,
    starts: usize,
    stops: usize,
}

impl ManualClock {
    pub fn interval(&self) -> Option<TimePosition> {
        self.interval
    }

    pub fn starts(&self) -> usize {
        self.starts
    }

    pub fn stops(&self) -> usize {
        self.stops
    }
}

impl ClockSource for ManualClock {
    fn start(&mut self, interval: TimePosition) {
        self.interval = Some(interval);
        self.starts += 1;
    }

    fn stop(&mut self) {
        if self.interval.take().is_some() {
            self.stops += 1;
        }
    }

    fn is_running(&self) -> bool {
        self.interval.is_some()
    }
}

/// One tick emitted by [`IntervalClock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTick {
    pub seq: u64,
}

/// Background-thread ticker sending [`ClockTick`]s over a channel.
///
/// The owner thread receives the ticks and calls `sample_tick` itself, so
/// controller state never leaves that thread.
#[derive(Debug)]
pub struct IntervalClock {
    ticks: mpsc::Sender<ClockTick>,
    running: Option<Arc<AtomicBool>>,
}

impl IntervalClock {
    /// Creates a stopped clock and the receiver its ticks arrive on.
    pub fn channel() -> (Self, mpsc::Receiver<ClockTick>) {
        let (ticks, receiver) = mpsc::channel();
        (
            Self {
                ticks,
                running: None,
            },
            receiver,
        )
    }
}

impl ClockSource for IntervalClock {
    fn start(&mut self, interval: TimePosition) {
        self.stop();

        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);
        let ticks = self.ticks.clone();
        let period = Duration::from_micros(interval.ticks().max(1).unsigned_abs());
        debug!(interval_tl = interval.ticks(), "interval clock started");

        thread::spawn(move || {
            let mut seq = 0_u64;
            loop {
                thread::sleep(period);
                if !flag.load(Ordering::Acquire) {
                    return;
                }
                seq += 1;
                if ticks.send(ClockTick { seq }).is_err() {
                    return;
                }
            }
        });
        self.running = Some(running);
    }

    fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            running.store(false, Ordering::Release);
            debug!("interval clock stopped");
        }
    }

    fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for IntervalClock {
    fn drop(&mut self) {
        self.stop();
    }
}
