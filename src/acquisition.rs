//! The soft-real-time acquisition loop.
//!
//! One iteration reads a scan, detects touches, applies every queued
//! configuration command and publishes a new [`Snapshot`](crate::snapshot::Snapshot):
//!
//! ```text
//! Idle -> Reading -> Detecting -> Dispatching -> Publishing -> Idle
//! ```
//!
//! Commands are drained before publishing, so a configuration change is in
//! effect by the time the next published cycle is observed.
//!
//! Iterations are driven by a [`Scheduler`]. [`ThreadScheduler`] sleeps a
//! fixed interval between them; [`ManualScheduler`] runs a fixed number back
//! to back, which is what tests use.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, info, trace, trace_span, warn};

use crate::centroid::CentroidDetector;
use crate::channel::ConfigReceiver;
use crate::dispatch::{DispatchStats, Dispatcher};
use crate::sensor::{Sensor, SensorBus};
use crate::snapshot::SnapshotPublisher;
use crate::touch::TouchSet;

/// Shared stop signal, observed between iterations.
#[derive(Clone, Debug, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn request_stop(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_stop_requested(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Where an [`AcquisitionTask`] is within its iteration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Reading,
    Detecting,
    Dispatching,
    Publishing,
}

/// Something run once per scheduler tick.
pub trait PeriodicTask {
    fn step(&mut self);
}

/// Decides when a [`PeriodicTask`] runs.
pub trait Scheduler {
    /// Run `task` until `stop` is raised or the scheduler is done.
    fn run(&mut self, task: &mut dyn PeriodicTask, stop: &StopFlag);
}

/// Runs a task forever, sleeping `interval` between iterations.
#[derive(Clone, Copy, Debug)]
pub struct ThreadScheduler {
    interval: Duration,
}

impl ThreadScheduler {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }
}

impl Scheduler for ThreadScheduler {
    fn run(&mut self, task: &mut dyn PeriodicTask, stop: &StopFlag) {
        while !stop.is_stop_requested() {
            task.step();
            thread::sleep(self.interval);
        }
    }
}

/// Runs a task a fixed number of times without sleeping.
#[derive(Clone, Copy, Debug)]
pub struct ManualScheduler {
    iterations: usize,
}

impl ManualScheduler {
    pub fn new(iterations: usize) -> Self {
        Self { iterations }
    }
}

impl Scheduler for ManualScheduler {
    fn run(&mut self, task: &mut dyn PeriodicTask, stop: &StopFlag) {
        for _ in 0..self.iterations {
            if stop.is_stop_requested() {
                break;
            }
            task.step();
        }
    }
}

pub struct AcquisitionTask<B: SensorBus> {
    sensor: Sensor<B>,
    detector: CentroidDetector,
    commands: ConfigReceiver,
    dispatcher: Dispatcher,
    publisher: SnapshotPublisher,
    phase: Phase,
    cycle: u64,
    read_failures: u64,
}

impl<B: SensorBus> AcquisitionTask<B> {
    pub fn new(
        sensor: Sensor<B>,
        detector: CentroidDetector,
        commands: ConfigReceiver,
        publisher: SnapshotPublisher,
    ) -> Self {
        Self {
            sensor,
            detector,
            commands,
            dispatcher: Dispatcher::new(),
            publisher,
            phase: Phase::Idle,
            cycle: 0,
            read_failures: 0,
        }
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Cycles published so far
    #[inline]
    pub fn cycle(&self) -> u64 {
        self.cycle
    }

    #[inline]
    pub fn read_failures(&self) -> u64 {
        self.read_failures
    }

    pub fn dispatch_stats(&self) -> DispatchStats {
        self.dispatcher.stats()
    }

    pub fn sensor(&self) -> &Sensor<B> {
        &self.sensor
    }

    /// Touches from the latest iteration
    pub fn touches(&self) -> &TouchSet {
        self.detector.touches()
    }

    fn enter(&mut self, phase: Phase) {
        trace!(from = ?self.phase, to = ?phase, "phase");
        self.phase = phase;
    }

    /// Run one full iteration.
    pub fn step(&mut self) {
        let span = trace_span!("acquisition", cycle = self.cycle + 1);
        let _enter = span.enter();

        self.enter(Phase::Reading);
        if let Err(err) = self.sensor.read() {
            self.read_failures += 1;
            warn!(%err, failures = self.read_failures, "sensor read failed, reusing previous scan");
        }

        self.enter(Phase::Detecting);
        self.detector.process(self.sensor.taxels());

        self.enter(Phase::Dispatching);
        for cmd in self.commands.drain() {
            self.dispatcher.apply(cmd, &mut self.sensor);
        }

        self.enter(Phase::Publishing);
        self.cycle += 1;
        let touches = self.detector.touches();
        debug!(cycle = self.cycle, active = touches.len(), "publishing");
        self.publisher.publish_scan(self.cycle, self.sensor.taxels(), touches);

        self.enter(Phase::Idle);
    }

    /// Run the task on its own thread until `stop` is raised. The task is
    /// handed back when the thread is joined.
    pub fn spawn(self, interval: Duration, stop: StopFlag) -> std::io::Result<JoinHandle<Self>> {
        thread::Builder::new()
            .name("acquisition".into())
            .spawn(move || {
                let mut task = self;
                info!(?interval, "acquisition started");
                ThreadScheduler::new(interval).run(&mut task, &stop);
                info!(cycles = task.cycle, read_failures = task.read_failures, "acquisition stopped");
                task
            })
    }
}

impl<B: SensorBus> PeriodicTask for AcquisitionTask<B> {
    fn step(&mut self) {
        AcquisitionTask::step(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::centroid::DetectorSetup;
    use crate::channel::{config_channel, ConfigSender};
    use crate::command::Command;
    use crate::sensor::{Finger, Mode, SimulatedBus};
    use crate::snapshot::{shared_state, SnapshotReader};

    struct Counter(usize);

    impl PeriodicTask for Counter {
        fn step(&mut self) {
            self.0 += 1;
        }
    }

    fn task(bus: SimulatedBus) -> (AcquisitionTask<SimulatedBus>, ConfigSender, SnapshotReader) {
        let sensor = Sensor::setup(bus, Mode::Differential).unwrap();
        let detector = CentroidDetector::new(DetectorSetup::new(28, 4, 3200.0).with_wrap_around(5));
        let (tx, rx) = config_channel(16);
        let (publisher, reader) = shared_state(28, 4);
        (AcquisitionTask::new(sensor, detector, rx, publisher), tx, reader)
    }

    #[test]
    fn manual_scheduler_runs_exact_iterations() {
        let mut counter = Counter(0);
        ManualScheduler::new(7).run(&mut counter, &StopFlag::new());
        assert_eq!(counter.0, 7);
    }

    #[test]
    fn raised_stop_flag_prevents_iterations() {
        let stop = StopFlag::new();
        stop.request_stop();
        let mut counter = Counter(0);
        ManualScheduler::new(7).run(&mut counter, &stop);
        ThreadScheduler::new(Duration::from_millis(1)).run(&mut counter, &stop);
        assert_eq!(counter.0, 0);
    }

    #[test]
    fn step_publishes_a_snapshot_and_returns_to_idle() {
        let (mut task, _tx, mut reader) = task(SimulatedBus::ring(28).with_finger(Finger::new(12.0, 0.6, 0.8)));
        task.step();

        assert_eq!(task.phase(), Phase::Idle);
        let snapshot = reader.latest();
        assert_eq!(snapshot.cycle, 1);
        assert_eq!(snapshot.touches.len(), 1);
        assert!((snapshot.touches.get(0).unwrap().location - 12.0).abs() < 0.01);
        assert_eq!(snapshot.taxels, task.sensor().taxels());
    }

    #[test]
    fn failed_read_reuses_previous_scan() {
        let bus = SimulatedBus::ring(28).with_finger(Finger::new(6.0, 0.6, 0.8)).fail_read(1);
        let (mut task, _tx, mut reader) = task(bus);

        task.step();
        let first = reader.latest().clone();
        task.step();
        let second = reader.latest().clone();

        assert_eq!(task.read_failures(), 1);
        assert_eq!(second.cycle, 2);
        assert_eq!(second.taxels, first.taxels);
        assert_eq!(second.touches, first.touches);
    }

    #[test]
    fn queued_commands_are_applied_in_order_within_one_step() {
        let (mut task, mut tx, _reader) = task(SimulatedBus::ring(28));
        tx.write_non_realtime(Command::prescaler(3.0)).unwrap();
        tx.write_non_realtime(Command::prescaler(6.0)).unwrap();
        tx.write_non_realtime(Command::mode(1.0)).unwrap();

        task.step();

        assert_eq!(task.sensor().config().prescaler, 6);
        assert_eq!(task.sensor().config().mode, Mode::Raw);
        assert_eq!(task.dispatch_stats().applied, 3);
    }

    #[test]
    fn spawned_task_stops_promptly() {
        let (task, _tx, _reader) = task(SimulatedBus::ring(28));
        let stop = StopFlag::new();
        let handle = task.spawn(Duration::from_millis(2), stop.clone()).unwrap();
        thread::sleep(Duration::from_millis(20));
        stop.request_stop();
        let task = handle.join().unwrap();
        assert!(task.cycle() > 0);
    }
}
