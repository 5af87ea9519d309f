//! Threaded driving simulation.
//!
//! One run uses two or three scoped threads over a shared [`Car`]:
//!
//! - **clock**: sleeps one tick interval, waits out any pause, advances physics,
//!   checks for a crash, completion or the tick budget
//! - **controller**: samples the sensors, runs the genome, writes the actuator flags
//! - **render** (optional): hands a [`CarView`] to a [`RenderHook`]
//!
//! Every task polls the shared stop flag once per iteration and blocks on the
//! [`PauseGate`] between iterations. When any task exits, normally or by
//! panicking, it raises the stop flag so the others follow. [`Simulation::run`]
//! joins all of them before returning and reports the first failure.

use std::any::Any;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ScopedJoinHandle};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::car::{Car, CarView, Controls};
use crate::error::SimulationError;
use crate::evaluator::FeedForward;
use crate::genome::Genome;
use crate::geometry::Point;
use crate::sensor::{self, SENSOR_COUNT};
use crate::track::Track;

/// Output slots a controller genome must have.
pub const CONTROL_COUNT: usize = 5;

/// Timing, objective and start pose of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Milliseconds between physics ticks. Values below 1 are treated as 1.
    pub tick_interval_ms: u64,
    /// Milliseconds between controller updates, at least 1.
    pub controller_interval_ms: u64,
    /// Milliseconds between render callbacks, at least 1.
    pub render_interval_ms: u64,
    /// Tick budget; 0 means unlimited.
    pub max_ticks: u64,
    /// Distance along the heading that counts as full completion.
    pub objective_distance: f64,
    /// Start position, x.
    pub start_x: f64,
    /// Start position, y.
    pub start_y: f64,
    /// Start heading in radians.
    pub start_heading: f64,
    /// Factor applied to sensor distances before they reach the controller.
    pub sensor_scale: f64,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            controller_interval_ms: 10,
            render_interval_ms: 16,
            max_ticks: 3000,
            objective_distance: 1000.0,
            start_x: 400.0,
            start_y: -300.0,
            start_heading: 0.0,
            sensor_scale: 1.0 / sensor::RANGE,
        }
    }
}

impl SimulationConfig {
    /// Start position.
    #[must_use]
    pub fn start(&self) -> Point {
        Point::new(self.start_x, self.start_y)
    }

    // Every task blocks between iterations, so none can monopolize a core.
    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms.max(1))
    }

    fn controller_interval(&self) -> Duration {
        Duration::from_millis(self.controller_interval_ms.max(1))
    }

    fn render_interval(&self) -> Duration {
        Duration::from_millis(self.render_interval_ms.max(1))
    }
}

/// Why a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Termination {
    /// The car's footprint touched a boundary.
    Crashed,
    /// Completion reached 1.
    Completed,
    /// The tick budget ran out.
    TickBudget,
    /// Stopped from outside, or after another task failed.
    Stopped,
}

/// Outcome of one run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    /// Fraction of the objective distance covered, in [0, 1].
    pub completion: f64,
    /// Ticks elapsed.
    pub operations: u64,
    /// Why the run ended.
    pub termination: Termination,
}

/// Read-only observer of a running simulation.
pub trait RenderHook: Send + Sync {
    /// Called on the render task once per render interval.
    fn render(&self, view: &CarView);
}

impl<F> RenderHook for F
where
    F: Fn(&CarView) + Send + Sync,
{
    fn render(&self, view: &CarView) {
        self(view);
    }
}

/// Cooperative pause with stop-aware blocking.
///
/// Waiters block on a condition variable; [`resume`](Self::resume) and
/// [`interrupt`](Self::interrupt) wake all of them.
#[derive(Debug, Default)]
pub struct PauseGate {
    paused: Mutex<bool>,
    wake: Condvar,
}

impl PauseGate {
    /// Create an open gate.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // The guarded bool is always valid, so a poisoned lock is still usable.
    fn state(&self) -> MutexGuard<'_, bool> {
        self.paused.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Close the gate.
    pub fn pause(&self) {
        *self.state() = true;
    }

    /// Open the gate and release every waiter.
    pub fn resume(&self) {
        *self.state() = false;
        self.wake.notify_all();
    }

    /// Whether the gate is closed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        *self.state()
    }

    /// Wake every waiter so it can observe a stop flag set just before.
    pub fn interrupt(&self) {
        let _state = self.state();
        self.wake.notify_all();
    }

    /// Sleep for `duration`, returning early if `stop` is raised.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Interrupted`] if `stop` is set when the sleep ends.
    pub fn sleep(&self, duration: Duration, stop: &AtomicBool) -> Result<(), SimulationError> {
        let state = self.state();
        let _ = self
            .wake
            .wait_timeout_while(state, duration, |_| !stop.load(Ordering::SeqCst))
            .unwrap_or_else(PoisonError::into_inner);
        interrupted(stop)
    }

    /// Block while the gate is closed.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Interrupted`] if `stop` is set.
    pub fn wait(&self, stop: &AtomicBool) -> Result<(), SimulationError> {
        let state = self.state();
        let _state = self
            .wake
            .wait_while(state, |paused| *paused && !stop.load(Ordering::SeqCst))
            .unwrap_or_else(PoisonError::into_inner);
        interrupted(stop)
    }

    /// [`sleep`](Self::sleep) then [`wait`](Self::wait): one task iteration's pause point.
    ///
    /// # Errors
    ///
    /// [`SimulationError::Interrupted`] if `stop` is set.
    pub fn pace(&self, duration: Duration, stop: &AtomicBool) -> Result<(), SimulationError> {
        self.sleep(duration, stop)?;
        self.wait(stop)
    }
}

fn interrupted(stop: &AtomicBool) -> Result<(), SimulationError> {
    if stop.load(Ordering::SeqCst) {
        Err(SimulationError::Interrupted)
    } else {
        Ok(())
    }
}

/// State shared by the tasks of one run and its handles.
#[derive(Debug)]
struct Shared {
    car: Car,
    stop: AtomicBool,
    ticks: AtomicU64,
    gate: PauseGate,
}

impl Shared {
    fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
        self.gate.interrupt();
    }
}

/// Raises the stop flag when a task exits, including by panic.
struct StopOnExit<'a>(&'a Shared);

impl Drop for StopOnExit<'_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

/// Cloneable control handle for a running simulation.
#[derive(Debug, Clone)]
pub struct SimulationHandle {
    shared: Arc<Shared>,
}

impl SimulationHandle {
    /// Ask every task to exit. Also releases paused tasks.
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Whether a stop has been requested or the run has ended.
    #[must_use]
    pub fn is_stopped(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Block the clock and controller before their next iteration.
    pub fn pause(&self) {
        self.shared.gate.pause();
    }

    /// Release paused tasks.
    pub fn resume(&self) {
        self.shared.gate.resume();
    }

    /// Whether the run is paused.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.shared.gate.is_paused()
    }

    /// Ticks elapsed so far.
    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.shared.ticks.load(Ordering::SeqCst)
    }

    /// Current car state.
    #[must_use]
    pub fn car(&self) -> CarView {
        self.shared.car.view()
    }
}

/// One evaluation run of a controller genome on a track.
pub struct Simulation {
    track: Arc<Track>,
    config: SimulationConfig,
    shared: Arc<Shared>,
    render: Option<Box<dyn RenderHook>>,
}

impl Simulation {
    /// Prepare a run. The car is placed at the configured start pose.
    #[must_use]
    pub fn new(track: Arc<Track>, config: SimulationConfig) -> Self {
        let car = Car::new(config.start(), config.start_heading);
        Self {
            track,
            config,
            shared: Arc::new(Shared {
                car,
                stop: AtomicBool::new(false),
                ticks: AtomicU64::new(0),
                gate: PauseGate::new(),
            }),
            render: None,
        }
    }

    /// Attach a render hook, run on its own task.
    #[must_use]
    pub fn with_render<H: RenderHook + 'static>(mut self, hook: H) -> Self {
        self.render = Some(Box::new(hook));
        self
    }

    /// Handle for pausing or stopping the run from another thread.
    #[must_use]
    pub fn handle(&self) -> SimulationHandle {
        SimulationHandle {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Run to termination, driving the car with `controller`.
    ///
    /// Blocks until every task has exited.
    ///
    /// # Errors
    ///
    /// - [`SimulationError::InvalidController`] if the genome does not have 8
    ///   inputs and 5 outputs; no task is started
    /// - [`SimulationError::CyclicController`] if its enabled connections
    ///   contain a cycle; no task is started
    /// - [`SimulationError::TaskPanicked`] if any task panicked
    pub fn run(self, controller: &Genome) -> Result<SimulationResult, SimulationError> {
        validate_controller(controller)?;
        let network =
            FeedForward::try_new(controller).map_err(|_| SimulationError::CyclicController)?;

        let Self {
            track,
            config,
            shared,
            render,
        } = self;
        let (shared, track, config) = (&*shared, &*track, &config);
        let render = render.as_deref();

        let (clock, driver, renderer) = thread::scope(|s| {
            let clock = s.spawn(move || clock_task(shared, track, config));
            let driver = s.spawn(move || controller_task(shared, track, config, network));
            let renderer = render.map(|hook| s.spawn(move || render_task(shared, hook, config)));

            (
                join("clock", clock),
                join("controller", driver),
                renderer.map(|handle| join("render", handle)),
            )
        });

        let result = clock?;
        driver?;
        renderer.transpose()?;

        debug!(
            termination = ?result.termination,
            ticks = result.operations,
            completion = result.completion,
            "simulation finished"
        );
        Ok(result)
    }
}

/// Check the 8-input, 5-output controller contract.
///
/// # Errors
///
/// [`SimulationError::InvalidController`] on a mismatch.
pub fn validate_controller(genome: &Genome) -> Result<(), SimulationError> {
    let (inputs, outputs) = (genome.input_ids.len(), genome.output_ids.len());
    if inputs == SENSOR_COUNT && outputs == CONTROL_COUNT {
        Ok(())
    } else {
        Err(SimulationError::InvalidController {
            inputs,
            outputs,
            expected_inputs: SENSOR_COUNT,
            expected_outputs: CONTROL_COUNT,
        })
    }
}

fn clock_task(shared: &Shared, track: &Track, config: &SimulationConfig) -> SimulationResult {
    let _exit = StopOnExit(shared);
    let interval = config.tick_interval();
    let mut progress = 0.0;
    let mut ticks = 0;

    let termination = loop {
        if shared.gate.pace(interval, &shared.stop).is_err() {
            break Termination::Stopped;
        }

        progress += shared.car.step();
        ticks += 1;
        shared.ticks.store(ticks, Ordering::SeqCst);

        if track.collides(&shared.car.footprint()) {
            debug!(ticks, "car crashed");
            break Termination::Crashed;
        }
        if progress >= config.objective_distance {
            break Termination::Completed;
        }
        if config.max_ticks > 0 && ticks >= config.max_ticks {
            break Termination::TickBudget;
        }
    };

    SimulationResult {
        completion: (progress / config.objective_distance).clamp(0.0, 1.0),
        operations: ticks,
        termination,
    }
}

fn controller_task(
    shared: &Shared,
    track: &Track,
    config: &SimulationConfig,
    mut network: FeedForward,
) {
    let _exit = StopOnExit(shared);
    let interval = config.controller_interval();
    let mut readings = [0.0; SENSOR_COUNT];
    let mut outputs = [0.0; CONTROL_COUNT];

    while !shared.stop.load(Ordering::SeqCst) {
        sensor::read_all(&shared.car, track, &mut readings);
        for reading in &mut readings {
            *reading *= config.sensor_scale;
        }
        network.compute_into(&readings, &mut outputs);
        shared.car.set_controls(Controls::from_outputs(&outputs));

        if shared.gate.pace(interval, &shared.stop).is_err() {
            break;
        }
    }
}

fn render_task(shared: &Shared, hook: &dyn RenderHook, config: &SimulationConfig) {
    let _exit = StopOnExit(shared);
    let interval = config.render_interval();

    while !shared.stop.load(Ordering::SeqCst) {
        hook.render(&shared.car.view());
        // Keeps drawing while paused.
        if shared.gate.sleep(interval, &shared.stop).is_err() {
            break;
        }
    }
}

fn join<T>(task: &'static str, handle: ScopedJoinHandle<'_, T>) -> Result<T, SimulationError> {
    handle.join().map_err(|payload| SimulationError::TaskPanicked {
        task,
        message: panic_message(payload.as_ref()),
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}
