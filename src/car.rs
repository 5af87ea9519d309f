//! Car state and physics.
//!
//! Every field is its own atomic. The clock task is the only writer of position,
//! heading and speed; the controller task is the only writer of the actuator
//! flags. Readers never need a consistent multi-field snapshot, so there is no
//! aggregate lock.

use std::f64::consts::{PI, TAU};
use std::sync::atomic::{AtomicBool, Ordering};

use atomic_float::AtomicF64;

use crate::geometry::{OrientedRect, Point};

/// Speed change per tick while accelerating or decelerating.
pub const ACCELERATION: f64 = 0.05;
/// Speed change per tick toward zero while braking.
pub const BRAKE_STEP: f64 = 0.1;
/// Heading change per tick while turning.
pub const TURN_STEP: f64 = PI / 180.0;
/// Footprint extent along the heading.
pub const LENGTH: f64 = 70.0;
/// Footprint extent across the heading.
pub const WIDTH: f64 = 40.0;

/// The five actuator flags, in controller output order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controls {
    /// Rotate counter-clockwise (clockwise while reversing).
    pub turn_left: bool,
    /// Rotate clockwise (counter-clockwise while reversing).
    pub turn_right: bool,
    /// Add [`ACCELERATION`] to the speed.
    pub accelerate: bool,
    /// Subtract [`ACCELERATION`] from the speed.
    pub decelerate: bool,
    /// Move the speed toward zero by [`BRAKE_STEP`].
    pub brake: bool,
}

impl Controls {
    /// Output value above which a flag is active.
    pub const THRESHOLD: f64 = 0.5;

    /// Read flags from a controller output vector; missing slots are inactive.
    #[must_use]
    pub fn from_outputs(outputs: &[f64]) -> Self {
        let on = |slot: usize| outputs.get(slot).is_some_and(|&v| v > Self::THRESHOLD);
        Self {
            turn_left: on(0),
            turn_right: on(1),
            accelerate: on(2),
            decelerate: on(3),
            brake: on(4),
        }
    }
}

/// Read-only snapshot handed to render hooks. Fields may come from different ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CarView {
    /// Center position.
    pub position: Point,
    /// Heading in radians.
    pub heading: f64,
    /// Signed speed in units per tick.
    pub speed: f64,
    /// Actuator flags.
    pub controls: Controls,
}

/// A car driven by five boolean actuators.
#[derive(Debug)]
pub struct Car {
    x: AtomicF64,
    y: AtomicF64,
    heading: AtomicF64,
    speed: AtomicF64,
    turn_left: AtomicBool,
    turn_right: AtomicBool,
    accelerate: AtomicBool,
    decelerate: AtomicBool,
    brake: AtomicBool,
}

impl Car {
    /// Create a stationary car at `position` facing `heading`.
    #[must_use]
    pub fn new(position: Point, heading: f64) -> Self {
        Self {
            x: AtomicF64::new(position.x),
            y: AtomicF64::new(position.y),
            heading: AtomicF64::new(heading),
            speed: AtomicF64::new(0.0),
            turn_left: AtomicBool::new(false),
            turn_right: AtomicBool::new(false),
            accelerate: AtomicBool::new(false),
            decelerate: AtomicBool::new(false),
            brake: AtomicBool::new(false),
        }
    }

    /// Center position.
    #[must_use]
    pub fn position(&self) -> Point {
        Point::new(self.x.load(Ordering::Relaxed), self.y.load(Ordering::Relaxed))
    }

    /// Heading in radians, 0 along +x.
    #[must_use]
    pub fn heading(&self) -> f64 {
        self.heading.load(Ordering::Relaxed)
    }

    /// Signed speed; negative while reversing.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.speed.load(Ordering::Relaxed)
    }

    /// Override the speed.
    pub fn set_speed(&self, speed: f64) {
        self.speed.store(speed, Ordering::Relaxed);
    }

    /// Current actuator flags.
    #[must_use]
    pub fn controls(&self) -> Controls {
        Controls {
            turn_left: self.turn_left.load(Ordering::Relaxed),
            turn_right: self.turn_right.load(Ordering::Relaxed),
            accelerate: self.accelerate.load(Ordering::Relaxed),
            decelerate: self.decelerate.load(Ordering::Relaxed),
            brake: self.brake.load(Ordering::Relaxed),
        }
    }

    /// Write all five actuator flags.
    pub fn set_controls(&self, controls: Controls) {
        self.turn_left.store(controls.turn_left, Ordering::Relaxed);
        self.turn_right.store(controls.turn_right, Ordering::Relaxed);
        self.accelerate.store(controls.accelerate, Ordering::Relaxed);
        self.decelerate.store(controls.decelerate, Ordering::Relaxed);
        self.brake.store(controls.brake, Ordering::Relaxed);
    }

    /// Snapshot for rendering.
    #[must_use]
    pub fn view(&self) -> CarView {
        CarView {
            position: self.position(),
            heading: self.heading(),
            speed: self.speed(),
            controls: self.controls(),
        }
    }

    /// Footprint rectangle at the current pose.
    #[must_use]
    pub fn footprint(&self) -> OrientedRect {
        OrientedRect {
            center: self.position(),
            heading: self.heading(),
            length: LENGTH,
            width: WIDTH,
        }
    }

    /// Advance one tick. Returns the signed distance travelled along the heading.
    ///
    /// Position moves first at the current speed. Then at most one speed change
    /// applies: brake wins, and accelerate with decelerate cancel. Then at most
    /// one turn applies (left with right cancel), none at zero speed, and with
    /// the turning sense inverted while reversing.
    pub fn step(&self) -> f64 {
        let speed = self.speed();
        let heading = self.heading();
        let (sin, cos) = heading.sin_cos();
        self.x.fetch_add(speed * cos, Ordering::Relaxed);
        self.y.fetch_add(speed * sin, Ordering::Relaxed);

        let controls = self.controls();
        let new_speed = if controls.brake {
            brake(speed)
        } else {
            match (controls.accelerate, controls.decelerate) {
                (true, false) => speed + ACCELERATION,
                (false, true) => speed - ACCELERATION,
                _ => speed,
            }
        };
        self.speed.store(new_speed, Ordering::Relaxed);

        let turn = match (controls.turn_left, controls.turn_right) {
            (true, false) => TURN_STEP,
            (false, true) => -TURN_STEP,
            _ => 0.0,
        };
        if turn != 0.0 && new_speed != 0.0 {
            let turn = if new_speed < 0.0 { -turn } else { turn };
            self.heading.store((heading + turn) % TAU, Ordering::Relaxed);
        }

        speed
    }
}

/// Move `speed` toward zero by [`BRAKE_STEP`], stopping at zero.
fn brake(speed: f64) -> f64 {
    if speed > BRAKE_STEP {
        speed - BRAKE_STEP
    } else if speed < -BRAKE_STEP {
        speed + BRAKE_STEP
    } else {
        0.0
    }
}
