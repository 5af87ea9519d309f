//! Ray-cast range sensors.

use std::f64::consts::{FRAC_PI_2, FRAC_PI_3, FRAC_PI_6, PI};

use crate::car::Car;
use crate::geometry::{Point, Segment};
use crate::track::Track;

/// Maximum distance a sensor can report.
pub const RANGE: f64 = 500.0;

/// Number of sensors on a car; also the controller's input count.
pub const SENSOR_COUNT: usize = 8;

/// Sensor offsets from the heading, in controller input order:
/// left, right, front, back, then the four diagonals.
pub const OFFSETS: [f64; SENSOR_COUNT] = [
    FRAC_PI_2,
    -FRAC_PI_2,
    0.0,
    PI,
    FRAC_PI_6,
    -FRAC_PI_6,
    FRAC_PI_3,
    -FRAC_PI_3,
];

/// A range sensor mounted at the car's center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sensor {
    /// Angle relative to the car's heading.
    pub offset: f64,
}

impl Sensor {
    /// Ray from `origin` in the sensor's direction, [`RANGE`] long.
    #[must_use]
    pub fn ray(&self, origin: Point, heading: f64) -> Segment {
        Segment::new(origin, origin.project(heading + self.offset, RANGE))
    }

    /// Distance to the nearest boundary along the ray, or [`RANGE`].
    #[must_use]
    pub fn measure(&self, origin: Point, heading: f64, track: &Track) -> f64 {
        track
            .nearest_hit(&self.ray(origin, heading))
            .map_or(RANGE, |d| d.min(RANGE))
    }
}

/// The standard eight-sensor array.
#[must_use]
pub fn sensor_array() -> [Sensor; SENSOR_COUNT] {
    OFFSETS.map(|offset| Sensor { offset })
}

/// Measure every sensor from the car's current pose into `readings`.
pub fn read_all(car: &Car, track: &Track, readings: &mut [f64; SENSOR_COUNT]) {
    let origin = car.position();
    let heading = car.heading();
    for (reading, sensor) in readings.iter_mut().zip(sensor_array()) {
        *reading = sensor.measure(origin, heading, track);
    }
}
