//! Evolve a controller on a ring track and replay the champion.
//!
//! The track is two concentric 24-sided polygons; the car starts in the lane
//! between them heading along it.
//!
//! Run with: `cargo run --release --example drive`

use std::f64::consts::{FRAC_PI_2, TAU};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use neat_drive::{
    CarControlEvaluator, CarView, NeatConfig, Point, Population, Segment, Sequences, Simulation,
    SimulationConfig, Track, TruncationSelection,
};

const SIDES: usize = 24;
const INNER: f64 = 250.0;
const OUTER: f64 = 400.0;

fn ring(radius: f64) -> impl Iterator<Item = Segment> {
    let corner = move |i: usize| Point::new(0.0, 0.0).project(TAU * i as f64 / SIDES as f64, radius);
    (0..SIDES).map(move |i| Segment::new(corner(i), corner(i + 1)))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "neat_drive=info".into()),
        )
        .init();

    let track: Arc<Track> = Arc::new(ring(INNER).chain(ring(OUTER)).collect());
    let config = SimulationConfig {
        tick_interval_ms: 1,
        controller_interval_ms: 1,
        max_ticks: 2000,
        objective_distance: 1500.0,
        start_x: (INNER + OUTER) / 2.0,
        start_y: 0.0,
        start_heading: FRAC_PI_2,
        ..Default::default()
    };

    let sequences = Arc::new(Sequences::new());
    let mut population = Population::initial(30, NeatConfig::default(), sequences, 7);
    let evaluator = CarControlEvaluator::new(Arc::clone(&track), config.clone());
    let policy = TruncationSelection { harshness: 0.6 };

    let Some(champion) = population.run(&evaluator, &policy, 0.01, 15)? else {
        anyhow::bail!("empty population");
    };
    println!(
        "Best fitness {:.6} after {} generations",
        champion.fitness,
        population.generation()
    );

    // Replay at real-time speed, printing every 50th frame.
    let frames = AtomicU64::new(0);
    let replay = SimulationConfig {
        tick_interval_ms: 10,
        controller_interval_ms: 10,
        ..config
    };
    let result = Simulation::new(track, replay)
        .with_render(move |view: &CarView| {
            if frames.fetch_add(1, Ordering::Relaxed) % 50 == 0 {
                println!(
                    "({:7.1}, {:7.1}) heading {:5.2} speed {:4.2}",
                    view.position.x, view.position.y, view.heading, view.speed
                );
            }
        })
        .run(&champion.genome)?;

    println!(
        "Replay: {:?} after {} ticks, completion {:.3}",
        result.termination, result.operations, result.completion
    );
    Ok(())
}
