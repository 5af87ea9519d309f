//! Benchmarks for neat-drive.

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};
use neat_drive::{
    codec, sensor, Car, FeedForward, Genome, NeatConfig, Point, Segment, Sequences, Track,
};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn grown_genome(seq: &Sequences, rng: &mut ChaCha8Rng, mutations: usize) -> Genome {
    let config = NeatConfig {
        add_connection_prob: 0.5,
        add_node_prob: 0.2,
        ..NeatConfig::default()
    };
    let mut genome = Genome::fully_connected(config, seq, rng);
    for _ in 0..mutations {
        genome.mutate(rng, seq);
    }
    genome
}

fn bench_genome_creation(c: &mut Criterion) {
    let seq = Sequences::new();

    c.bench_function("genome_fully_connected", |b| {
        let mut rng = ChaCha8Rng::seed_from_u64(42);
        b.iter(|| {
            black_box(Genome::fully_connected(NeatConfig::default(), &seq, &mut rng));
        });
    });
}

fn bench_mutation(c: &mut Criterion) {
    let seq = Sequences::new();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&seq, &mut rng, 0);

    c.bench_function("genome_mutation", |b| {
        let mut g = genome.clone();
        b.iter(|| {
            g.mutate(&mut rng, &seq);
            black_box(&g);
        });
    });
}

fn bench_crossover(c: &mut Criterion) {
    let seq = Sequences::new();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let ancestor = grown_genome(&seq, &mut rng, 5);

    let mut parent1 = ancestor.clone();
    let mut parent2 = ancestor;
    for _ in 0..10 {
        parent1.mutate(&mut rng, &seq);
        parent2.mutate(&mut rng, &seq);
    }

    c.bench_function("genome_crossover", |b| {
        b.iter(|| {
            black_box(parent1.reproduce_with(&parent2, &mut rng));
        });
    });
}

fn bench_forward_pass(c: &mut Criterion) {
    let seq = Sequences::new();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&seq, &mut rng, 20);
    let mut net = FeedForward::new(&genome);
    let inputs = [0.2, 0.4, 0.9, 1.0, 0.3, 0.3, 0.6, 0.6];
    let mut outputs = [0.0; 5];

    c.bench_function("forward_pass", |b| {
        b.iter(|| {
            net.compute_into(black_box(&inputs), &mut outputs);
            black_box(&outputs);
        });
    });

    c.bench_function("forward_compile", |b| {
        b.iter(|| black_box(FeedForward::new(&genome)));
    });
}

fn bench_sensor_sweep(c: &mut Criterion) {
    // A 32-sided ring of boundaries around the car.
    let sides = 32;
    let corner = |i: usize| {
        let angle = std::f64::consts::TAU * i as f64 / sides as f64;
        Point::new(0.0, 0.0).project(angle, 400.0)
    };
    let track: Track = (0..sides)
        .map(|i| Segment::new(corner(i), corner(i + 1)))
        .collect();
    let car = Car::new(Point::new(10.0, -20.0), 0.3);
    let mut readings = [0.0; sensor::SENSOR_COUNT];

    c.bench_function("sensor_sweep", |b| {
        b.iter(|| {
            sensor::read_all(&car, &track, &mut readings);
            black_box(&readings);
        });
    });

    c.bench_function("collision_check", |b| {
        b.iter(|| black_box(track.collides(&car.footprint())));
    });
}

fn bench_codec(c: &mut Criterion) {
    let seq = Sequences::new();
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let genome = grown_genome(&seq, &mut rng, 20);
    let text = codec::encode_genome(&genome);

    c.bench_function("genome_encode", |b| {
        b.iter(|| black_box(codec::encode_genome(&genome)));
    });

    c.bench_function("genome_decode", |b| {
        b.iter(|| black_box(codec::decode_genome(&text, &Sequences::new())));
    });
}

criterion_group!(
    benches,
    bench_genome_creation,
    bench_mutation,
    bench_crossover,
    bench_forward_pass,
    bench_sensor_sweep,
    bench_codec,
);
criterion_main!(benches);
