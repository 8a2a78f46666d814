//! Performance benchmarks for critical game systems

use rand::rngs::StdRng;
use rand::SeedableRng;
use server::apples::AppleRegistry;
use server::referee::Referee;
use shared::{Direction, Point, Snake, SnakeState, MAX_BODY_POINTS};
use std::time::Instant;

/// A serpentine snake sweeping the arena in `rows` horizontal passes
fn zigzag_snake(rows: usize) -> Snake {
    let step = 38.0 / rows as f32;
    let body = (0..rows)
        .flat_map(|row| {
            let y = 1.0 + row as f32 * step;
            if row % 2 == 0 {
                [Point::new(1.0, y), Point::new(39.0, y)]
            } else {
                [Point::new(39.0, y), Point::new(1.0, y)]
            }
        })
        .collect();

    let mut snake = Snake::new();
    snake
        .apply_state(SnakeState {
            body,
            direction: Direction::Right,
            growth_remaining: 0.0,
        })
        .unwrap();
    snake
}

/// Benchmarks head-against-body collision detection
#[test]
fn benchmark_collision_detection() {
    let target = zigzag_snake(250);
    let mut attacker = Snake::new();
    attacker
        .apply_state(SnakeState {
            body: vec![Point::new(20.0, 35.0), Point::new(20.0, 30.0)],
            direction: Direction::Up,
            growth_remaining: 0.0,
        })
        .unwrap();

    let iterations = 2_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = attacker.collide_player(&target);
    }

    let duration = start.elapsed();
    println!(
        "Collision detection: {} iterations against {} points in {:?} ({:.2} μs/iter)",
        iterations,
        target.body.len(),
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks self-collision on a long body
#[test]
fn benchmark_self_collision() {
    let snake = zigzag_snake(MAX_BODY_POINTS / 2);

    let iterations = 1_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let _ = snake.collide_itself();
    }

    let duration = start.elapsed();
    println!(
        "Self collision: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 3000);
}

/// Benchmarks the simulator with a turn every few frames
#[test]
fn benchmark_snake_simulation() {
    let mut snake = Snake::new();
    let turns = [Direction::Left, Direction::Up, Direction::Right, Direction::Up];
    let dt = 1.0 / 60.0;

    let iterations = 100_000;
    let start = Instant::now();

    for frame in 0..iterations {
        if frame % 12 == 0 {
            snake.set_direction(turns[(frame / 12) % turns.len()]);
        }
        snake.update(dt);
        if frame % 600 == 0 {
            snake.grow();
        }
        if snake.collide_edges() {
            snake.respawn();
        }
    }

    let duration = start.elapsed();
    println!(
        "Snake simulation: {} frames in {:?} ({:.2} ns/frame)",
        iterations,
        duration,
        duration.as_nanos() as f64 / iterations as f64
    );

    // Should complete in under 1 second
    assert!(duration.as_millis() < 1000);
}

/// Benchmarks network packet serialization performance
#[test]
fn benchmark_packet_serialization() {
    use bincode::{deserialize, serialize};
    use shared::Packet;

    let packet = Packet::SnakeUpdate {
        nickname: "viper".to_string(),
        state: zigzag_snake(100).state(),
    };

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "Packet serialization: {} round trips in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    assert!(duration.as_millis() < 5000);
}

/// Benchmarks full referee evaluation with a crowded arena
#[test]
fn benchmark_referee_reports() {
    let mut referee = Referee::new(32);
    let mut apples = AppleRegistry::with_rng(5, StdRng::seed_from_u64(11));

    let ids: Vec<u32> = (0..16)
        .map(|i| {
            let addr = format!("127.0.0.1:{}", 10_000 + i).parse().unwrap();
            let (id, _) = referee
                .join(addr, &format!("snake{}", i), &apples)
                .unwrap();
            id
        })
        .collect();

    // Each snake owns a column so nobody collides
    let states: Vec<SnakeState> = ids
        .iter()
        .enumerate()
        .map(|(i, _)| {
            let x = 2.0 + i as f32 * 2.0;
            SnakeState {
                body: vec![Point::new(x, 30.0), Point::new(x, 20.0)],
                direction: Direction::Up,
                growth_remaining: 0.0,
            }
        })
        .collect();

    let rounds = 1_000u32;
    let start = Instant::now();

    for round in 1..=rounds {
        for (id, state) in ids.iter().zip(&states) {
            let _ = referee.handle_state_report(*id, round, state.clone(), &mut apples);
        }
    }

    let duration = start.elapsed();
    println!(
        "Referee: {} reports in {:?} ({:.2} μs/report)",
        rounds as usize * ids.len(),
        duration,
        duration.as_micros() as f64 / (rounds as f64 * ids.len() as f64)
    );

    assert!(duration.as_millis() < 5000);
}
