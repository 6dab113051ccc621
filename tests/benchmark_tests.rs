//! Performance benchmarks for the arena hot paths

use server::config::ArenaConfig;
use server::registry::RoomRegistry;
use shared::{ActionKind, Direction, Seat, StatsRequest};
use std::time::{Duration, Instant};

fn room_code(i: usize) -> String {
    format!("R{:03}", i)
}

/// Registry with `rooms` running matches, seat A parked next to seat B.
fn busy_registry(rooms: usize, now: Instant) -> RoomRegistry {
    let config = ArenaConfig {
        hp_max: server::config::StatRange::new(50, 100_000),
        ..ArenaConfig::default()
    };
    let tank = StatsRequest {
        hp_max: 100_000,
        ..StatsRequest::default()
    };

    let mut registry = RoomRegistry::with_seed(config, 99);
    for i in 0..rooms {
        let code = room_code(i);
        let (a, b) = (2 * i as u32 + 1, 2 * i as u32 + 2);
        registry.create_room(&code);
        registry.join_seat(&code, a, Seat::A, "A", &tank, now).unwrap();
        registry.join_seat(&code, b, Seat::B, "B", &tank, now).unwrap();
        registry.start_match(&code, a, now).unwrap();
        for _ in 0..6 {
            registry.move_player(&code, a, Direction::Right, now).unwrap();
        }
        for _ in 0..5 {
            registry.move_player(&code, a, Direction::Down, now).unwrap();
        }
    }
    registry
}

/// Benchmarks attack resolution across many rooms
#[test]
fn benchmark_attack_resolution() {
    let start_at = Instant::now();
    let rooms = 50;
    let rounds = 100;
    let mut registry = busy_registry(rooms, start_at);

    let start = Instant::now();
    let mut at = start_at;
    for _ in 0..rounds {
        at += Duration::from_millis(700);
        for i in 0..rooms {
            let attacker = 2 * i as u32 + 1;
            registry
                .act(&room_code(i), attacker, ActionKind::Attack, at)
                .unwrap();
        }
    }

    let duration = start.elapsed();
    let iterations = rooms * rounds;
    println!(
        "Attack resolution: {} attacks in {:?} ({:.2} μs/attack)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}

/// Benchmarks scheduler passes over many running rooms
#[test]
fn benchmark_scheduler_ticks() {
    let start_at = Instant::now();
    let rooms = 100;
    let mut registry = busy_registry(rooms, start_at);

    // 50ms ticks across most of a match, including every modifier throw.
    let ticks = 2000;
    let start = Instant::now();
    let mut updates = 0;
    for t in 1..=ticks {
        let at = start_at + Duration::from_millis(50 * t);
        updates += registry.tick(at).len();
    }

    let duration = start.elapsed();
    println!(
        "Scheduler: {} ticks over {} rooms in {:?} ({:.2} μs/tick)",
        ticks,
        rooms,
        duration,
        duration.as_micros() as f64 / ticks as f64
    );

    assert!(updates > 0);
    // Should complete in under 5 seconds
    assert!(duration.as_millis() < 5000);
}

/// Benchmarks projection encoding, the largest packet the server sends
#[test]
fn benchmark_state_serialization() {
    use bincode::{deserialize, serialize};
    use shared::Packet;

    let now = Instant::now();
    let mut registry = busy_registry(1, now);
    for k in 1..=5u64 {
        registry.tick(now + Duration::from_secs(10 * k));
    }
    let view = registry.view(&room_code(0), now).unwrap();
    let packet = Packet::State(view);

    let iterations = 10_000;
    let start = Instant::now();

    for _ in 0..iterations {
        let serialized = serialize(&packet).unwrap();
        let _deserialized: Packet = deserialize(&serialized).unwrap();
    }

    let duration = start.elapsed();
    println!(
        "State serialization: {} iterations in {:?} ({:.2} μs/iter)",
        iterations,
        duration,
        duration.as_micros() as f64 / iterations as f64
    );

    // Should complete in under 2 seconds
    assert!(duration.as_millis() < 2000);
}
