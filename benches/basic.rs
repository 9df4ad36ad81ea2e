use criterion::{criterion_group, criterion_main, Criterion};
use laser_remote::{CommandDispatcher, PersistedLaserState, SimulatedLaser};
use std::hint::black_box;
use std::time::Duration;

pub fn bench_persisted_codec(c: &mut Criterion) {
    let state = PersistedLaserState::new(false, "1", "50.0");
    let encoded = state.encode();

    c.bench_function("encode_persisted_state", |b| {
        b.iter(|| black_box(black_box(&state).encode()))
    });
    c.bench_function("decode_persisted_state", |b| {
        b.iter(|| black_box(PersistedLaserState::decode(black_box(&encoded))))
    });
    c.bench_function("decode_foreign_slot_value", |b| {
        b.iter(|| black_box(PersistedLaserState::decode(black_box("calibrated 2019"))))
    });
}

pub fn bench_dispatcher_round_trip(c: &mut Criterion) {
    let device = SimulatedLaser::new();
    let mut port = device.port("SIM0");
    let mut dispatcher = CommandDispatcher::new(Box::new(port.clone()));

    // Logs are cleared every iteration so they do not grow for the whole run.
    c.bench_function("query_simulated_laser", |b| {
        b.iter(|| {
            let reply = dispatcher.send(black_box("glc?"));
            port.clear_write_log();
            device.clear_history();
            black_box(reply)
        })
    });
    c.bench_function("classify_error_reply", |b| {
        b.iter(|| {
            let reply = dispatcher.send(black_box("xyz?"));
            port.clear_write_log();
            device.clear_history();
            black_box(reply)
        })
    });
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(300))
        .measurement_time(Duration::from_secs(2));
    targets = bench_persisted_codec, bench_dispatcher_round_trip
}
criterion_main!(benches);
