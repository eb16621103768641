use criterion::{criterion_group, criterion_main};

mod network;

criterion_group!(
    benches,
    network::application::blynk::bench_encode,
    network::application::blynk::bench_parse_command,
    network::application::blynk::bench_receive
);
criterion_main!(benches);
