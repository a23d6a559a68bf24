use common::log_setup::{setup_logging, LogSettings};
use criterion::{criterion_group, Criterion};

fn geometry_benchmarks(c: &mut Criterion) {
    bacillus::geometry::bench::benchmarks(c);
}

criterion_group!(benches, geometry_benchmarks);

fn main() {
    let settings = LogSettings::file_only("info", "target/bench-logs", "geometry_bench");
    if let Err(err) = setup_logging(&settings) {
        eprintln!("bench logging disabled: {err}");
    }

    benches();
    Criterion::default().configure_from_args().final_summary();
}
