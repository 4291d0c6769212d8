use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};

use reservoir_export::algs::collect::{CollectToIoRank, DataCollector};
use reservoir_export::algs::extract::extract_static_topology;
use reservoir_export::algs::transmissibility::UniformTransmissibility;
use reservoir_export::data::field::{CellData, FieldTable, Measure, TargetType};
use reservoir_export::data::{BlockData, NncSet, WellData};
use reservoir_export::topology::{CartesianDims, GlobalGrid, GlobalGridBuilder};

fn faulted_box(n: usize) -> GlobalGrid {
    let dims = CartesianDims::new(n, n, 4).expect("dims");
    let mut builder = GlobalGridBuilder::new(dims);
    // Juxtapose each column with the one diagonally across.
    for j in 0..n - 1 {
        let a = dims.linear_index(0, j, 0);
        let b = dims.linear_index(1, j + 1, 1);
        builder = builder.add_face_connection(a, b).expect("face");
    }
    builder.build().expect("grid")
}

fn bench_extract(c: &mut Criterion) {
    let mut group = c.benchmark_group("static_topology");
    for &n in &[16usize, 64] {
        let grid = faulted_box(n);
        group.bench_with_input(BenchmarkId::new("extract", n), &n, |b, _| {
            b.iter(|| {
                let topo =
                    extract_static_topology(&grid, &UniformTransmissibility(1.0), &NncSet::new())
                        .expect("extract");
                black_box(topo);
            });
        });
    }
    group.finish();
}

fn bench_serial_collect(c: &mut Criterion) {
    let mut group = c.benchmark_group("collect");
    for &cells in &[10_000usize, 100_000] {
        let mut fields = FieldTable::new();
        for name in ["PRESSURE", "SWAT", "SGAS", "RS"] {
            fields.insert(
                name.into(),
                CellData::new(
                    Measure::Identity,
                    (0..cells).map(|i| i as f64).collect(),
                    TargetType::RestartSolution,
                ),
            );
        }
        group.bench_with_input(BenchmarkId::new("serial", cells), &cells, |b, &cells| {
            let mut collector = CollectToIoRank::serial(cells);
            b.iter(|| {
                collector
                    .collect(&fields, &BlockData::new(), &WellData::new())
                    .expect("collect");
                black_box(collector.global_field_table().expect("io rank").len());
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_extract, bench_serial_collect);
criterion_main!(benches);
