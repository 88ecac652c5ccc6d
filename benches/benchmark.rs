use chipshot::motif::ScoringMatrix;
use criterion::{black_box, criterion_group, criterion_main, Criterion};

static GATA1: &str = ">MA0035.4 GATA1
A  [    1     0    20     0    20     1 ]
C  [    8     0     0     0     0     2 ]
G  [    1    20     0     0     0     9 ]
T  [   10     0     0    20     0     8 ]
";

fn criterion_benchmark(c: &mut Criterion) {
    let matrix = ScoringMatrix::from_reader(GATA1.as_bytes()).unwrap();
    let peak: Vec<u8> = b"acGTCttACGaTATGATAGCN".iter().cycle().take(500).copied().collect();
    c.bench_function("scan 500bp peak", |b| {
        b.iter(|| matrix.scan(black_box(&peak), None))
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
