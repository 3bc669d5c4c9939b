use census_math::{Fixpoint32, Fractional16, Fractional48};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn bench_coprime_fraction(c: &mut Criterion) {
    c.bench_function("to_coprime_fraction", |b| {
        b.iter(|| {
            let fp = Fixpoint32::from_bits(black_box(0x243f_6a88));
            black_box(fp.to_coprime_fraction())
        })
    });
}

fn bench_column_product(c: &mut Criterion) {
    let cells: Vec<Fractional16> = (0..100u32)
        .map(|i| Fractional16::from_fixpoint(Fixpoint32::from_bits(0x8000_0000 | i * 0x0040_0000)))
        .collect();

    c.bench_function("column_product_100", |b| {
        b.iter(|| {
            let mut acc = Fractional48::from_fixpoint(cells[0].to_fixpoint());
            for cell in &cells[1..] {
                acc.mul_fixpoint(cell.to_fixpoint());
            }
            black_box(acc)
        })
    });
}

criterion_group!(benches, bench_coprime_fraction, bench_column_product);
criterion_main!(benches);
