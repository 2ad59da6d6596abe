use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};

use chrono::Utc;
use rust_decimal::Decimal;

use stockroom_catalog::{Product, ProductDraft};
use stockroom_orders::{OrderStatus, PlacedLine};
use stockroom_reports::{render_csv, summarize};

fn build_products(count: usize) -> Vec<Product> {
    (0..count)
        .map(|i| {
            Product::new(ProductDraft {
                name: format!("product-{i}"),
                description: "benchmark fixture".to_string(),
                stock: 1_000,
                price: Decimal::new(1_000 + i as i64, 2),
                cost_price: Decimal::new(400 + i as i64, 2),
            })
            .unwrap()
        })
        .collect()
}

fn build_lines(products: &[Product], count: usize) -> Vec<PlacedLine> {
    let now = Utc::now();
    (0..count)
        .map(|i| {
            let product = &products[i % products.len()];
            let status = match i % 3 {
                0 => OrderStatus::Completed,
                1 => OrderStatus::Cancelled,
                _ => OrderStatus::Stable,
            };
            PlacedLine {
                product_id: product.id,
                quantity: (i % 7 + 1) as i64,
                status,
                order_updated_at: now,
            }
        })
        .collect()
}

fn bench_summarize(c: &mut Criterion) {
    let mut group = c.benchmark_group("summarize");

    for (product_count, line_count) in [(10, 100), (100, 1_000), (100, 10_000)] {
        let products = build_products(product_count);
        let lines = build_lines(&products, line_count);

        group.throughput(Throughput::Elements(line_count as u64));
        group.bench_function(
            BenchmarkId::new("aggregate", format!("{product_count}p_{line_count}l")),
            |b| {
                b.iter(|| {
                    let rows = summarize(black_box(&products), black_box(&lines));
                    black_box(rows);
                });
            },
        );
    }

    group.finish();
}

fn bench_render_csv(c: &mut Criterion) {
    let mut group = c.benchmark_group("render_csv");
    group.sample_size(200);

    for product_count in [10usize, 100, 1_000] {
        let products = build_products(product_count);
        let lines = build_lines(&products, product_count * 10);
        let rows = summarize(&products, &lines);

        group.throughput(Throughput::Elements(product_count as u64));
        group.bench_function(BenchmarkId::new("rows", product_count), |b| {
            b.iter(|| {
                let csv = render_csv(black_box(&rows));
                black_box(csv);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_summarize, bench_render_csv);
criterion_main!(benches);
