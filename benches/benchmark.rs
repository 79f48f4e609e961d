use std::hint::black_box;

use criterion::{Criterion, criterion_group, criterion_main};
use ormlet::{ClassMetadata, Column, Model, Properties, Query, Value, describe};

struct Order;
impl Model for Order {
    fn declare(class: &mut ClassMetadata) {
        class
            .model_name("order")
            .field("customer", Column::text().not_null())
            .field("total", Column::number().default_value(0))
            .field("paid", Column::boolean())
            .field("lines", Column::object());
    }
}

fn orders(count: usize) -> Vec<Properties> {
    (0..count)
        .map(|i| {
            let mut order = Properties::new();
            order.insert("id".to_string(), Value::from(i as i64));
            order.insert("customer".to_string(), Value::from(format!("customer-{}", i % 97)));
            order.insert("total".to_string(), Value::from((i % 500) as f64 * 1.25));
            order.insert("paid".to_string(), Value::from(i % 3 == 0));
            order
        })
        .collect()
}

fn bench_describe(c: &mut Criterion) {
    c.bench_function("describe", |b| b.iter(|| black_box(describe::<Order>().unwrap())));
}

fn bench_matches(c: &mut Criterion) {
    let descriptor = describe::<Order>().unwrap();
    let query = Query::parse(r#"total >= 100 and paid = true and customer like "-1""#).unwrap();
    let bound = query.bind(&descriptor).unwrap();
    let rows = orders(10_000);
    c.bench_function("matches 10k rows", |b| {
        b.iter(|| black_box(rows.iter().filter(|row| bound.matches(row)).count()))
    });
}

fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse query", |b| {
        b.iter(|| black_box(Query::parse(r#"total > 10 and customer = "customer-5" && paid != false"#).unwrap()))
    });
}

criterion_group!(benches, bench_describe, bench_matches, bench_parse);
criterion_main!(benches);
