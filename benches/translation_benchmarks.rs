use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mongo_database::translate::{all_to_external, to_external, to_native};
use mongo_database::FindOptions;
use mongodb::bson::{doc, Document};

fn sample_record() -> Document {
    doc! {
        "id": "u1",
        "name": "Ann",
        "age": 34,
        "address": {"city": "Lyon", "zip": "69001"},
        "tags": ["admin", "beta"],
    }
}

fn benchmark_to_native(c: &mut Criterion) {
    let record = sample_record();

    c.bench_function("to_native", |b| {
        b.iter(|| {
            let _native = to_native(black_box(record.clone()));
        })
    });
}

fn benchmark_to_external(c: &mut Criterion) {
    let stored = to_native(sample_record());

    c.bench_function("to_external", |b| {
        b.iter(|| {
            let _external = to_external(black_box(stored.clone()));
        })
    });
}

fn benchmark_result_batch(c: &mut Criterion) {
    let batch: Vec<Document> = (0..1_000)
        .map(|i| doc! {"_id": i, "name": format!("user-{}", i)})
        .collect();

    c.bench_function("all_to_external_1000", |b| {
        b.iter(|| {
            let _records = all_to_external(black_box(batch.clone()));
        })
    });
}

fn benchmark_sort_document(c: &mut Criterion) {
    let options: FindOptions =
        serde_json::from_value(serde_json::json!({"orderBy": {"key": "age", "order": "desc"}}))
            .unwrap();

    c.bench_function("sort_document", |b| {
        b.iter(|| {
            let _sort = black_box(&options).sort_document();
        })
    });
}

criterion_group!(
    benches,
    benchmark_to_native,
    benchmark_to_external,
    benchmark_result_batch,
    benchmark_sort_document
);
criterion_main!(benches);
