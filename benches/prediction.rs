use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use canopy::{
    compile, ColumnEncoding, ColumnEncodingBuilder, CompiledEngine, EncodedDatasetBuilder,
    ExampleBatch, Labels, RandomForestParams, RandomForestTrainer, RawValue, Verbosity,
};

fn synthetic_engine(n_trees: u32) -> CompiledEngine {
    let encoding: Arc<ColumnEncoding> = Arc::new(
        ColumnEncodingBuilder::new()
            .numerical("f0")
            .numerical("f1")
            .numerical("f2")
            .categorical("c0", ["a", "b", "c", "d"])
            .build()
            .unwrap(),
    );

    let mut builder = EncodedDatasetBuilder::new(Arc::clone(&encoding));
    let mut classes = Vec::new();
    let vocab = ["a", "b", "c", "d"];
    // Deterministic pseudo-data; the label depends on f0 and c0.
    let mut state = 0x2545_F491_4F6C_DD1Du64;
    for _ in 0..512 {
        let mut next = || {
            state ^= state << 13;
            state ^= state >> 7;
            state ^= state << 17;
            (state >> 40) as f32 / (1u32 << 24) as f32
        };
        let f0 = next();
        let f1 = next();
        let f2 = next();
        let c0 = (next() * 4.0) as usize % 4;
        builder
            .push_row(&[
                RawValue::Numerical(f0),
                RawValue::Numerical(f1),
                RawValue::Numerical(f2),
                RawValue::Categorical(vocab[c0]),
            ])
            .unwrap();
        classes.push(u32::from(f0 > 0.5 || c0 == 2));
    }
    let data = builder.build();
    let labels = Labels::Classification { classes, n_classes: 2 };

    let trainer = RandomForestTrainer::new(RandomForestParams {
        n_trees,
        max_depth: 10,
        min_examples_per_leaf: 2,
        seed: 7,
        verbosity: Verbosity::Silent,
        ..Default::default()
    });
    let model = trainer.train(&data, &labels).unwrap();
    compile(&model, encoding).unwrap()
}

fn fill_batch(engine: &CompiledEngine, n: usize) -> ExampleBatch {
    let mut batch = engine.allocate_examples(n);
    let f0 = engine.features().numerical("f0").unwrap();
    let f1 = engine.features().numerical("f1").unwrap();
    let c0 = engine.features().categorical("c0").unwrap();
    for i in 0..n {
        batch.set_numerical(i, f0, (i % 97) as f32 / 97.0).unwrap();
        batch.set_numerical(i, f1, (i % 31) as f32 / 31.0).unwrap();
        batch.set_categorical_index(i, c0, (i % 5) as u32).unwrap();
        // f2 stays missing on purpose.
    }
    batch
}

fn bench_predict(c: &mut Criterion) {
    let engine = synthetic_engine(100);

    let mut group = c.benchmark_group("predict");
    for &batch_size in &[1usize, 64, 1024] {
        let batch = fill_batch(&engine, batch_size);
        group.throughput(Throughput::Elements(batch_size as u64));
        group.bench_with_input(
            BenchmarkId::new("sequential", batch_size),
            &batch,
            |b, batch| {
                let mut out = Vec::with_capacity(batch_size);
                b.iter(|| {
                    engine
                        .predict_into(black_box(batch), batch_size, &mut out)
                        .unwrap();
                    black_box(&out);
                });
            },
        );
        group.bench_with_input(
            BenchmarkId::new("parallel", batch_size),
            &batch,
            |b, batch| {
                let mut out = Vec::with_capacity(batch_size);
                b.iter(|| {
                    engine
                        .par_predict_into(black_box(batch), batch_size, &mut out)
                        .unwrap();
                    black_box(&out);
                });
            },
        );
    }
    group.finish();
}

criterion_group!(benches, bench_predict);
criterion_main!(benches);
