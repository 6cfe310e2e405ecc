use std::collections::HashMap;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use ragconf::{Loader, placeholder};

const SAMPLE: &str = include_str!("../settings.yaml");

fn benchmark_loader_load_str(c: &mut Criterion) {
    let loader = Loader::with_environment(HashMap::from([(
        "APP_ENV".to_string(),
        "bench".to_string(),
    )]));

    c.bench_function("loader.load_str", |b| {
        b.iter(|| {
            let settings = loader.load_str(black_box(SAMPLE)).expect("Failed to load settings");
            let _ = black_box(settings);
        });
    });
}

fn benchmark_loader_round_trip(c: &mut Criterion) {
    let loader = Loader::with_environment(HashMap::<String, String>::new());
    let settings = loader.load_str(SAMPLE).expect("Failed to load settings");

    c.bench_function("loader.round_trip", |b| {
        b.iter(|| {
            let yaml = black_box(&settings).to_yaml().expect("Failed to serialize settings");
            let _ = black_box(loader.load_str(&yaml).expect("Failed to reload settings"));
        });
    });
}

fn benchmark_placeholder_resolve(c: &mut Criterion) {
    let env = HashMap::from([("QDRANT_ROOT".to_string(), "/var/lib/rag".to_string())]);
    let text = "${QDRANT_ROOT:local_data}/private_gpt/${COLLECTION:documents}/segments";

    c.bench_function("placeholder.resolve_str", |b| {
        b.iter(|| {
            let resolved = placeholder::resolve_str(black_box(text), &env, "qdrant.path")
                .expect("Failed to resolve placeholders");
            let _ = black_box(resolved);
        });
    });
}


criterion_group!(
    benches,
    benchmark_loader_load_str,
    benchmark_loader_round_trip,
    benchmark_placeholder_resolve
);
criterion_main!(benches);
