use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use kotoba_core::diversify::{Diversifier, DiversifyContext};
use kotoba_core::lexicon::{LexicalStore, LexiconTokenizer};
use kotoba_core::settings::{DiversifierConfig, LexiconConfig};

static INPUTS: &[(&str, &str)] = &[
    ("short", "仕事が大切です"),
    ("medium", "しかし友達と話すのはとても楽しい。難しい問題も簡単に考える"),
    (
        "long",
        "今日は本当に嬉しい。仕事の方法を少し考えて、意見を述べる。\
         そして美しい景色を眺める。大切な友人と会って、すごく速い電車を見る。",
    ),
];

fn bench_diversify(c: &mut Criterion) {
    let store = LexicalStore::new(LexiconConfig::default()).into_shared();
    let tokenizer = {
        let guard = store.read().unwrap();
        Arc::new(LexiconTokenizer::from_store(&guard))
    };
    let config = DiversifierConfig {
        auto_enhance: false,
        ..DiversifierConfig::default()
    };
    let diversifier = Diversifier::new(store, tokenizer, config).with_seed(1);
    let ctx = DiversifyContext::default();

    let mut group = c.benchmark_group("diversify/seed");
    for &(label, text) in INPUTS {
        group.bench_with_input(BenchmarkId::new(label, text.len()), &text, |b, &text| {
            b.iter(|| diversifier.diversify_detailed(text, &ctx));
        });
    }
    group.finish();
}

fn bench_enhance(c: &mut Criterion) {
    c.bench_function("lexicon/enhance_seed", |b| {
        b.iter_batched(
            || LexicalStore::new(LexiconConfig::default()),
            |mut store| store.build_enhanced_synonym_map(),
            criterion::BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_diversify, bench_enhance);
criterion_main!(benches);
