use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;
use tf_idf_retriever::{
    query_to_dnf, Corpus, EvalConfig, RecommendConfig, RetrievalModel, Retriever, VocabularyConfig, WeightIndex,
};
use tf_idf_retriever::vectorizer::recommend::recommend;

const WORDS: [&str; 24] = [
    "war", "peace", "love", "ship", "sea", "king", "queen", "garden", "river", "night", "storm", "letter",
    "house", "city", "horse", "village", "money", "doctor", "child", "winter", "road", "fire", "book", "island",
];

/// Deterministic synthetic corpus
fn synthetic_corpus(docs: usize, len: usize) -> Corpus<String> {
    let mut state: u64 = 0x9e37_79b9_7f4a_7c15;
    let mut corpus = Corpus::new();
    for i in 0..docs {
        let tokens: Vec<&str> = (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                WORDS[(state % WORDS.len() as u64) as usize]
            })
            .collect();
        corpus.add_tokens(format!("doc{}", i + 1), &tokens).expect("unique keys");
    }
    corpus
}

fn index_and_search_benchmark(c: &mut Criterion) {
    let corpus = synthetic_corpus(2_000, 120);
    let vocab = VocabularyConfig::unpruned();

    c.bench_function("build_index", |b| {
        b.iter(|| WeightIndex::build(black_box(&corpus), &vocab).expect("valid config"));
    });

    c.bench_function("query_to_dnf", |b| {
        let query = ["(war", "OR", "peace)", "AND", "(ship", "OR", "sea)", "AND", "NOT", "storm"];
        b.iter(|| query_to_dnf(black_box(&query)).expect("well formed"));
    });

    let retriever: Retriever<String> = Retriever::with_corpus(corpus.clone(), vocab).expect("valid config");
    let cfg = EvalConfig::default().with_size(Some(10));
    let query = ["war", "AND", "peace", "OR", "king", "queen"];
    for model in [RetrievalModel::Boolean, RetrievalModel::ExtendedBoolean, RetrievalModel::Vector] {
        c.bench_function(&format!("search_{:?}", model), |b| {
            b.iter(|| retriever.search(model, black_box(&query), &cfg).expect("search"));
        });
    }

    let small = synthetic_corpus(300, 40);
    let retrieved: Vec<String> = (1..=10).map(|i| format!("doc{}", i)).collect();
    c.bench_function("recommend", |b| {
        b.iter(|| recommend(black_box(&small), &retrieved, &RecommendConfig::default()));
    });
}

criterion_group!(benches, index_and_search_benchmark);
criterion_main!(benches);
