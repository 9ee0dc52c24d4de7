use anyhow::Result;
use embed_picker::search::{
    cosine_similarity, DatasetKey, EmbeddingStore, EmbeddingVector, Encoder, HashingEncoder,
    ModelRegistry, ModelSpec, NearestNeighborSearch,
};
use embed_picker::PickerError;
use rand::Rng;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::{Builder, NamedTempFile};

/// Hashing encoder that counts batch calls and optionally dawdles.
struct CountingEncoder {
    inner: HashingEncoder,
    batches: AtomicUsize,
    delay: Duration,
}

impl CountingEncoder {
    fn new(dimension: usize, delay: Duration) -> Result<Self> {
        Ok(Self {
            inner: HashingEncoder::new(dimension)?,
            batches: AtomicUsize::new(0),
            delay,
        })
    }

    fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }
}

impl Encoder for CountingEncoder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        self.batches.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        self.inner.encode_batch(texts)
    }
}

/// Looks texts up in a fixed table.
struct TableEncoder {
    dimension: usize,
    table: HashMap<String, EmbeddingVector>,
}

impl Encoder for TableEncoder {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        texts
            .iter()
            .map(|t| {
                self.table
                    .get(t)
                    .cloned()
                    .ok_or_else(|| anyhow::anyhow!("no vector for '{}'", t))
            })
            .collect()
    }
}

/// Blocks inside encoding until the test lets it go.
struct GatedEncoder {
    inner: HashingEncoder,
    entered: Barrier,
    release: Barrier,
}

impl Encoder for GatedEncoder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        self.entered.wait();
        self.release.wait();
        self.inner.encode_batch(texts)
    }
}

/// Fails its first batch, after a pause, and succeeds from then on.
struct FlakyEncoder {
    inner: HashingEncoder,
    calls: AtomicUsize,
    successes: AtomicUsize,
    delay: Duration,
}

impl Encoder for FlakyEncoder {
    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn encode_batch(&self, texts: &[String]) -> Result<Vec<EmbeddingVector>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        if call == 0 {
            anyhow::bail!("model warming up");
        }
        self.successes.fetch_add(1, Ordering::SeqCst);
        self.inner.encode_batch(texts)
    }
}

fn dataset_file(prompts: &[&str]) -> Result<NamedTempFile> {
    let records: Vec<serde_json::Value> = prompts
        .iter()
        .enumerate()
        .map(|(i, p)| serde_json::json!({ "id": i, "prompt": p }))
        .collect();
    let mut file = Builder::new().suffix(".json").tempfile()?;
    file.write_all(serde_json::to_string(&records)?.as_bytes())?;
    file.flush()?;
    Ok(file)
}

const PROMPTS: &[&str] = &[
    "summarize this article in three bullet points",
    "translate the paragraph into french",
    "write a haiku about autumn leaves",
    "explain the proof step by step",
    "list the risks of this plan",
];

#[test]
fn cached_load_skips_encoding() -> Result<()> {
    let file = dataset_file(PROMPTS)?;
    let encoder = Arc::new(CountingEncoder::new(64, Duration::ZERO)?);
    let mut registry = ModelRegistry::new();
    registry.register("counting", encoder.clone());
    let store = EmbeddingStore::new(Arc::new(registry));

    let first = store.load(file.path(), "prompt", "counting")?;
    assert_eq!(encoder.batches(), 1);

    let second = store.load(file.path(), "prompt", "counting")?;
    assert_eq!(encoder.batches(), 1, "cache hit must not re-encode");
    assert_eq!(first.records(), second.records());
    assert_eq!(first.vectors(), second.vectors());

    // A different field is a different key.
    store.load(file.path(), "id", "counting").unwrap_err();
    assert_eq!(encoder.batches(), 1, "non-text field fails before encoding");
    Ok(())
}

#[test]
fn top_one_beats_every_other_record() -> Result<()> {
    let mut rng = rand::thread_rng();
    let dimension = 12;
    let count = 60;

    let mut table = HashMap::new();
    let texts: Vec<String> = (0..count).map(|i| format!("doc {}", i)).collect();
    for text in &texts {
        let v: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
        table.insert(text.clone(), v);
    }
    let query: Vec<f32> = (0..dimension).map(|_| rng.gen_range(-1.0..1.0)).collect();
    table.insert("the query".to_string(), query.clone());

    let mut registry = ModelRegistry::new();
    registry.register("table", Arc::new(TableEncoder { dimension, table }));
    let registry = Arc::new(registry);

    let prompts: Vec<&str> = texts.iter().map(String::as_str).collect();
    let file = dataset_file(&prompts)?;
    let store = EmbeddingStore::new(registry.clone());
    let dataset = store.load(file.path(), "prompt", "table")?;

    let search = NearestNeighborSearch::new(registry);
    let best = search.closest_embeddings("the query", "table", &dataset, 1)?;
    assert_eq!(best.len(), 1);

    for vector in dataset.vectors() {
        assert!(best[0].score >= cosine_similarity(&query, vector));
    }
    Ok(())
}

#[test]
fn oversized_n_returns_full_ranking() -> Result<()> {
    let file = dataset_file(PROMPTS)?;
    let mut registry = ModelRegistry::new();
    registry.register_spec("hash", ModelSpec::Hashing { dimension: 128 });
    let registry = Arc::new(registry);
    let store = EmbeddingStore::new(registry.clone());
    let search = NearestNeighborSearch::new(registry);

    let dataset = store.load(file.path(), "prompt", "hash")?;
    let ranked = search.closest_embeddings("write a poem about autumn", "hash", &dataset, 100)?;
    assert_eq!(ranked.len(), PROMPTS.len());
    assert!(ranked.windows(2).all(|w| w[0].score >= w[1].score));

    let mut ids: Vec<i64> = ranked.iter().filter_map(|m| m.record["id"].as_i64()).collect();
    ids.sort();
    assert_eq!(ids, vec![0, 1, 2, 3, 4]);

    assert!(search.closest_embeddings("anything", "hash", &dataset, 0)?.is_empty());
    Ok(())
}

#[test]
fn empty_query_is_rejected() -> Result<()> {
    let file = dataset_file(PROMPTS)?;
    let mut registry = ModelRegistry::new();
    registry.register_spec("hash", ModelSpec::Hashing { dimension: 32 });
    let registry = Arc::new(registry);
    let dataset = EmbeddingStore::new(registry.clone()).load(file.path(), "prompt", "hash")?;

    let search = NearestNeighborSearch::new(registry);
    assert!(matches!(
        search.closest_embeddings("", "hash", &dataset, 3),
        Err(PickerError::EmptyQuery)
    ));
    Ok(())
}

#[test]
fn querying_with_other_dimension_fails() -> Result<()> {
    let file = dataset_file(PROMPTS)?;
    let mut registry = ModelRegistry::new();
    registry.register_spec("model-a", ModelSpec::Hashing { dimension: 16 });
    registry.register_spec("model-b", ModelSpec::Hashing { dimension: 32 });
    let registry = Arc::new(registry);

    let dataset = EmbeddingStore::new(registry.clone()).load(file.path(), "prompt", "model-a")?;
    let search = NearestNeighborSearch::new(registry);

    match search.closest_embeddings("translate this", "model-b", &dataset, 3) {
        Err(PickerError::DimensionMismatch {
            model,
            expected,
            actual,
        }) => {
            assert_eq!(model, "model-b");
            assert_eq!(expected, 16);
            assert_eq!(actual, 32);
        }
        other => panic!("expected DimensionMismatch, got {:?}", other),
    }
    Ok(())
}

#[test]
fn concurrent_loads_encode_once() -> Result<()> {
    let file = dataset_file(PROMPTS)?;
    let encoder = Arc::new(CountingEncoder::new(64, Duration::from_millis(100))?);
    let mut registry = ModelRegistry::new();
    registry.register("slow", encoder.clone());
    let store = EmbeddingStore::new(Arc::new(registry));

    let workers = 16;
    let start = Barrier::new(workers);
    let datasets = thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|_| {
                scope.spawn(|| {
                    start.wait();
                    store.load(file.path(), "prompt", "slow")
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().expect("loader thread panicked"))
            .collect::<Vec<_>>()
    });

    assert_eq!(encoder.batches(), 1);
    let datasets: Vec<_> = datasets.into_iter().collect::<Result<_, _>>()?;
    for dataset in &datasets {
        assert!(Arc::ptr_eq(dataset, &datasets[0]));
        assert_eq!(dataset.len(), PROMPTS.len());
        assert_eq!(dataset.vectors().len(), dataset.records().len());
    }
    assert_eq!(store.len(), 1);
    Ok(())
}

#[test]
fn cached_reads_do_not_wait_on_other_keys() -> Result<()> {
    let ready = dataset_file(PROMPTS)?;
    let pending = dataset_file(&["one", "two"])?;

    let gated = Arc::new(GatedEncoder {
        inner: HashingEncoder::new(8)?,
        entered: Barrier::new(2),
        release: Barrier::new(2),
    });
    let mut registry = ModelRegistry::new();
    registry.register_spec("fast", ModelSpec::Hashing { dimension: 8 });
    registry.register("gated", gated.clone());
    let store = EmbeddingStore::new(Arc::new(registry));

    let cached = store.load(ready.path(), "prompt", "fast")?;

    thread::scope(|scope| -> Result<()> {
        let builder = scope.spawn(|| store.load(pending.path(), "prompt", "gated"));

        // The other key is now mid-build.
        gated.entered.wait();
        let again = store.load(ready.path(), "prompt", "fast")?;
        assert!(Arc::ptr_eq(&cached, &again));
        assert!(!store.contains(&DatasetKey::new(pending.path(), "prompt", "gated")));

        gated.release.wait();
        let built = builder.join().expect("builder thread panicked")?;
        assert_eq!(built.len(), 2);
        Ok(())
    })?;

    assert_eq!(store.len(), 2);
    Ok(())
}

#[test]
fn failed_encoding_is_not_cached() -> Result<()> {
    let file = dataset_file(&["known", "unknown"])?;
    let mut table = HashMap::new();
    table.insert("known".to_string(), vec![1.0, 0.0]);
    let mut registry = ModelRegistry::new();
    registry.register("partial", Arc::new(TableEncoder { dimension: 2, table }));
    let store = EmbeddingStore::new(Arc::new(registry));

    let err = store.load(file.path(), "prompt", "partial").unwrap_err();
    assert!(matches!(err, PickerError::Encoding { .. }));
    assert!(err.to_string().contains("no vector for 'unknown'"));
    assert!(store.is_empty());
    Ok(())
}

#[test]
fn waiters_on_a_failed_build_share_one_rebuild() -> Result<()> {
    let file = dataset_file(PROMPTS)?;
    let encoder = Arc::new(FlakyEncoder {
        inner: HashingEncoder::new(32)?,
        calls: AtomicUsize::new(0),
        successes: AtomicUsize::new(0),
        delay: Duration::from_millis(200),
    });
    let mut registry = ModelRegistry::new();
    registry.register("flaky", encoder.clone());
    let store = EmbeddingStore::new(Arc::new(registry));

    let (first, waiter, late) = thread::scope(|scope| {
        let first = scope.spawn(|| store.load(file.path(), "prompt", "flaky"));
        thread::sleep(Duration::from_millis(50));
        let waiter = scope.spawn(|| store.load(file.path(), "prompt", "flaky"));
        thread::sleep(Duration::from_millis(200));
        let late = scope.spawn(|| store.load(file.path(), "prompt", "flaky"));
        (
            first.join().expect("first loader panicked"),
            waiter.join().expect("waiting loader panicked"),
            late.join().expect("late loader panicked"),
        )
    });

    assert!(matches!(first, Err(PickerError::Encoding { .. })));
    let waiter = waiter?;
    let late = late?;
    assert!(Arc::ptr_eq(&waiter, &late));
    assert_eq!(encoder.successes.load(Ordering::SeqCst), 1);
    assert_eq!(encoder.calls.load(Ordering::SeqCst), 2);

    let cached = store.load(file.path(), "prompt", "flaky")?;
    assert!(Arc::ptr_eq(&cached, &waiter));
    assert_eq!(store.len(), 1);
    Ok(())
}
