use std::sync::Mutex as StdMutex;

use ats_store::MemoryStore;

use super::*;

/// Returns one result per query character. Queries listed in `slow` take
/// a second, queries in `empty` find nothing and `fail` errors out.
#[derive(Default)]
struct FakeSource {
    calls: StdMutex<Vec<String>>,
    slow: Vec<&'static str>,
    empty: Vec<&'static str>,
    fail: Option<&'static str>,
}

impl FakeSource {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl SearchSource for FakeSource {
    type Item = String;

    async fn search(&self, query: &str) -> Result<Vec<String>, ClientError> {
        self.calls.lock().unwrap().push(query.to_owned());
        if self.slow.iter().any(|slow| *slow == query) {
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
        if self.fail.is_some_and(|fail| fail == query) {
            return Err(ClientError::Api("Error en la búsqueda".to_owned()));
        }
        if self.empty.iter().any(|empty| *empty == query) {
            return Ok(Vec::new());
        }
        Ok(query.chars().map(|c| c.to_string()).collect())
    }
}

fn new_search(source: FakeSource) -> Arc<DebouncedSearch<FakeSource>> {
    DebouncedSearch::new(source, SearchConfig::default(), SearchHistory::new("search"))
}

#[tokio::test(start_paused = true)]
async fn debouncer_emits_last_value_after_quiet_period() {
    let (tx, rx) = watch::channel(String::new());
    let mut debouncer = Debouncer::new(rx, Duration::from_millis(300), None);

    let started = Instant::now();
    let typing = tokio::spawn(async move {
        for text in ["w", "wh", "whi"] {
            tx.send_replace(text.to_owned());
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        tx
    });

    assert_eq!(debouncer.next().await.as_deref(), Some("whi"));
    assert!(started.elapsed() >= Duration::from_millis(500));
    drop(typing.await.unwrap());
    assert_eq!(debouncer.next().await, None);
}

#[tokio::test(start_paused = true)]
async fn debouncer_max_wait_bounds_continuous_typing() {
    let (tx, rx) = watch::channel(0u32);
    let mut debouncer = Debouncer::new(
        rx,
        Duration::from_millis(300),
        Some(Duration::from_millis(900)),
    );

    let started = Instant::now();
    let _typing = tokio::spawn(async move {
        for i in 1..=20 {
            tx.send_replace(i);
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    });

    let value = debouncer.next().await.unwrap();
    let waited = started.elapsed();
    assert!(waited <= Duration::from_millis(900), "waited {waited:?}");
    assert!(value < 20);
}

#[tokio::test(start_paused = true)]
async fn settled_query_runs_one_search_and_records_history() {
    let search = new_search(FakeSource::default());
    let _loop = search.spawn();

    search.set_query("r");
    search.set_query("ro");
    search.set_query("ron");
    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(search.source.calls(), vec!["ron".to_owned()]);
    let snapshot = search.snapshot();
    assert_eq!(snapshot.query, "ron");
    assert_eq!(snapshot.result_count, 3);
    assert!(!snapshot.loading);
    assert_eq!(search.history(), vec!["ron".to_owned()]);
}

#[tokio::test]
async fn short_query_clears_without_searching() {
    let search = new_search(FakeSource::default());
    assert_eq!(
        search.perform_search("pisco").await,
        SearchOutcome::Completed { count: 5 }
    );

    assert_eq!(search.perform_search("p").await, SearchOutcome::Cleared);
    assert_eq!(search.perform_search("   ").await, SearchOutcome::Cleared);

    let snapshot = search.snapshot();
    assert!(snapshot.results.is_empty());
    assert!(!snapshot.is_empty, "short queries are not an empty result");
    assert_eq!(search.source.calls(), vec!["pisco".to_owned()]);
}

#[tokio::test(start_paused = true)]
async fn newer_search_supersedes_slow_one() {
    let search = new_search(FakeSource {
        slow: vec!["ron"],
        ..FakeSource::default()
    });

    let slow = {
        let search = Arc::clone(&search);
        tokio::spawn(async move { search.perform_search("ron").await })
    };
    tokio::task::yield_now().await;
    assert!(search.snapshot().loading);

    assert_eq!(
        search.perform_search("vodka").await,
        SearchOutcome::Completed { count: 5 }
    );
    assert_eq!(slow.await.unwrap(), SearchOutcome::Superseded);

    let snapshot = search.snapshot();
    assert_eq!(snapshot.query, "vodka");
    assert_eq!(snapshot.result_count, 5);
    assert_eq!(search.history(), vec!["vodka".to_owned()]);
}

#[tokio::test]
async fn failure_is_reported_in_snapshot() {
    let search = new_search(FakeSource {
        fail: Some("gin"),
        ..FakeSource::default()
    });
    assert_eq!(search.perform_search("gin").await, SearchOutcome::Failed);

    let snapshot = search.snapshot();
    assert!(snapshot.error.unwrap().contains("Error en la búsqueda"));
    assert!(!snapshot.loading);
    assert!(search.history().is_empty());
}

#[tokio::test]
async fn empty_result_for_long_query_is_flagged() {
    let search = new_search(FakeSource {
        empty: vec!["absenta"],
        ..FakeSource::default()
    });
    assert_eq!(
        search.perform_search("absenta").await,
        SearchOutcome::Completed { count: 0 }
    );

    let snapshot = search.snapshot();
    assert!(snapshot.is_empty);
    assert_eq!(snapshot.result_count, 0);
}

#[tokio::test]
async fn history_is_persisted_and_editable() {
    let store: Arc<dyn ats_store::KeyValueStore> = Arc::new(MemoryStore::new());
    let search = DebouncedSearch::new(
        FakeSource::default(),
        SearchConfig::default(),
        SearchHistory::with_store("search", Arc::clone(&store)),
    );
    search.perform_search("tequila").await;
    search.perform_search("mezcal").await;
    assert_eq!(search.history(), vec!["mezcal".to_owned(), "tequila".to_owned()]);

    search.remove_from_history("mezcal");
    let reloaded = SearchHistory::with_store("search", Arc::clone(&store));
    assert_eq!(reloaded.entries().to_vec(), vec!["tequila".to_owned()]);

    search.clear_history();
    assert!(search.history().is_empty());
}
