//! src/persistent.rs
//!
//! Incremental store over the output json file. Existing records are kept
//! as raw json so a rewrite leaves them untouched; new ones are appended
//! only for ids that are not present yet.
//!

use std::{collections::HashSet, fs, io::ErrorKind, path::Path};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::crawler::RateGate;
use crate::errors::ScraperError;
use crate::fetch::MetadataSource;
use crate::sink::JsonFileSink;
use crate::types::{MetadataRecord, TrackRef};

/// `spotify.id` of a persisted record
fn record_id(record: &Value) -> Option<&str> {
    record.get("spotify")?.get("id")?.as_str()
}

#[derive(Debug, Clone, Default)]
pub struct Dataset {
    records: Vec<Value>,
    present: HashSet<String>
}

impl Dataset {
    pub fn from_records(records: Vec<Value>) -> Self {
        let present = records.iter()
            .filter_map(record_id)
            .map(str::to_string)
            .collect();
        Self { records, present }
    }

    /// A missing, unreadable or malformed file starts an empty dataset
    pub fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %path.display(), "store.fresh");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store.unreadable");
                return Self::default();
            }
        };

        match serde_json::from_str::<Value>(&raw) {
            Ok(Value::Array(records)) => {
                let dataset = Self::from_records(records);
                info!(path = %path.display(), records = dataset.len(), "store.loaded");
                dataset
            }
            Ok(_) => {
                warn!(path = %path.display(), "store.not_an_array");
                Self::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "store.corrupt");
                Self::default()
            }
        }
    }

    pub fn contains(&self, track_id: &str) -> bool {
        self.present.contains(track_id)
    }

    /// Returns false when a record for the same id already exists
    pub fn push(&mut self, record: MetadataRecord) -> Result<bool, ScraperError> {
        if self.contains(&record.spotify.id) {
            return Ok(false);
        }
        self.present.insert(record.spotify.id.clone());
        self.records.push(serde_json::to_value(&record)?);
        Ok(true)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn save(&self, sink: &JsonFileSink) -> Result<(), ScraperError> {
        sink.write(&self.records)?;
        debug!(path = %sink.path().display(), records = self.len(), "store.saved");
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncSummary {
    pub appended: usize,
    pub skipped: usize,
    pub empty: usize,
    pub interrupted: bool
}

/// Fetches metadata for every track not yet in `dataset`, in order.
///
/// An expired nonce stops the walk and is returned; whatever was appended
/// before it stays in `dataset` for the caller to save.
pub async fn sync_tracks<S: MetadataSource + ?Sized>(
    dataset: &mut Dataset,
    source: &S,
    tracks: &[TrackRef],
    gate: &mut RateGate,
    shutdown: &CancellationToken
) -> Result<SyncSummary, ScraperError> {
    let mut summary = SyncSummary::default();
    let total = tracks.len();

    for (i, track) in tracks.iter().enumerate() {
        if shutdown.is_cancelled() {
            warn!(remaining = total - i, "store.interrupted");
            summary.interrupted = true;
            break;
        }
        if dataset.contains(&track.id) {
            info!(track = %track.id, name = %track.name, "store.skip");
            summary.skipped += 1;
            continue;
        }

        println!("[{}/{}] Fetching {} by {}...", i + 1, total, track.name, track.artist);
        gate.wait().await;
        let fetched = source.fetch_metadata(&track.id).await;
        gate.done();

        let metadata = fetched?;
        if metadata.is_empty() {
            warn!(track = %track.id, "store.empty");
            summary.empty += 1;
            continue;
        }

        dataset.push(MetadataRecord { metadata, spotify: track.clone() })?;
        summary.appended += 1;
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TrackMetadata;
    use async_trait::async_trait;
    use serde_json::json;
    use std::{collections::HashMap, sync::Mutex, time::{Duration, Instant}};

    #[derive(Default)]
    struct FakeSource {
        responses: HashMap<String, TrackMetadata>,
        expired_at: Option<String>,
        latency: Duration,
        calls: Mutex<Vec<String>>,
        spans: Mutex<Vec<(Instant, Instant)>>
    }

    impl FakeSource {
        fn with(ids: &[&str]) -> Self {
            let responses = ids.iter()
                .map(|id| (id.to_string(), TrackMetadata {
                    track_info: Some(json!({ "name": format!("info {id}") })),
                    audio_features: Some(json!({ "tempo": 120 }))
                }))
                .collect();
            Self { responses, ..Default::default() }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetadataSource for FakeSource {
        async fn fetch_metadata(&self, track_id: &str) -> Result<TrackMetadata, ScraperError> {
            self.calls.lock().unwrap().push(track_id.to_string());
            let started = Instant::now();
            tokio::time::sleep(self.latency).await;
            self.spans.lock().unwrap().push((started, Instant::now()));

            if self.expired_at.as_deref() == Some(track_id) {
                return Err(ScraperError::AuthExpired("nonce".to_string()));
            }
            Ok(self.responses.get(track_id).cloned().unwrap_or_default())
        }
    }

    fn track(id: &str) -> TrackRef {
        TrackRef { id: id.to_string(), name: format!("song {id}"), artist: "artist".to_string() }
    }

    async fn run(
        path: &Path,
        source: &FakeSource,
        tracks: &[TrackRef]
    ) -> Result<SyncSummary, ScraperError> {
        let mut dataset = Dataset::load(path);
        let mut gate = RateGate::new(Duration::ZERO);
        let result = sync_tracks(
            &mut dataset, source, tracks, &mut gate, &CancellationToken::new()
        ).await;
        dataset.save(&JsonFileSink::new(path))?;
        result
    }

    fn read(path: &Path) -> Vec<Value> {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn existing_record_is_kept_and_new_one_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let existing = json!({
            "track_info": { "name": "old", "extra": [1, 2] },
            "spotify": { "id": "A", "name": "song A", "artist": "artist" }
        });
        fs::write(&path, serde_json::to_string(&json!([existing.clone()])).unwrap()).unwrap();

        let source = FakeSource::with(&["A", "B"]);
        let summary = run(&path, &source, &[track("A"), track("B")]).await.unwrap();

        assert_eq!(source.calls(), vec!["B"]);
        assert_eq!(summary, SyncSummary { appended: 1, skipped: 1, empty: 0, interrupted: false });

        let records = read(&path);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0], existing);
        assert_eq!(records[1]["spotify"]["id"], json!("B"));
        assert_eq!(records[1]["track_info"]["name"], json!("info B"));
    }

    #[tokio::test]
    async fn delay_separates_end_of_lookup_from_next_one() {
        let mut dataset = Dataset::default();
        let mut source = FakeSource::with(&["A", "B", "C"]);
        source.latency = Duration::from_millis(60);

        let delay = Duration::from_millis(40);
        let mut gate = RateGate::new(delay);
        sync_tracks(
            &mut dataset, &source, &[track("A"), track("B"), track("C")],
            &mut gate, &CancellationToken::new()
        ).await.unwrap();

        let spans = source.spans.lock().unwrap().clone();
        assert_eq!(spans.len(), 3);
        for pair in spans.windows(2) {
            let (_, previous_end) = pair[0];
            let (next_start, _) = pair[1];
            assert!(next_start.duration_since(previous_end) >= delay,
                "gap {:?}", next_start.duration_since(previous_end));
        }
        assert_eq!(dataset.len(), 3);
    }

    #[tokio::test]
    async fn second_run_leaves_file_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        let tracks = [track("A"), track("B")];

        let first = FakeSource::with(&["A", "B"]);
        run(&path, &first, &tracks).await.unwrap();
        let before = fs::read(&path).unwrap();

        let second = FakeSource::with(&["A", "B"]);
        let summary = run(&path, &second, &tracks).await.unwrap();

        assert!(second.calls().is_empty());
        assert_eq!(summary.skipped, 2);
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[tokio::test]
    async fn corrupt_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "[{\"spotify\": {\"id\": \"A\"").unwrap();

        let source = FakeSource::with(&["A", "B"]);
        run(&path, &source, &[track("A"), track("B")]).await.unwrap();

        assert_eq!(source.calls(), vec!["A", "B"]);
        assert_eq!(read(&path).len(), 2);
    }

    #[test]
    fn non_array_document_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"{"track_id": "A", "track_info": {}, "audio_features": {}}"#).unwrap();

        let dataset = Dataset::load(&path);
        assert!(dataset.is_empty());
        assert!(!dataset.contains("A"));
    }

    #[tokio::test]
    async fn empty_results_and_duplicates_are_not_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        // "B" has no response and comes back empty
        let source = FakeSource::with(&["A", "C"]);
        let tracks = [track("A"), track("B"), track("A"), track("C")];
        let summary = run(&path, &source, &tracks).await.unwrap();

        assert_eq!(source.calls(), vec!["A", "B", "C"]);
        assert_eq!(summary, SyncSummary { appended: 2, skipped: 1, empty: 1, interrupted: false });

        let ids: Vec<Value> = read(&path).iter().map(|r| r["spotify"]["id"].clone()).collect();
        assert_eq!(ids, vec![json!("A"), json!("C")]);
    }

    #[tokio::test]
    async fn partial_metadata_is_appended() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let mut source = FakeSource::default();
        source.responses.insert("C".to_string(), TrackMetadata {
            track_info: None,
            audio_features: Some(json!({ "energy": 0.4 }))
        });
        run(&path, &source, &[track("C")]).await.unwrap();

        let records = read(&path);
        assert_eq!(records.len(), 1);
        assert!(records[0].get("track_info").is_none());
        assert_eq!(records[0]["audio_features"]["energy"], json!(0.4));
    }

    #[tokio::test]
    async fn expired_nonce_keeps_collected_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");

        let mut source = FakeSource::with(&["A", "B", "C"]);
        source.expired_at = Some("B".to_string());
        let err = run(&path, &source, &[track("A"), track("B"), track("C")]).await.unwrap_err();

        assert!(err.is_auth_expired());
        assert_eq!(source.calls(), vec!["A", "B"]);
        let records = read(&path);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["spotify"]["id"], json!("A"));
    }

    #[tokio::test]
    async fn cancelled_run_fetches_nothing() {
        let mut dataset = Dataset::default();
        let source = FakeSource::with(&["A"]);
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        let mut gate = RateGate::new(Duration::ZERO);
        let summary = sync_tracks(&mut dataset, &source, &[track("A")], &mut gate, &shutdown)
            .await
            .unwrap();

        assert!(summary.interrupted);
        assert!(source.calls().is_empty());
        assert!(dataset.is_empty());
    }
}
