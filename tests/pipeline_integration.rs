//! End-to-end pipeline tests over a real filesystem mover and an in-memory
//! database, with the populator and post-action chains assembled from
//! component specs the way production configuration does.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use aviation_message_archiver::actions::{
    MessagePublisher, MessagePublisherAction, PostActionError, PostActionRegistry,
    PostActionService, PublishOutcome,
};
use aviation_message_archiver::conditions::{
    GeneralPropertyPredicate, PropertyReaderRegistry,
};
use aviation_message_archiver::config::{ComponentSpec, LookupTables, ProcessingSettings, ProductConfig};
use aviation_message_archiver::database::{DatabaseAccess, DatabaseError, DatabaseService};
use aviation_message_archiver::models::{
    ArchiveAviationMessage, FileMetadata, FileReference, InputAviationMessage,
    MessagePositionInFile,
};
use aviation_message_archiver::parser::{MessageParser, ParseError};
use aviation_message_archiver::pipeline::{
    FileDisposition, FileProcessorService, LocalFileMover,
};
use aviation_message_archiver::populators::{MessagePopulatorService, PopulatorRegistry};
use aviation_message_archiver::processing::ProcessingState;
use aviation_message_archiver::resilience::RetryPolicy;

/// One message per non-empty line; first token is the type, second the ICAO
/// location indicator. Empty files are malformed.
struct LineParser;

impl MessageParser for LineParser {
    fn parse(
        &self,
        content: &[u8],
        metadata: &FileMetadata,
    ) -> Result<Vec<InputAviationMessage>, ParseError> {
        let text =
            std::str::from_utf8(content).map_err(|_| ParseError::malformed("not utf-8"))?;
        let mut messages = Vec::new();
        for (index, line) in text.lines().filter(|line| !line.trim().is_empty()).enumerate() {
            let mut tokens = line.split_whitespace();
            let mut message = InputAviationMessage::new(
                line,
                MessagePositionInFile::new(0, index),
                metadata.clone(),
            );
            message.message_type = tokens.next().map(str::to_string);
            message.location_indicator = tokens.next().map(str::to_string);
            message.issue_time = Some(chrono::Utc::now());
            messages.push(message);
        }
        if messages.is_empty() {
            return Err(ParseError::malformed("file contains no messages"));
        }
        Ok(messages)
    }
}

/// In-memory store with a station lookup table and per-message-text
/// transient failure injection.
#[derive(Default)]
struct InMemoryAccess {
    stations: HashMap<String, i32>,
    inserted: Mutex<Vec<ArchiveAviationMessage>>,
    rejected: Mutex<Vec<ArchiveAviationMessage>>,
    fail_inserts_containing: Option<String>,
}

#[async_trait]
impl DatabaseAccess for InMemoryAccess {
    async fn insert_message(
        &self,
        message: &ArchiveAviationMessage,
    ) -> Result<i64, DatabaseError> {
        if let (Some(marker), Some(text)) = (&self.fail_inserts_containing, &message.message) {
            if text.contains(marker.as_str()) {
                return Err(DatabaseError::transient("insert_message", "connection lost"));
            }
        }
        let mut inserted = self.inserted.lock();
        inserted.push(message.clone());
        Ok(inserted.len() as i64)
    }

    async fn insert_rejected_message(
        &self,
        message: &ArchiveAviationMessage,
    ) -> Result<i64, DatabaseError> {
        let mut rejected = self.rejected.lock();
        rejected.push(message.clone());
        Ok(rejected.len() as i64)
    }

    async fn query_station_id(&self, icao_code: &str) -> Result<Option<i32>, DatabaseError> {
        Ok(self.stations.get(icao_code).copied())
    }
}

#[derive(Default)]
struct RecordingPublisher {
    payloads: Mutex<Vec<serde_json::Value>>,
}

#[async_trait]
impl MessagePublisher for RecordingPublisher {
    async fn publish(&self, payload: Vec<u8>) -> Result<PublishOutcome, PostActionError> {
        self.payloads.lock().push(serde_json::from_slice(&payload)?);
        Ok(PublishOutcome::Accepted)
    }
}

fn tables() -> Arc<LookupTables> {
    Arc::new(LookupTables {
        message_types: HashMap::from([
            ("TAF".to_string(), 2),
            ("METAR".to_string(), 1),
        ]),
        formats: HashMap::from([("TAC".to_string(), 1)]),
        routes: HashMap::from([("GTS".to_string(), 7)]),
        product_routes: HashMap::from([("taf".to_string(), "GTS".to_string())]),
    })
}

fn spec(name: &str) -> ComponentSpec {
    ComponentSpec {
        name: name.to_string(),
        activate_on: BTreeMap::new(),
        config: serde_json::Map::new(),
    }
}

/// The production-like populator chain: metadata and content first, then a
/// conditional discarder dropping METAR messages, then station resolution.
fn populator_specs() -> Vec<ComponentSpec> {
    let mut discard_metar = spec("message_discarder");
    discard_metar.activate_on = BTreeMap::from([(
        "type".to_string(),
        GeneralPropertyPredicate {
            is: Some(serde_json::Value::String("METAR".to_string())),
            ..Default::default()
        },
    )]);
    vec![
        spec("file_metadata"),
        spec("message_content"),
        discard_metar,
        spec("station_id"),
    ]
}

struct Harness {
    service: FileProcessorService,
    access: Arc<InMemoryAccess>,
    publisher: Arc<RecordingPublisher>,
    product: ProductConfig,
    _root: tempfile::TempDir,
}

fn harness(access: InMemoryAccess) -> Harness {
    let root = tempfile::tempdir().unwrap();
    let product = ProductConfig {
        id: "taf".to_string(),
        route: "GTS".to_string(),
        format: "TAC".to_string(),
        input_dir: root.path().join("in"),
        archive_dir: root.path().join("archive"),
        fail_dir: root.path().join("failed"),
    };
    std::fs::create_dir_all(&product.input_dir).unwrap();

    let tables = tables();
    let access = Arc::new(access);
    let publisher = Arc::new(RecordingPublisher::default());
    let retry = RetryPolicy {
        initial_interval: Duration::from_millis(1),
        multiplier: 1.0,
        max_interval: Duration::from_millis(1),
        max_attempts: Some(2),
        max_elapsed: None,
    };

    let populators = PopulatorRegistry::with_builtin_populators(tables.clone(), access.clone())
        .build_chain(&populator_specs())
        .unwrap();
    let post_actions = PostActionRegistry::with_builtin_actions(
        PropertyReaderRegistry::with_builtin_readers(tables),
        publisher.clone(),
        retry.clone(),
        &ProcessingSettings::default(),
    )
    .build_chain(&[spec(MessagePublisherAction::NAME)])
    .unwrap();

    let service = FileProcessorService::new(
        Arc::new(ProcessingState::new()),
        Arc::new(LineParser),
        MessagePopulatorService::new(populators),
        DatabaseService::new(access.clone(), retry),
        PostActionService::new(post_actions),
        Arc::new(LocalFileMover::new(std::slice::from_ref(&product))),
        &ProcessingSettings::default(),
    );

    Harness {
        service,
        access,
        publisher,
        product,
        _root: root,
    }
}

fn drop_file(harness: &Harness, filename: &str, content: &str) -> FileMetadata {
    std::fs::write(harness.product.input_dir.join(filename), content).unwrap();
    FileMetadata::new(
        FileReference::new("taf", filename),
        "TAC",
        Some(chrono::Utc::now()),
    )
}

fn stations() -> HashMap<String, i32> {
    HashMap::from([("EFHK".to_string(), 101)])
}

#[tokio::test]
async fn file_with_mixed_outcomes_is_archived() {
    let harness = harness(InMemoryAccess {
        stations: stations(),
        ..Default::default()
    });
    let metadata = drop_file(
        &harness,
        "bulletin.txt",
        "TAF EFHK 230830Z ...\nTAF XXXX 230830Z ...\nMETAR EFHK 230850Z ...\n",
    );

    let outcome = harness
        .service
        .submit_file(metadata, std::fs::read(harness.product.input_dir.join("bulletin.txt")).unwrap())
        .await
        .unwrap();

    assert_eq!(outcome.disposition, FileDisposition::Archived);
    assert_eq!(outcome.stats.parsed, 3);
    assert_eq!(outcome.stats.archived, 1);
    assert_eq!(outcome.stats.rejected, 1);
    assert_eq!(outcome.stats.discarded, 1);

    // EFHK resolved, XXXX rejected, METAR discarded by the condition.
    assert_eq!(harness.access.inserted.lock().len(), 1);
    assert_eq!(harness.access.rejected.lock().len(), 1);

    // Both persisted messages were published downstream.
    assert_eq!(harness.publisher.payloads.lock().len(), 2);

    // The input file moved to the archive directory.
    assert!(!harness.product.input_dir.join("bulletin.txt").exists());
    assert!(harness.product.archive_dir.join("bulletin.txt").exists());

    assert_eq!(
        harness
            .service
            .processing_state()
            .file_count_under_processing(),
        0
    );
}

#[tokio::test]
async fn unparseable_file_goes_to_the_failure_directory() {
    let harness = harness(InMemoryAccess {
        stations: stations(),
        ..Default::default()
    });
    let metadata = drop_file(&harness, "empty.txt", "\n\n");

    let outcome = harness
        .service
        .submit_file(metadata, b"\n\n".to_vec())
        .await
        .unwrap();

    assert_eq!(outcome.disposition, FileDisposition::Failed);
    assert!(harness.product.fail_dir.join("empty.txt").exists());
    assert!(harness.access.inserted.lock().is_empty());
    assert!(harness.publisher.payloads.lock().is_empty());
}

#[tokio::test]
async fn exhausted_persistence_fails_the_file_but_keeps_siblings() {
    let harness = harness(InMemoryAccess {
        stations: HashMap::from([("EFHK".to_string(), 101), ("EFRO".to_string(), 102)]),
        fail_inserts_containing: Some("EFRO".to_string()),
        ..Default::default()
    });
    let metadata = drop_file(
        &harness,
        "partial.txt",
        "TAF EFHK 230830Z ...\nTAF EFRO 230830Z ...\n",
    );

    let outcome = harness
        .service
        .submit_file(
            metadata,
            std::fs::read(harness.product.input_dir.join("partial.txt")).unwrap(),
        )
        .await
        .unwrap();

    // The healthy sibling is persisted and published even though the file
    // as a whole is routed to the failure directory.
    assert_eq!(outcome.disposition, FileDisposition::Failed);
    assert_eq!(harness.access.inserted.lock().len(), 1);
    assert_eq!(harness.publisher.payloads.lock().len(), 1);
    assert!(harness.product.fail_dir.join("partial.txt").exists());
}

#[tokio::test]
async fn shutdown_drains_and_closes_the_intake() {
    let harness = harness(InMemoryAccess {
        stations: stations(),
        ..Default::default()
    });

    harness.service.shutdown(Duration::from_millis(200)).await;

    let metadata = FileMetadata::new(FileReference::new("taf", "late.txt"), "TAC", None);
    let result = harness.service.submit_file(metadata, b"TAF EFHK".to_vec()).await;
    assert!(result.is_err());
}
