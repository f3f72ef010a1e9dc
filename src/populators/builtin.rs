//! Built-in message populators.
//!
//! The set mirrors what a production deployment configures: file and
//! bulletin context first, parsed message content next, then enrichment and
//! validation steps that may reject or discard.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde::Deserialize;

use super::{MessagePopulator, PopulationError};
use crate::config::{ConfigurationError, LookupTables};
use crate::database::DatabaseAccess;
use crate::models::{
    ArchiveAviationMessageBuilder, InputAviationMessage, RejectReason,
};

/// Sets format id, route id and file-modified time from the file's metadata
/// and product configuration.
pub struct FileMetadataPopulator {
    tables: Arc<LookupTables>,
}

impl FileMetadataPopulator {
    pub const NAME: &'static str = "file_metadata";

    pub fn new(tables: Arc<LookupTables>) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl MessagePopulator for FileMetadataPopulator {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn populate(
        &self,
        input: &InputAviationMessage,
        builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError> {
        let metadata = &input.file_metadata;
        let format_id = self
            .tables
            .formats
            .get(&metadata.format)
            .copied()
            .ok_or_else(|| {
                PopulationError::failed(format!("unknown file format '{}'", metadata.format))
            })?;
        let product_id = metadata.file_reference.product_id();
        let route_id = self
            .tables
            .product_routes
            .get(product_id)
            .and_then(|route| self.tables.routes.get(route))
            .copied()
            .ok_or_else(|| {
                PopulationError::failed(format!("no route configured for product '{product_id}'"))
            })?;

        builder.format_id = Some(format_id);
        builder.route_id = Some(route_id);
        builder.file_modified = metadata.file_modified;
        Ok(())
    }
}

/// Copies the bulletin heading and message version onto the record.
pub struct BulletinHeadingPopulator;

impl BulletinHeadingPopulator {
    pub const NAME: &'static str = "bulletin_heading";
}

#[async_trait]
impl MessagePopulator for BulletinHeadingPopulator {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn populate(
        &self,
        input: &InputAviationMessage,
        builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError> {
        if let Some(heading) = &input.heading {
            builder.heading = Some(heading.heading.clone());
        }
        if let Some(version) = &input.version {
            builder.version = Some(version.clone());
        }
        Ok(())
    }
}

/// Copies parsed message content onto the record: text, type id, times,
/// validity period and station ICAO code.
pub struct MessageContentPopulator {
    tables: Arc<LookupTables>,
}

impl MessageContentPopulator {
    pub const NAME: &'static str = "message_content";

    pub fn new(tables: Arc<LookupTables>) -> Self {
        Self { tables }
    }
}

#[async_trait]
impl MessagePopulator for MessageContentPopulator {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn populate(
        &self,
        input: &InputAviationMessage,
        builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError> {
        builder.message = Some(input.content.clone());
        builder.message_time = input.issue_time;
        builder.valid_from = input.valid_from;
        builder.valid_to = input.valid_to;
        if builder.station_icao_code.is_none() {
            builder.station_icao_code = input.location_indicator.clone();
        }

        let type_name = input
            .message_type
            .as_deref()
            .ok_or_else(|| PopulationError::failed("message type was not parsed"))?;
        let type_id = self
            .tables
            .message_types
            .get(type_name)
            .copied()
            .ok_or_else(|| {
                PopulationError::failed(format!("unknown message type '{type_name}'"))
            })?;
        builder.type_id = Some(type_id);
        Ok(())
    }
}

/// Resolves the station id from the station ICAO code; rejects the message
/// when the code is not known.
pub struct StationIdPopulator {
    database: Arc<dyn DatabaseAccess>,
}

impl StationIdPopulator {
    pub const NAME: &'static str = "station_id";

    pub fn new(database: Arc<dyn DatabaseAccess>) -> Self {
        Self { database }
    }
}

#[async_trait]
impl MessagePopulator for StationIdPopulator {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn populate(
        &self,
        _input: &InputAviationMessage,
        builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError> {
        let Some(icao_code) = builder.station_icao_code.clone() else {
            builder.reject(RejectReason::UnknownStationIcaoCode);
            return Ok(());
        };
        match self.database.query_station_id(&icao_code).await? {
            Some(station_id) => {
                builder.station_id = Some(station_id);
            }
            None => {
                tracing::debug!(icao_code, "station ICAO code not found");
                builder.reject(RejectReason::UnknownStationIcaoCode);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FixedValidityConfig {
    validity_hours: i64,
}

/// Gives messages without a parsed validity period a fixed-length one
/// starting at the message time.
pub struct FixedDurationValidityPeriodPopulator {
    validity: Duration,
}

impl FixedDurationValidityPeriodPopulator {
    pub const NAME: &'static str = "fixed_duration_validity_period";

    pub fn new(validity: Duration) -> Self {
        Self { validity }
    }

    pub fn from_config(
        config: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ConfigurationError> {
        let config: FixedValidityConfig =
            serde_json::from_value(serde_json::Value::Object(config.clone())).map_err(|error| {
                ConfigurationError::InvalidComponentConfig {
                    component: Self::NAME.to_string(),
                    reason: error.to_string(),
                }
            })?;
        Ok(Self::new(Duration::hours(config.validity_hours)))
    }
}

#[async_trait]
impl MessagePopulator for FixedDurationValidityPeriodPopulator {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn populate(
        &self,
        _input: &InputAviationMessage,
        builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError> {
        if builder.valid_from.is_none() && builder.valid_to.is_none() {
            if let Some(message_time) = builder.message_time {
                builder.valid_from = Some(message_time);
                builder.valid_to = Some(message_time + self.validity);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct FutureTimeConfig {
    maximum_future_hours: i64,
}

/// Rejects messages whose message time lies further in the future than the
/// configured maximum.
pub struct MessageFutureTimeValidator {
    maximum_future: Duration,
}

impl MessageFutureTimeValidator {
    pub const NAME: &'static str = "message_future_time_validator";

    pub fn new(maximum_future: Duration) -> Self {
        Self { maximum_future }
    }

    pub fn from_config(
        config: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, ConfigurationError> {
        let config: FutureTimeConfig =
            serde_json::from_value(serde_json::Value::Object(config.clone())).map_err(|error| {
                ConfigurationError::InvalidComponentConfig {
                    component: Self::NAME.to_string(),
                    reason: error.to_string(),
                }
            })?;
        Ok(Self::new(Duration::hours(config.maximum_future_hours)))
    }
}

#[async_trait]
impl MessagePopulator for MessageFutureTimeValidator {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn populate(
        &self,
        _input: &InputAviationMessage,
        builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError> {
        if let Some(message_time) = builder.message_time {
            if message_time > Utc::now() + self.maximum_future {
                builder.reject(RejectReason::MessageTimeInFuture);
            }
        }
        Ok(())
    }
}

/// Unconditionally signals a discard; meaningful only together with an
/// activation condition selecting the messages to drop.
pub struct MessageDiscarder;

impl MessageDiscarder {
    pub const NAME: &'static str = "message_discarder";
}

#[async_trait]
impl MessagePopulator for MessageDiscarder {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn populate(
        &self,
        input: &InputAviationMessage,
        _builder: &mut ArchiveAviationMessageBuilder,
    ) -> Result<(), PopulationError> {
        Err(PopulationError::discard(format!(
            "discarded by configuration at bulletin {} message {}",
            input.position.bulletin_index, input.position.message_index
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::DatabaseError;
    use crate::models::{
        FileMetadata, FileReference, MessageFields, MessagePositionInFile, ProcessingResult,
    };
    use std::collections::HashMap;

    fn tables() -> Arc<LookupTables> {
        Arc::new(LookupTables {
            message_types: HashMap::from([("TAF".to_string(), 2)]),
            formats: HashMap::from([("TAC".to_string(), 1)]),
            routes: HashMap::from([("GTS".to_string(), 7)]),
            product_routes: HashMap::from([("taf".to_string(), "GTS".to_string())]),
        })
    }

    fn taf_input() -> InputAviationMessage {
        let metadata = FileMetadata::new(
            FileReference::new("taf", "bulletin.txt"),
            "TAC",
            Some(Utc::now()),
        );
        let mut input = InputAviationMessage::new(
            "TAF EFHK 230830Z 2309/2409 ...",
            MessagePositionInFile::new(0, 0),
            metadata,
        );
        input.message_type = Some("TAF".to_string());
        input.location_indicator = Some("EFHK".to_string());
        input.issue_time = Some(Utc::now());
        input
    }

    struct StationLookup(Option<i32>);

    #[async_trait]
    impl DatabaseAccess for StationLookup {
        async fn insert_message(
            &self,
            _: &crate::models::ArchiveAviationMessage,
        ) -> Result<i64, DatabaseError> {
            unreachable!("not used in populator tests")
        }

        async fn insert_rejected_message(
            &self,
            _: &crate::models::ArchiveAviationMessage,
        ) -> Result<i64, DatabaseError> {
            unreachable!("not used in populator tests")
        }

        async fn query_station_id(&self, _: &str) -> Result<Option<i32>, DatabaseError> {
            Ok(self.0)
        }
    }

    #[tokio::test]
    async fn file_metadata_populator_resolves_ids() {
        let populator = FileMetadataPopulator::new(tables());
        let mut builder = ArchiveAviationMessageBuilder::new();

        populator.populate(&taf_input(), &mut builder).await.unwrap();

        assert_eq!(builder.format_id, Some(1));
        assert_eq!(builder.route_id, Some(7));
        assert!(builder.file_modified.is_some());
    }

    #[tokio::test]
    async fn content_populator_fails_on_unknown_type() {
        let populator = MessageContentPopulator::new(tables());
        let mut input = taf_input();
        input.message_type = Some("SPECI".to_string());
        let mut builder = ArchiveAviationMessageBuilder::new();

        let result = populator.populate(&input, &mut builder).await;
        assert!(matches!(result, Err(PopulationError::Failed { .. })));
    }

    #[tokio::test]
    async fn station_id_populator_sets_id_when_found() {
        let populator = StationIdPopulator::new(Arc::new(StationLookup(Some(421))));
        let mut builder = ArchiveAviationMessageBuilder::new();
        builder.station_icao_code = Some("EFHK".to_string());

        populator.populate(&taf_input(), &mut builder).await.unwrap();

        assert_eq!(builder.station_id, Some(421));
        assert!(builder.processing_result().is_ok());
    }

    #[tokio::test]
    async fn station_id_populator_rejects_unknown_code() {
        let populator = StationIdPopulator::new(Arc::new(StationLookup(None)));
        let mut builder = ArchiveAviationMessageBuilder::new();
        builder.station_icao_code = Some("XXXX".to_string());

        populator.populate(&taf_input(), &mut builder).await.unwrap();

        assert_eq!(builder.station_id, None);
        assert_eq!(
            builder.processing_result(),
            ProcessingResult::Rejected(RejectReason::UnknownStationIcaoCode)
        );
    }

    #[tokio::test]
    async fn fixed_validity_period_applies_only_when_unset() {
        let populator = FixedDurationValidityPeriodPopulator::new(Duration::hours(12));
        let now = Utc::now();

        let mut builder = ArchiveAviationMessageBuilder::new();
        builder.message_time = Some(now);
        populator.populate(&taf_input(), &mut builder).await.unwrap();
        assert_eq!(builder.valid_from, Some(now));
        assert_eq!(builder.valid_to, Some(now + Duration::hours(12)));

        let parsed_from = now - Duration::hours(1);
        let mut builder = ArchiveAviationMessageBuilder::new();
        builder.message_time = Some(now);
        builder.valid_from = Some(parsed_from);
        populator.populate(&taf_input(), &mut builder).await.unwrap();
        assert_eq!(builder.valid_from, Some(parsed_from));
        assert_eq!(builder.valid_to, None);
    }

    #[tokio::test]
    async fn future_time_validator_rejects_far_future_messages() {
        let validator = MessageFutureTimeValidator::new(Duration::hours(12));
        let mut builder = ArchiveAviationMessageBuilder::new();
        builder.message_time = Some(Utc::now() + Duration::hours(36));

        validator.populate(&taf_input(), &mut builder).await.unwrap();

        assert_eq!(
            builder.processing_result(),
            ProcessingResult::Rejected(RejectReason::MessageTimeInFuture)
        );
    }

    #[tokio::test]
    async fn discarder_signals_discard() {
        let mut builder = ArchiveAviationMessageBuilder::new();
        let result = MessageDiscarder.populate(&taf_input(), &mut builder).await;
        assert!(matches!(result, Err(ref e) if e.is_discard()));
    }
}
