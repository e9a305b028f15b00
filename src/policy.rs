//! Field-level encryption of structured records.
//!
//! A `RecordPolicy` maps field names to a (category, level) pair. Fields
//! named by the policy are canonically serialized and encrypted one by one;
//! every other field passes through untouched so it stays usable for
//! indexing and lookup. Failures are isolated per field: one bad field never
//! loses the rest of the record.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::engine::EncryptionEngine;
use crate::error::{EngineError, EngineResult};
use crate::metadata::{DataCategory, EncryptedArtifact, EncryptionLevel};

/// A plain structured record: field name to value.
pub type Record = BTreeMap<String, Value>;

/// How a single field is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRule {
    pub category: DataCategory,
    pub level: EncryptionLevel,
}

/// Which fields of a record are encrypted, and how.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPolicy {
    rules: BTreeMap<String, FieldRule>,
    /// Field whose value identifies the record; used in artifact ids.
    id_field: Option<String>,
}

impl RecordPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encrypt `field` under `category` at `level`.
    pub fn encrypt_field(
        mut self,
        field: impl Into<String>,
        category: DataCategory,
        level: EncryptionLevel,
    ) -> Self {
        self.rules.insert(field.into(), FieldRule { category, level });
        self
    }

    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = Some(field.into());
        self
    }

    pub fn rule(&self, field: &str) -> Option<FieldRule> {
        self.rules.get(field).copied()
    }

    pub fn rules(&self) -> impl Iterator<Item = (&str, FieldRule)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// The policy of the client questionnaire: identity data at standard,
    /// financial data at high, free-text context at basic. Identifiers and
    /// timestamps stay in the clear.
    pub fn questionnaire_default() -> Self {
        Self::new()
            .with_id_field("clientId")
            .encrypt_field("bioData", DataCategory::PersonalInfo, EncryptionLevel::Standard)
            .encrypt_field("financialData", DataCategory::FinancialData, EncryptionLevel::High)
            .encrypt_field("economicContext", DataCategory::PersonalInfo, EncryptionLevel::Basic)
            .encrypt_field("objectives", DataCategory::PersonalInfo, EncryptionLevel::Basic)
            .encrypt_field(
                "distributionPreferences",
                DataCategory::PersonalInfo,
                EncryptionLevel::Basic,
            )
    }

    fn record_id(&self, record: &Record) -> String {
        match self.id_field.as_ref().and_then(|f| record.get(f)) {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => "unknown".to_string(),
        }
    }

    /// Encrypt every field the policy names; pass the rest through.
    pub fn encrypt_record(
        &self,
        engine: &EncryptionEngine,
        record: &Record,
    ) -> RecordOutcome<EncryptedRecord> {
        let record_id = self.record_id(record);
        let mut plain_fields = BTreeMap::new();
        let mut encrypted_fields = BTreeMap::new();
        let mut failures = BTreeMap::new();

        for (field, value) in record {
            let Some(rule) = self.rule(field) else {
                plain_fields.insert(field.clone(), value.clone());
                continue;
            };

            let artifact_id = format!("{field}_{record_id}_{}", Uuid::new_v4().simple());
            match engine.encrypt_value(value, rule.category, rule.level, Some(&artifact_id)) {
                Ok(artifact) => {
                    encrypted_fields.insert(field.clone(), artifact);
                }
                Err(err) => {
                    debug!(%field, error = %err, "field encryption failed");
                    failures.insert(field.clone(), err);
                }
            }
        }

        RecordOutcome {
            record: EncryptedRecord {
                plain_fields,
                encrypted_fields,
                encrypted_at: Utc::now(),
            },
            failures,
        }
    }
}

/// A record with its sensitive fields replaced by artifacts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedRecord {
    pub plain_fields: BTreeMap<String, Value>,
    pub encrypted_fields: BTreeMap<String, EncryptedArtifact>,
    pub encrypted_at: DateTime<Utc>,
}

impl EncryptedRecord {
    pub fn encrypted_field_names(&self) -> Vec<&str> {
        self.encrypted_fields.keys().map(String::as_str).collect()
    }

    /// Decrypt every artifact using its own metadata. Failures are reported
    /// per field, wrapped with the field name.
    pub fn decrypt_record(&self, engine: &EncryptionEngine) -> RecordOutcome<Record> {
        let mut record = self.plain_fields.clone();
        let mut failures = BTreeMap::new();

        for (field, artifact) in &self.encrypted_fields {
            match engine.decrypt_value(artifact) {
                Ok(value) => {
                    record.insert(field.clone(), value);
                }
                Err(err) => {
                    debug!(%field, error = %err, "field decryption failed");
                    failures.insert(field.clone(), EngineError::for_field(field, err));
                }
            }
        }

        RecordOutcome { record, failures }
    }
}

/// The per-field result of a record operation: everything that succeeded,
/// plus the failure of each field that did not.
#[derive(Debug)]
pub struct RecordOutcome<T> {
    pub record: T,
    pub failures: BTreeMap<String, EngineError>,
}

impl<T> RecordOutcome<T> {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// The record if every field succeeded, otherwise the first failure.
    pub fn into_complete(self) -> EngineResult<T> {
        match self.failures.into_values().next() {
            None => Ok(self.record),
            Some(err) => Err(err),
        }
    }
}

/// Deterministic text encoding of a value: objects with sorted keys,
/// compact JSON.
pub(crate) fn canonical_bytes(value: &Value) -> EngineResult<Vec<u8>> {
    Ok(serde_json::to_vec(&canonicalize(value))?)
}

pub(crate) fn from_canonical_bytes(bytes: &[u8]) -> EngineResult<Value> {
    Ok(serde_json::from_slice(bytes)?)
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let sorted: BTreeMap<&String, &Value> = map.iter().collect();
            Value::Object(
                sorted
                    .into_iter()
                    .map(|(k, v)| (k.clone(), canonicalize(v)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
