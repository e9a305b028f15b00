//! Categories, levels and the non-secret metadata that travels with every
//! ciphertext.
//!
//! Metadata is never secret. Together with live key material it fully
//! determines how to reverse an encryption; nothing else is consulted.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::encoding;
use crate::error::EngineError;
use crate::keys::KeyVersion;

/// The kind of payload being protected. Each category receives its own
/// working key, so compromise of one category's key exposes no other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataCategory {
    PersonalInfo,
    FinancialData,
    LegalDocuments,
    Authentication,
    SessionData,
    SystemConfig,
}

impl DataCategory {
    pub const ALL: [DataCategory; 6] = [
        Self::PersonalInfo,
        Self::FinancialData,
        Self::LegalDocuments,
        Self::Authentication,
        Self::SessionData,
        Self::SystemConfig,
    ];

    /// Stable label, also used in working-key salts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PersonalInfo => "personal_info",
            Self::FinancialData => "financial_data",
            Self::LegalDocuments => "legal_documents",
            Self::Authentication => "authentication",
            Self::SessionData => "session_data",
            Self::SystemConfig => "system_config",
        }
    }
}

impl fmt::Display for DataCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataCategory {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| EngineError::InvalidCategory(s.to_string()))
    }
}

/// Required strength, ordered `Basic < Standard < High < Maximum`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EncryptionLevel {
    /// Low-sensitivity context fields.
    Basic = 0,
    /// Ordinary personal data.
    Standard = 1,
    /// Financial and legal data; adds an embedded integrity hash.
    High = 2,
    /// Hybrid encryption with a per-artifact ephemeral RSA key.
    Maximum = 3,
}

impl EncryptionLevel {
    pub const ALL: [EncryptionLevel; 4] = [Self::Basic, Self::Standard, Self::High, Self::Maximum];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Standard => "standard",
            Self::High => "high",
            Self::Maximum => "maximum",
        }
    }

    /// The algorithm id of the strategy implementing this level.
    pub fn algorithm_id(&self) -> &'static str {
        match self {
            Self::Basic => algorithm_id::BASIC,
            Self::Standard => algorithm_id::STANDARD,
            Self::High => algorithm_id::HIGH,
            Self::Maximum => algorithm_id::MAXIMUM,
        }
    }
}

impl fmt::Display for EncryptionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EncryptionLevel {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| EngineError::InvalidLevel(s.to_string()))
    }
}

/// Stable identifiers under which the strategies are registered.
pub mod algorithm_id {
    pub const BASIC: &str = "sym-aead-v1";
    pub const STANDARD: &str = "aes256-gcm-v1";
    pub const HIGH: &str = "aes256-gcm-v2-integrity";
    pub const MAXIMUM: &str = "aes256-gcm-rsa2048-v1";
}

/// The strategy-specific parts of the metadata: whatever a strategy needs
/// beyond the key to reverse its own output.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AlgorithmFields {
    pub nonce: Option<Vec<u8>>,
    pub extra: Option<Vec<u8>>,
}

/// Metadata stored alongside a ciphertext. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionMetadata {
    pub artifact_id: String,
    pub level: EncryptionLevel,
    pub category: DataCategory,
    pub algorithm_id: String,
    pub key_version: KeyVersion,
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "encoding::base64_opt", skip_serializing_if = "Option::is_none")]
    pub nonce: Option<Vec<u8>>,
    #[serde(default, with = "encoding::base64_opt", skip_serializing_if = "Option::is_none")]
    pub extra: Option<Vec<u8>>,
}

impl EncryptionMetadata {
    pub(crate) fn new(
        artifact_id: String,
        level: EncryptionLevel,
        category: DataCategory,
        key_version: KeyVersion,
        fields: AlgorithmFields,
    ) -> Self {
        Self {
            artifact_id,
            level,
            category,
            algorithm_id: level.algorithm_id().to_string(),
            key_version,
            created_at: Utc::now(),
            nonce: fields.nonce,
            extra: fields.extra,
        }
    }

    /// The strategy-specific fields, as handed back to `decrypt`.
    pub fn algorithm_fields(&self) -> AlgorithmFields {
        AlgorithmFields {
            nonce: self.nonce.clone(),
            extra: self.extra.clone(),
        }
    }
}

/// Ciphertext plus the metadata required to decrypt it. Caller-owned; the
/// engine keeps no artifact state after returning one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedArtifact {
    #[serde(with = "encoding::base64_bytes")]
    pub ciphertext: Vec<u8>,
    pub metadata: EncryptionMetadata,
}

impl EncryptedArtifact {
    /// Render as JSON with base64 byte fields.
    pub fn to_json(&self) -> Result<String, EngineError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(s: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(s)?)
    }
}
