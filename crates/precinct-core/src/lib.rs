//! Core domain model and sync result types for Precinct.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

pub const CRATE_NAME: &str = "precinct-core";

/// Which game framework a community's server runs. Determines the citizen
/// endpoint and payload shape; the vehicle payload is shared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GameSystem {
    Esx,
    Qbcore,
}

impl GameSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Esx => "esx",
            Self::Qbcore => "qbcore",
        }
    }
}

impl fmt::Display for GameSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSystem(pub String);

impl fmt::Display for UnknownSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown game system {:?} (expected esx or qbcore)", self.0)
    }
}

impl std::error::Error for UnknownSystem {}

impl FromStr for GameSystem {
    type Err = UnknownSystem;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "esx" => Ok(Self::Esx),
            "qbcore" => Ok(Self::Qbcore),
            other => Err(UnknownSystem(other.to_string())),
        }
    }
}

/// Endpoint block for one game system.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemEndpoint {
    pub base_url: String,
}

/// Per-organization sync configuration, supplied by the caller (registry or
/// web handler). Not persisted by the sync engine itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgSyncConfig {
    pub organization_id: String,
    pub display_name: String,
    pub system: GameSystem,
    #[serde(default)]
    pub sync_interval_minutes: Option<u32>,
    #[serde(default)]
    pub esx: Option<SystemEndpoint>,
    #[serde(default)]
    pub qbcore: Option<SystemEndpoint>,
}

impl OrgSyncConfig {
    /// Base URL for the configured system, if present and non-empty.
    pub fn base_url(&self) -> Option<&str> {
        let endpoint = match self.system {
            GameSystem::Esx => self.esx.as_ref(),
            GameSystem::Qbcore => self.qbcore.as_ref(),
        };
        endpoint
            .map(|e| e.base_url.trim())
            .filter(|url| !url.is_empty())
    }
}

/// Canonical citizen representation. JSON sub-documents are carried opaque and
/// persisted as serialized text; the scalar fields below them are derived from
/// `metadata` for indexing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitizenRecord {
    pub citizen_id: String,
    pub organization_id: String,
    pub display_name: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    pub gender: String,
    pub phone: Option<String>,
    pub nationality: Option<String>,
    pub money: JsonValue,
    pub charinfo: JsonValue,
    pub job: JsonValue,
    pub gang: JsonValue,
    pub position: JsonValue,
    pub metadata: JsonValue,
    pub inventory: JsonValue,
    pub fingerprint: Option<String>,
    pub blood_type: Option<String>,
    pub dead: bool,
    pub handcuffed: bool,
    pub jail_minutes: i64,
    pub last_active_at: Option<DateTime<Utc>>,
}

/// Canonical vehicle representation, keyed by plate. A plate observed under a
/// different citizen on a later pass reassigns ownership (last write wins).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub plate: String,
    pub citizen_id: String,
    pub organization_id: String,
    pub model: String,
    pub brand: Option<String>,
    pub garage: Option<String>,
    pub engine_health: f64,
    pub body_health: f64,
    pub fuel: f64,
    pub mileage: f64,
    pub color: JsonValue,
    pub damage: JsonValue,
    pub mods: JsonValue,
    pub glovebox: JsonValue,
    pub trunk: JsonValue,
    pub last_position: JsonValue,
    pub balance: f64,
    pub payment_amount: f64,
    pub payments_left: i64,
    pub finance_due_at: Option<DateTime<Utc>>,
    pub impounded: bool,
    pub impounded_at: Option<DateTime<Utc>>,
    pub impound_release_at: Option<DateTime<Utc>>,
    pub last_driven_at: Option<DateTime<Utc>>,
}

/// Which branch an upsert-by-natural-key took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

/// Per-entity-type tallies for one sync pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStats {
    pub created: u64,
    pub updated: u64,
    pub errors: u64,
}

impl EntityStats {
    pub fn absorb(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Created => self.created += 1,
            UpsertOutcome::Updated => self.updated += 1,
        }
    }

    pub fn merge(&mut self, other: EntityStats) {
        self.created += other.created;
        self.updated += other.updated;
        self.errors += other.errors;
    }

    pub fn total(&self) -> u64 {
        self.created + self.updated + self.errors
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub citizens: EntityStats,
    pub vehicles: EntityStats,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Idle,
    Error,
}

/// Transient aggregate returned per sync invocation. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncStatusResult {
    pub status: SyncStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<SyncStats>,
}

impl SyncStatusResult {
    pub fn completed(stats: SyncStats, finished_at: DateTime<Utc>) -> Self {
        Self {
            status: SyncStatus::Idle,
            last_sync_at: Some(finished_at),
            error: None,
            stats: Some(stats),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: SyncStatus::Error,
            last_sync_at: None,
            error: Some(message.into()),
            stats: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.status == SyncStatus::Error
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_system_parses_known_values_only() {
        assert_eq!("esx".parse::<GameSystem>().unwrap(), GameSystem::Esx);
        assert_eq!("QBCore".parse::<GameSystem>().unwrap(), GameSystem::Qbcore);
        assert!("vrp".parse::<GameSystem>().is_err());
    }

    #[test]
    fn sync_status_serializes_lowercase() {
        let result = SyncStatusResult::failed("boom");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["error"], "boom");
        assert!(json.get("stats").is_none());
        assert!(json.get("last_sync_at").is_none());
    }

    #[test]
    fn base_url_requires_matching_system_block() {
        let config = OrgSyncConfig {
            organization_id: "org-1".into(),
            display_name: "Org One".into(),
            system: GameSystem::Qbcore,
            sync_interval_minutes: None,
            esx: Some(SystemEndpoint {
                base_url: "http://esx.example".into(),
            }),
            qbcore: None,
        };
        assert_eq!(config.base_url(), None);

        let config = OrgSyncConfig {
            system: GameSystem::Esx,
            ..config
        };
        assert_eq!(config.base_url(), Some("http://esx.example"));
    }

    #[test]
    fn entity_stats_absorb_and_merge() {
        let mut stats = EntityStats::default();
        stats.absorb(UpsertOutcome::Created);
        stats.absorb(UpsertOutcome::Updated);
        stats.absorb(UpsertOutcome::Updated);
        stats.merge(EntityStats {
            created: 1,
            updated: 0,
            errors: 2,
        });
        assert_eq!(stats.created, 2);
        assert_eq!(stats.updated, 2);
        assert_eq!(stats.errors, 2);
        assert_eq!(stats.total(), 6);
    }
}
