//! Postgres persistence, remote game-API HTTP client, and TTL cache for Precinct.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use precinct_core::{CitizenRecord, OrgSyncConfig, UpsertOutcome, VehicleRecord};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CACHE_CONTROL};
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{info_span, Instrument};

pub const CRATE_NAME: &str = "precinct-store";

#[derive(Debug, Clone)]
pub struct ApiClientConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub max_in_flight: usize,
}

impl Default for ApiClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            max_in_flight: 16,
        }
    }
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed for {url}: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("unexpected payload shape from {url}: {message}")]
    Schema { url: String, message: String },
}

/// JSON GET client for the remote game-server API. Responses are never cached
/// (`Cache-Control: no-cache`) and every request is bounded by a timeout and a
/// global in-flight semaphore. Retries are intentionally absent; callers decide
/// how a failed fetch affects the enclosing phase.
#[derive(Debug)]
pub struct GameApiClient {
    client: reqwest::Client,
    in_flight: Arc<Semaphore>,
}

impl GameApiClient {
    pub fn new(config: ApiClientConfig) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        headers.insert(CACHE_CONTROL, HeaderValue::from_static("no-cache"));

        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout)
            .default_headers(headers);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build().context("building reqwest client")?;

        Ok(Self {
            client,
            in_flight: Arc::new(Semaphore::new(config.max_in_flight.max(1))),
        })
    }

    /// GET `url` and deserialize the body into `T`. A non-2xx status and a body
    /// that fails typed deserialization are distinct errors; neither is retried.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let span = info_span!("api_fetch", url);
        async move {
            let _permit = self.in_flight.acquire().await.expect("semaphore not closed");

            let resp = self
                .client
                .get(url)
                .send()
                .await
                .map_err(|source| FetchError::Request {
                    url: url.to_string(),
                    source,
                })?;

            let status = resp.status();
            let final_url = resp.url().to_string();
            if !status.is_success() {
                return Err(FetchError::HttpStatus {
                    status: status.as_u16(),
                    url: final_url,
                });
            }

            let body = resp.bytes().await.map_err(|source| FetchError::Request {
                url: final_url.clone(),
                source,
            })?;
            serde_json::from_slice(&body).map_err(|err| FetchError::Schema {
                url: final_url,
                message: err.to_string(),
            })
        }
        .instrument(span)
        .await
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
    /// For store implementations not backed by sqlx.
    #[error("store backend error: {0}")]
    Backend(String),
}

/// Mutation surface the sync engine needs from the relational store.
///
/// Upserts match on the natural key (citizen id, plate) and report which branch
/// ran. The update branch never writes `organization_id`, so a record cannot be
/// re-parented to another organization by a sync pass.
#[async_trait]
pub trait CommunityStore: Send + Sync {
    async fn ensure_organization(&self, config: &OrgSyncConfig) -> Result<(), StoreError>;
    async fn upsert_citizen(&self, record: &CitizenRecord) -> Result<UpsertOutcome, StoreError>;
    async fn upsert_vehicle(&self, record: &VehicleRecord) -> Result<UpsertOutcome, StoreError>;
    async fn record_sync_completed(
        &self,
        organization_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError>;
    async fn last_synced_at(
        &self,
        organization_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError>;
}

#[derive(Debug, Clone, Serialize)]
pub struct CitizenSummary {
    pub citizen_id: String,
    pub display_name: String,
    pub gender: String,
    pub phone: Option<String>,
    pub dead: bool,
    pub jail_minutes: i64,
    pub last_active_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct VehicleSummary {
    pub plate: String,
    pub citizen_id: String,
    pub model: String,
    pub fuel: f64,
    pub engine_health: f64,
    pub body_health: f64,
    pub impounded: bool,
    pub last_driven_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await?;
        Ok(Self { pool })
    }

    pub fn with_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!().run(&self.pool).await?;
        Ok(())
    }

    pub async fn list_citizens(
        &self,
        organization_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<CitizenSummary>, StoreError> {
        let per_page = per_page.max(1);
        let offset = page.saturating_sub(1) * per_page;
        let rows = sqlx::query(
            r#"
            SELECT citizen_id, display_name, gender, phone, dead, jail_minutes, last_active_at
              FROM citizens
             WHERE organization_id = $1
             ORDER BY display_name, citizen_id
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(organization_id)
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(CitizenSummary {
                citizen_id: row.try_get("citizen_id")?,
                display_name: row.try_get("display_name")?,
                gender: row.try_get("gender")?,
                phone: row.try_get("phone")?,
                dead: row.try_get("dead")?,
                jail_minutes: row.try_get("jail_minutes")?,
                last_active_at: row.try_get("last_active_at")?,
            });
        }
        Ok(out)
    }

    pub async fn list_vehicles(
        &self,
        organization_id: &str,
        page: usize,
        per_page: usize,
    ) -> Result<Vec<VehicleSummary>, StoreError> {
        let per_page = per_page.max(1);
        let offset = page.saturating_sub(1) * per_page;
        let rows = sqlx::query(
            r#"
            SELECT plate, citizen_id, model, fuel, engine_health, body_health,
                   impounded, last_driven_at
              FROM vehicles
             WHERE organization_id = $1
             ORDER BY plate
             LIMIT $2 OFFSET $3
            "#,
        )
        .bind(organization_id)
        .bind(per_page as i64)
        .bind(offset as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(VehicleSummary {
                plate: row.try_get("plate")?,
                citizen_id: row.try_get("citizen_id")?,
                model: row.try_get("model")?,
                fuel: row.try_get("fuel")?,
                engine_health: row.try_get("engine_health")?,
                body_health: row.try_get("body_health")?,
                impounded: row.try_get("impounded")?,
                last_driven_at: row.try_get("last_driven_at")?,
            });
        }
        Ok(out)
    }
}

#[async_trait]
impl CommunityStore for PgStore {
    async fn ensure_organization(&self, config: &OrgSyncConfig) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO organizations (id, name, game_system)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE
               SET name = EXCLUDED.name,
                   game_system = EXCLUDED.game_system
            "#,
        )
        .bind(&config.organization_id)
        .bind(&config.display_name)
        .bind(config.system.as_str())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_citizen(&self, record: &CitizenRecord) -> Result<UpsertOutcome, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO citizens (
                citizen_id, organization_id, display_name, first_name, last_name,
                date_of_birth, gender, phone, nationality,
                money, charinfo, job, gang, position, metadata, inventory,
                fingerprint, blood_type, dead, handcuffed, jail_minutes, last_active_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
            )
            ON CONFLICT (citizen_id) DO UPDATE SET
                display_name = EXCLUDED.display_name,
                first_name = EXCLUDED.first_name,
                last_name = EXCLUDED.last_name,
                date_of_birth = EXCLUDED.date_of_birth,
                gender = EXCLUDED.gender,
                phone = EXCLUDED.phone,
                nationality = EXCLUDED.nationality,
                money = EXCLUDED.money,
                charinfo = EXCLUDED.charinfo,
                job = EXCLUDED.job,
                gang = EXCLUDED.gang,
                position = EXCLUDED.position,
                metadata = EXCLUDED.metadata,
                inventory = EXCLUDED.inventory,
                fingerprint = EXCLUDED.fingerprint,
                blood_type = EXCLUDED.blood_type,
                dead = EXCLUDED.dead,
                handcuffed = EXCLUDED.handcuffed,
                jail_minutes = EXCLUDED.jail_minutes,
                last_active_at = EXCLUDED.last_active_at,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.citizen_id)
        .bind(&record.organization_id)
        .bind(&record.display_name)
        .bind(&record.first_name)
        .bind(&record.last_name)
        .bind(record.date_of_birth)
        .bind(&record.gender)
        .bind(&record.phone)
        .bind(&record.nationality)
        .bind(record.money.to_string())
        .bind(record.charinfo.to_string())
        .bind(record.job.to_string())
        .bind(record.gang.to_string())
        .bind(record.position.to_string())
        .bind(record.metadata.to_string())
        .bind(record.inventory.to_string())
        .bind(&record.fingerprint)
        .bind(&record.blood_type)
        .bind(record.dead)
        .bind(record.handcuffed)
        .bind(record.jail_minutes)
        .bind(record.last_active_at)
        .fetch_one(&self.pool)
        .await?;

        let inserted: bool = row.try_get("inserted")?;
        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn upsert_vehicle(&self, record: &VehicleRecord) -> Result<UpsertOutcome, StoreError> {
        let row = sqlx::query(
            r#"
            INSERT INTO vehicles (
                plate, citizen_id, organization_id, model, brand, garage,
                engine_health, body_health, fuel, mileage,
                color, damage, mods, glovebox, trunk, last_position,
                balance, payment_amount, payments_left, finance_due_at,
                impounded, impounded_at, impound_release_at, last_driven_at
            ) VALUES (
                $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                $13, $14, $15, $16, $17, $18, $19, $20, $21, $22, $23, $24
            )
            ON CONFLICT (plate) DO UPDATE SET
                citizen_id = EXCLUDED.citizen_id,
                model = EXCLUDED.model,
                brand = EXCLUDED.brand,
                garage = EXCLUDED.garage,
                engine_health = EXCLUDED.engine_health,
                body_health = EXCLUDED.body_health,
                fuel = EXCLUDED.fuel,
                mileage = EXCLUDED.mileage,
                color = EXCLUDED.color,
                damage = EXCLUDED.damage,
                mods = EXCLUDED.mods,
                glovebox = EXCLUDED.glovebox,
                trunk = EXCLUDED.trunk,
                last_position = EXCLUDED.last_position,
                balance = EXCLUDED.balance,
                payment_amount = EXCLUDED.payment_amount,
                payments_left = EXCLUDED.payments_left,
                finance_due_at = EXCLUDED.finance_due_at,
                impounded = EXCLUDED.impounded,
                impounded_at = EXCLUDED.impounded_at,
                impound_release_at = EXCLUDED.impound_release_at,
                last_driven_at = EXCLUDED.last_driven_at,
                updated_at = NOW()
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(&record.plate)
        .bind(&record.citizen_id)
        .bind(&record.organization_id)
        .bind(&record.model)
        .bind(&record.brand)
        .bind(&record.garage)
        .bind(record.engine_health)
        .bind(record.body_health)
        .bind(record.fuel)
        .bind(record.mileage)
        .bind(record.color.to_string())
        .bind(record.damage.to_string())
        .bind(record.mods.to_string())
        .bind(record.glovebox.to_string())
        .bind(record.trunk.to_string())
        .bind(record.last_position.to_string())
        .bind(record.balance)
        .bind(record.payment_amount)
        .bind(record.payments_left)
        .bind(record.finance_due_at)
        .bind(record.impounded)
        .bind(record.impounded_at)
        .bind(record.impound_release_at)
        .bind(record.last_driven_at)
        .fetch_one(&self.pool)
        .await?;

        let inserted: bool = row.try_get("inserted")?;
        Ok(if inserted {
            UpsertOutcome::Created
        } else {
            UpsertOutcome::Updated
        })
    }

    async fn record_sync_completed(
        &self,
        organization_id: &str,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query("UPDATE organizations SET last_synced_at = $2 WHERE id = $1")
            .bind(organization_id)
            .bind(at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn last_synced_at(
        &self,
        organization_id: &str,
    ) -> Result<Option<DateTime<Utc>>, StoreError> {
        let row = sqlx::query("SELECT last_synced_at FROM organizations WHERE id = $1")
            .bind(organization_id)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(row.try_get("last_synced_at")?),
            None => Ok(None),
        }
    }
}

/// Clock seam so cache expiry is controllable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

struct CacheEntry<V> {
    value: V,
    stored_at: DateTime<Utc>,
}

/// Short-lived cache keyed by logical path strings (for example
/// `citizens:org-1:1:20`). Expiry is evaluated on read against the injected
/// clock; invalidation is explicit, by exact key or by key prefix.
pub struct TtlCache<V> {
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CacheEntry<V>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl: chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &str) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get(key) {
            Some(entry) if now - entry.stored_at < self.ttl => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    pub fn insert(&self, key: impl Into<String>, value: V) {
        let stored_at = self.clock.now();
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.insert(key.into(), CacheEntry { value, stored_at });
    }

    pub fn invalidate(&self, key: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.remove(key);
    }

    pub fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        entries.retain(|key, _| !key.starts_with(prefix));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct ManualClock {
        now: Mutex<DateTime<Utc>>,
    }

    impl ManualClock {
        fn starting_at(now: DateTime<Utc>) -> Self {
            Self { now: Mutex::new(now) }
        }

        fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += chrono::Duration::from_std(by).unwrap();
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.now.lock().unwrap()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).single().unwrap()
    }

    #[test]
    fn cache_hits_before_expiry_and_misses_after() {
        let clock = Arc::new(ManualClock::starting_at(t0()));
        let cache: TtlCache<String> = TtlCache::new(Duration::from_secs(60), clock.clone());

        cache.insert("citizens:org-1:1:20", "page-one".to_string());
        assert_eq!(cache.get("citizens:org-1:1:20").as_deref(), Some("page-one"));

        clock.advance(Duration::from_secs(59));
        assert!(cache.get("citizens:org-1:1:20").is_some());

        clock.advance(Duration::from_secs(2));
        assert!(cache.get("citizens:org-1:1:20").is_none());
    }

    #[test]
    fn exact_invalidation_removes_one_key() {
        let clock = Arc::new(ManualClock::starting_at(t0()));
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60), clock);

        cache.insert("citizens:org-1:1:20", 1);
        cache.insert("citizens:org-1:2:20", 2);
        cache.invalidate("citizens:org-1:1:20");

        assert!(cache.get("citizens:org-1:1:20").is_none());
        assert_eq!(cache.get("citizens:org-1:2:20"), Some(2));
    }

    #[test]
    fn prefix_invalidation_clears_a_logical_path() {
        let clock = Arc::new(ManualClock::starting_at(t0()));
        let cache: TtlCache<u32> = TtlCache::new(Duration::from_secs(60), clock);

        cache.insert("citizens:org-1:1:20", 1);
        cache.insert("citizens:org-2:1:20", 2);
        cache.insert("vehicles:org-1:1:20", 3);
        cache.invalidate_prefix("citizens:");

        assert!(cache.get("citizens:org-1:1:20").is_none());
        assert!(cache.get("citizens:org-2:1:20").is_none());
        assert_eq!(cache.get("vehicles:org-1:1:20"), Some(3));
    }

    #[test]
    fn fetch_error_messages_carry_url_and_status() {
        let err = FetchError::HttpStatus {
            status: 503,
            url: "http://game.example/esx/citizens".into(),
        };
        assert_eq!(
            err.to_string(),
            "http status 503 for http://game.example/esx/citizens"
        );

        let err = FetchError::Schema {
            url: "http://game.example/vehicles/abc".into(),
            message: "expected an array".into(),
        };
        assert!(err.to_string().contains("unexpected payload shape"));
    }
}
