//! Axum JSON API for Precinct: sync triggering, sync status, and read-only
//! citizen/vehicle listings served through a short-lived cache.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path as AxumPath, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use precinct_store::{PgStore, SystemClock, TtlCache};
use precinct_sync::{CacheInvalidator, OrgRegistry, SyncService, SyncSettings};
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::error;

pub const CRATE_NAME: &str = "precinct-web";

const LISTING_CACHE_TTL: Duration = Duration::from_secs(30);
const REGISTRY_CACHE_TTL: Duration = Duration::from_secs(10);
const REGISTRY_CACHE_KEY: &str = "registry";
const DEFAULT_PER_PAGE: usize = 20;
const MAX_PER_PAGE: usize = 100;

pub struct AppState {
    settings: SyncSettings,
    listing_cache: Arc<TtlCache<JsonValue>>,
    registry_cache: Arc<TtlCache<OrgRegistry>>,
}

impl AppState {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            settings,
            listing_cache: Arc::new(TtlCache::new(LISTING_CACHE_TTL, Arc::new(SystemClock))),
            registry_cache: Arc::new(TtlCache::new(REGISTRY_CACHE_TTL, Arc::new(SystemClock))),
        }
    }
}

/// Drops cached listings once a sync run succeeds; keys are grouped under the
/// logical paths `citizens` and `vehicles`.
struct ListingCacheInvalidator {
    cache: Arc<TtlCache<JsonValue>>,
}

impl CacheInvalidator for ListingCacheInvalidator {
    fn invalidate(&self, path: &str) {
        self.cache.invalidate_prefix(path);
    }
}

#[derive(Debug, Error)]
enum ApiError {
    #[error("organization {0} not found")]
    UnknownOrganization(String),
    #[error("organization {0} is disabled")]
    DisabledOrganization(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::UnknownOrganization(_) => StatusCode::NOT_FOUND,
            Self::DisabledOrganization(_) => StatusCode::CONFLICT,
            Self::Config(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

#[derive(Debug, Deserialize, Default)]
struct PageQuery {
    page: Option<usize>,
    per_page: Option<usize>,
}

impl PageQuery {
    fn resolve(&self) -> (usize, usize) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self
            .per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE);
        (page, per_page)
    }
}

fn listing_key(entity: &str, organization_id: &str, page: usize, per_page: usize) -> String {
    format!("{entity}:{organization_id}:{page}:{per_page}")
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/organizations", get(organizations_handler))
        .route("/api/organizations/{id}/sync", post(sync_handler))
        .route("/api/organizations/{id}/sync/status", get(sync_status_handler))
        .route("/api/organizations/{id}/citizens", get(citizens_handler))
        .route("/api/organizations/{id}/vehicles", get(vehicles_handler))
        .with_state(Arc::new(state))
}

pub async fn serve_from_env() -> anyhow::Result<()> {
    let port: u16 = std::env::var("PRECINCT_WEB_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8000);
    let state = AppState::new(SyncSettings::from_env());
    let listener = TcpListener::bind(("0.0.0.0", port)).await?;
    tracing::info!(port, "web api listening");
    axum::serve(listener, app(state)).await?;
    Ok(())
}

async fn health_handler() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

async fn load_registry(state: &AppState) -> Result<OrgRegistry, ApiError> {
    if let Some(cached) = state.registry_cache.get(REGISTRY_CACHE_KEY) {
        return Ok(cached);
    }
    let registry = OrgRegistry::load(&state.settings.registry_path)
        .await
        .map_err(|err| ApiError::Config(err.to_string()))?;
    state
        .registry_cache
        .insert(REGISTRY_CACHE_KEY, registry.clone());
    Ok(registry)
}

async fn connect_store(state: &AppState) -> Result<PgStore, ApiError> {
    PgStore::connect(&state.settings.database_url)
        .await
        .map_err(|err| {
            error!(error = %err, "database connection failed");
            ApiError::Internal("database unavailable".to_string())
        })
}

async fn organizations_handler(State(state): State<Arc<AppState>>) -> Response {
    match load_registry(&state).await {
        Ok(registry) => Json(json!({ "organizations": registry.organizations })).into_response(),
        Err(err) => err.into_response(),
    }
}

async fn sync_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let registry = match load_registry(&state).await {
        Ok(registry) => registry,
        Err(err) => return err.into_response(),
    };
    let Some(entry) = registry.find(&id) else {
        return ApiError::UnknownOrganization(id).into_response();
    };
    if !entry.enabled {
        return ApiError::DisabledOrganization(id).into_response();
    }

    let store = match connect_store(&state).await {
        Ok(store) => store,
        Err(err) => return err.into_response(),
    };
    let service = match SyncService::new(state.settings.clone(), Arc::new(store)) {
        Ok(service) => service.with_invalidator(Arc::new(ListingCacheInvalidator {
            cache: state.listing_cache.clone(),
        })),
        Err(err) => return ApiError::Internal(err.to_string()).into_response(),
    };

    let result = service.sync_organization(&entry.to_config()).await;
    let status = if result.is_error() {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    };
    (status, Json(result)).into_response()
}

async fn sync_status_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
) -> Response {
    let store = match connect_store(&state).await {
        Ok(store) => store,
        Err(err) => return err.into_response(),
    };
    match precinct_store::CommunityStore::last_synced_at(&store, &id).await {
        Ok(last_synced_at) => Json(json!({
            "organization_id": id,
            "last_synced_at": last_synced_at,
        }))
        .into_response(),
        Err(err) => ApiError::Internal(err.to_string()).into_response(),
    }
}

async fn citizens_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let (page, per_page) = query.resolve();
    let key = listing_key("citizens", &id, page, per_page);
    if let Some(cached) = state.listing_cache.get(&key) {
        return Json(cached).into_response();
    }

    let store = match connect_store(&state).await {
        Ok(store) => store,
        Err(err) => return err.into_response(),
    };
    match store.list_citizens(&id, page, per_page).await {
        Ok(rows) => {
            let body = json!({
                "organization_id": id,
                "page": page,
                "per_page": per_page,
                "citizens": rows,
            });
            state.listing_cache.insert(key, body.clone());
            Json(body).into_response()
        }
        Err(err) => ApiError::Internal(err.to_string()).into_response(),
    }
}

async fn vehicles_handler(
    State(state): State<Arc<AppState>>,
    AxumPath(id): AxumPath<String>,
    Query(query): Query<PageQuery>,
) -> Response {
    let (page, per_page) = query.resolve();
    let key = listing_key("vehicles", &id, page, per_page);
    if let Some(cached) = state.listing_cache.get(&key) {
        return Json(cached).into_response();
    }

    let store = match connect_store(&state).await {
        Ok(store) => store,
        Err(err) => return err.into_response(),
    };
    match store.list_vehicles(&id, page, per_page).await {
        Ok(rows) => {
            let body = json!({
                "organization_id": id,
                "page": page,
                "per_page": per_page,
                "vehicles": rows,
            });
            state.listing_cache.insert(key, body.clone());
            Json(body).into_response()
        }
        Err(err) => ApiError::Internal(err.to_string()).into_response(),
    }
}
