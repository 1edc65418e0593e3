//! Game-system payload shapes and pure normalization into canonical records.
//!
//! ESX and QBCore expose incompatible citizen payloads; vehicles share one
//! shape. Normalization is total per record: malformed sub-documents and
//! unparseable dates are logged and replaced with documented defaults, and
//! every input record yields exactly one canonical record.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use precinct_core::{CitizenRecord, GameSystem, VehicleRecord};
use precinct_store::{FetchError, GameApiClient};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use tracing::warn;

pub const CRATE_NAME: &str = "precinct-adapters";

const UNKNOWN_NAME: &str = "Unknown";

/// Substitute for missing or unparseable birthdates.
pub fn fallback_birthdate() -> NaiveDate {
    NaiveDate::from_ymd_opt(1900, 1, 1).expect("valid fallback date")
}

/// Decode a field that may arrive as a JSON-encoded string or as an
/// already-parsed value. Malformed payloads are logged with the owning record's
/// natural key and replaced with the type's default; this helper never fails.
pub fn parse_if_string<T>(value: Option<&JsonValue>, field: &str, record_key: &str) -> T
where
    T: DeserializeOwned + Default,
{
    let Some(value) = value else {
        return T::default();
    };
    if value.is_null() {
        return T::default();
    }
    let result = match value {
        JsonValue::String(raw) => serde_json::from_str(raw),
        other => serde_json::from_value(other.clone()),
    };
    match result {
        Ok(parsed) => parsed,
        Err(err) => {
            warn!(field, record = record_key, error = %err, "malformed sub-document, using default");
            T::default()
        }
    }
}

/// Like [`parse_if_string`], but substitutes `default` when the field decodes
/// to JSON null (sub-documents should stay objects/arrays, not nulls).
fn sub_document(
    value: Option<&JsonValue>,
    field: &str,
    record_key: &str,
    default: JsonValue,
) -> JsonValue {
    let parsed: JsonValue = parse_if_string(value, field, record_key);
    if parsed.is_null() {
        default
    } else {
        parsed
    }
}

/// Epoch seconds to an absolute timestamp. Zero or absent means "never", not
/// the 1970 epoch.
pub fn epoch_seconds_to_datetime(secs: Option<f64>) -> Option<DateTime<Utc>> {
    let secs = secs?;
    if secs <= 0.0 {
        return None;
    }
    DateTime::<Utc>::from_timestamp_millis((secs * 1000.0) as i64)
}

/// Birthdate strings arrive in a handful of formats depending on how the
/// character was created. Unparseable values get the sentinel, never a crash.
pub fn parse_birthdate(raw: Option<&str>, record_key: &str) -> NaiveDate {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return fallback_birthdate();
    };
    for format in ["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y"] {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return date;
        }
    }
    warn!(record = record_key, value = raw, "unparseable birthdate, using fallback");
    fallback_birthdate()
}

/// One entry of an ESX status array (`[{name, percent, val}]`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatusEffect {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub percent: f64,
}

/// Percent for a named status effect, 0 when the effect is absent.
pub fn status_percent(effects: &[StatusEffect], name: &str) -> f64 {
    effects
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
        .map(|e| e.percent)
        .unwrap_or(0.0)
}

fn coerce_gender(value: Option<&JsonValue>) -> String {
    match value {
        Some(JsonValue::String(s)) if !s.trim().is_empty() => s.trim().to_ascii_lowercase(),
        Some(JsonValue::Number(n)) => match n.as_i64() {
            Some(0) => "m".to_string(),
            Some(1) => "f".to_string(),
            _ => "unknown".to_string(),
        },
        _ => "unknown".to_string(),
    }
}

struct MetadataScalars {
    fingerprint: Option<String>,
    blood_type: Option<String>,
    dead: bool,
    handcuffed: bool,
    jail_minutes: i64,
}

fn derive_metadata_scalars(metadata: &JsonValue) -> MetadataScalars {
    let get_str = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| metadata.get(k).and_then(JsonValue::as_str))
            .map(str::to_string)
    };
    let get_bool = |keys: &[&str]| {
        keys.iter()
            .find_map(|k| metadata.get(k))
            .map(truthy)
            .unwrap_or(false)
    };
    MetadataScalars {
        fingerprint: get_str(&["fingerprint"]),
        blood_type: get_str(&["bloodtype", "blood_type"]),
        dead: get_bool(&["isdead", "dead"]),
        handcuffed: get_bool(&["ishandcuffed", "handcuffed"]),
        jail_minutes: metadata
            .get("injail")
            .and_then(JsonValue::as_f64)
            .map(|m| m as i64)
            .unwrap_or(0),
    }
}

fn truthy(value: &JsonValue) -> bool {
    match value {
        JsonValue::Bool(b) => *b,
        JsonValue::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        _ => false,
    }
}

/// Raw ESX citizen row as served by the bridge API.
#[derive(Debug, Clone, Deserialize)]
pub struct EsxCitizenPayload {
    pub identifier: String,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
    #[serde(default)]
    pub dateofbirth: Option<String>,
    #[serde(default)]
    pub sex: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
    #[serde(default)]
    pub accounts: Option<JsonValue>,
    #[serde(default)]
    pub status: Option<JsonValue>,
    #[serde(default)]
    pub job: Option<String>,
    #[serde(default)]
    pub job_grade: Option<i64>,
    #[serde(default)]
    pub position: Option<JsonValue>,
    #[serde(default)]
    pub inventory: Option<JsonValue>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
    #[serde(default)]
    pub last_update: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct EsxAccounts {
    #[serde(default)]
    money: f64,
    #[serde(default)]
    bank: f64,
    #[serde(default)]
    black_money: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct MoneyBalances {
    #[serde(default)]
    cash: f64,
    #[serde(default)]
    bank: f64,
    #[serde(default)]
    crypto: f64,
}

pub fn normalize_esx_citizen(payload: &EsxCitizenPayload, organization_id: &str) -> CitizenRecord {
    let key = payload.identifier.as_str();

    let accounts: EsxAccounts = parse_if_string(payload.accounts.as_ref(), "accounts", key);
    let money = json!({
        "cash": accounts.money,
        "bank": accounts.bank,
        "crypto": accounts.black_money,
    });

    let effects: Vec<StatusEffect> = parse_if_string(payload.status.as_ref(), "status", key);
    let mut metadata = sub_document(payload.metadata.as_ref(), "metadata", key, json!({}));
    if let Some(map) = metadata.as_object_mut() {
        map.insert("hunger".to_string(), json!(status_percent(&effects, "hunger")));
        map.insert("thirst".to_string(), json!(status_percent(&effects, "thirst")));
    }

    let first_name = payload
        .firstname
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    let last_name = payload
        .lastname
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());
    let date_of_birth = parse_birthdate(payload.dateofbirth.as_deref(), key);
    let gender = payload
        .sex
        .as_deref()
        .map(|s| s.trim().to_ascii_lowercase())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "unknown".to_string());
    let phone = payload.phone_number.clone().filter(|s| !s.trim().is_empty());

    let charinfo = json!({
        "firstname": first_name,
        "lastname": last_name,
        "birthdate": date_of_birth.to_string(),
        "gender": gender,
        "phone": phone,
    });

    let scalars = derive_metadata_scalars(&metadata);

    CitizenRecord {
        citizen_id: payload.identifier.clone(),
        organization_id: organization_id.to_string(),
        display_name: format!("{first_name} {last_name}"),
        first_name,
        last_name,
        date_of_birth,
        gender,
        phone,
        nationality: None,
        money,
        charinfo,
        job: json!({
            "name": payload.job.clone().unwrap_or_else(|| "unemployed".to_string()),
            "grade": payload.job_grade.unwrap_or(0),
        }),
        gang: json!({}),
        position: sub_document(payload.position.as_ref(), "position", key, json!({})),
        metadata,
        inventory: sub_document(payload.inventory.as_ref(), "inventory", key, json!([])),
        fingerprint: scalars.fingerprint,
        blood_type: scalars.blood_type,
        dead: scalars.dead,
        handcuffed: scalars.handcuffed,
        jail_minutes: scalars.jail_minutes,
        last_active_at: epoch_seconds_to_datetime(payload.last_update),
    }
}

/// Raw QBCore citizen row. `charinfo`, `money`, `metadata`, `job`, `gang` and
/// `position` routinely arrive as JSON-encoded strings.
#[derive(Debug, Clone, Deserialize)]
pub struct QbCitizenPayload {
    pub citizenid: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub charinfo: Option<JsonValue>,
    #[serde(default)]
    pub money: Option<JsonValue>,
    #[serde(default)]
    pub job: Option<JsonValue>,
    #[serde(default)]
    pub gang: Option<JsonValue>,
    #[serde(default)]
    pub position: Option<JsonValue>,
    #[serde(default)]
    pub metadata: Option<JsonValue>,
    #[serde(default)]
    pub inventory: Option<JsonValue>,
    #[serde(default)]
    pub last_updated: Option<f64>,
}

pub fn normalize_qbcore_citizen(payload: &QbCitizenPayload, organization_id: &str) -> CitizenRecord {
    let key = payload.citizenid.as_str();

    let charinfo = sub_document(payload.charinfo.as_ref(), "charinfo", key, json!({}));
    let first_name = charinfo
        .get("firstname")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_NAME)
        .to_string();
    let last_name = charinfo
        .get("lastname")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(UNKNOWN_NAME)
        .to_string();
    let display_name = payload
        .name
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("{first_name} {last_name}"));

    let date_of_birth = parse_birthdate(
        charinfo.get("birthdate").and_then(JsonValue::as_str),
        key,
    );
    let gender = coerce_gender(charinfo.get("gender"));
    let phone = charinfo
        .get("phone")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);
    let nationality = charinfo
        .get("nationality")
        .and_then(JsonValue::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string);

    let balances: MoneyBalances = parse_if_string(payload.money.as_ref(), "money", key);
    let money = json!({
        "cash": balances.cash,
        "bank": balances.bank,
        "crypto": balances.crypto,
    });

    let metadata = sub_document(payload.metadata.as_ref(), "metadata", key, json!({}));
    let scalars = derive_metadata_scalars(&metadata);

    CitizenRecord {
        citizen_id: payload.citizenid.clone(),
        organization_id: organization_id.to_string(),
        display_name,
        first_name,
        last_name,
        date_of_birth,
        gender,
        phone,
        nationality,
        money,
        charinfo,
        job: sub_document(payload.job.as_ref(), "job", key, json!({})),
        gang: sub_document(payload.gang.as_ref(), "gang", key, json!({})),
        position: sub_document(payload.position.as_ref(), "position", key, json!({})),
        metadata,
        inventory: sub_document(payload.inventory.as_ref(), "inventory", key, json!([])),
        fingerprint: scalars.fingerprint,
        blood_type: scalars.blood_type,
        dead: scalars.dead,
        handcuffed: scalars.handcuffed,
        jail_minutes: scalars.jail_minutes,
        last_active_at: epoch_seconds_to_datetime(payload.last_updated),
    }
}

/// Raw vehicle row; both systems serve this shape from the per-citizen
/// endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct VehiclePayload {
    pub plate: String,
    #[serde(default, alias = "owner")]
    pub citizenid: Option<String>,
    #[serde(default, alias = "model")]
    pub vehicle: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub garage: Option<String>,
    #[serde(default)]
    pub fuel: Option<f64>,
    #[serde(default)]
    pub engine: Option<f64>,
    #[serde(default)]
    pub body: Option<f64>,
    #[serde(default, alias = "drivingdistance")]
    pub mileage: Option<f64>,
    #[serde(default)]
    pub color: Option<JsonValue>,
    #[serde(default)]
    pub damage: Option<JsonValue>,
    #[serde(default)]
    pub mods: Option<JsonValue>,
    #[serde(default)]
    pub glovebox: Option<JsonValue>,
    #[serde(default)]
    pub trunk: Option<JsonValue>,
    #[serde(default, alias = "parkingspot")]
    pub last_position: Option<JsonValue>,
    #[serde(default)]
    pub balance: Option<f64>,
    #[serde(default)]
    pub paymentamount: Option<f64>,
    #[serde(default)]
    pub paymentsleft: Option<i64>,
    #[serde(default)]
    pub financetime: Option<f64>,
    #[serde(default)]
    pub impounded: Option<JsonValue>,
    #[serde(default)]
    pub impoundedtime: Option<f64>,
    #[serde(default)]
    pub impoundtime: Option<f64>,
    #[serde(default)]
    pub last_update: Option<f64>,
}

/// `owner_citizen_id` is the citizen whose endpoint returned this record; it
/// wins over any owner field embedded in the payload, which goes stale after
/// in-game transfers.
pub fn normalize_vehicle(
    payload: &VehiclePayload,
    organization_id: &str,
    owner_citizen_id: &str,
) -> VehicleRecord {
    let key = payload.plate.trim();

    VehicleRecord {
        plate: key.to_string(),
        citizen_id: owner_citizen_id.to_string(),
        organization_id: organization_id.to_string(),
        model: payload
            .vehicle
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string()),
        brand: payload.brand.clone().filter(|s| !s.trim().is_empty()),
        garage: payload.garage.clone().filter(|s| !s.trim().is_empty()),
        engine_health: payload.engine.unwrap_or(1000.0),
        body_health: payload.body.unwrap_or(1000.0),
        fuel: payload.fuel.unwrap_or(100.0),
        mileage: payload.mileage.unwrap_or(0.0),
        color: sub_document(payload.color.as_ref(), "color", key, json!({})),
        damage: sub_document(payload.damage.as_ref(), "damage", key, json!({})),
        mods: sub_document(payload.mods.as_ref(), "mods", key, json!({})),
        glovebox: sub_document(payload.glovebox.as_ref(), "glovebox", key, json!([])),
        trunk: sub_document(payload.trunk.as_ref(), "trunk", key, json!([])),
        last_position: sub_document(payload.last_position.as_ref(), "last_position", key, json!({})),
        balance: payload.balance.unwrap_or(0.0),
        payment_amount: payload.paymentamount.unwrap_or(0.0),
        payments_left: payload.paymentsleft.unwrap_or(0),
        finance_due_at: epoch_seconds_to_datetime(payload.financetime),
        impounded: payload.impounded.as_ref().map(truthy).unwrap_or(false),
        impounded_at: epoch_seconds_to_datetime(payload.impoundedtime),
        impound_release_at: epoch_seconds_to_datetime(payload.impoundtime),
        last_driven_at: epoch_seconds_to_datetime(payload.last_update),
    }
}

/// Per-system seam: endpoint layout plus fetch-and-normalize. The vehicle side
/// is shared by both systems.
#[async_trait]
pub trait SystemAdapter: Send + Sync {
    fn system(&self) -> GameSystem;

    fn citizens_url(&self, base_url: &str) -> String;

    fn vehicles_url(&self, base_url: &str, citizen_id: &str) -> String {
        format!("{}/vehicles/{}", base_url.trim_end_matches('/'), citizen_id)
    }

    async fn fetch_citizens(
        &self,
        client: &GameApiClient,
        base_url: &str,
        organization_id: &str,
    ) -> Result<Vec<CitizenRecord>, FetchError>;

    async fn fetch_vehicles(
        &self,
        client: &GameApiClient,
        base_url: &str,
        organization_id: &str,
        citizen_id: &str,
    ) -> Result<Vec<VehicleRecord>, FetchError> {
        let url = self.vehicles_url(base_url, citizen_id);
        let payloads: Vec<VehiclePayload> = client.get_json(&url).await?;
        Ok(payloads
            .iter()
            .map(|p| normalize_vehicle(p, organization_id, citizen_id))
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct EsxAdapter;

#[async_trait]
impl SystemAdapter for EsxAdapter {
    fn system(&self) -> GameSystem {
        GameSystem::Esx
    }

    fn citizens_url(&self, base_url: &str) -> String {
        format!("{}/esx/citizens", base_url.trim_end_matches('/'))
    }

    async fn fetch_citizens(
        &self,
        client: &GameApiClient,
        base_url: &str,
        organization_id: &str,
    ) -> Result<Vec<CitizenRecord>, FetchError> {
        let url = self.citizens_url(base_url);
        let payloads: Vec<EsxCitizenPayload> = client.get_json(&url).await?;
        Ok(payloads
            .iter()
            .map(|p| normalize_esx_citizen(p, organization_id))
            .collect())
    }
}

#[derive(Debug, Clone, Copy)]
pub struct QbcoreAdapter;

#[async_trait]
impl SystemAdapter for QbcoreAdapter {
    fn system(&self) -> GameSystem {
        GameSystem::Qbcore
    }

    fn citizens_url(&self, base_url: &str) -> String {
        format!("{}/qbcore/citizens", base_url.trim_end_matches('/'))
    }

    async fn fetch_citizens(
        &self,
        client: &GameApiClient,
        base_url: &str,
        organization_id: &str,
    ) -> Result<Vec<CitizenRecord>, FetchError> {
        let url = self.citizens_url(base_url);
        let payloads: Vec<QbCitizenPayload> = client.get_json(&url).await?;
        Ok(payloads
            .iter()
            .map(|p| normalize_qbcore_citizen(p, organization_id))
            .collect())
    }
}

pub fn adapter_for_system(system: GameSystem) -> &'static dyn SystemAdapter {
    match system {
        GameSystem::Esx => &EsxAdapter,
        GameSystem::Qbcore => &QbcoreAdapter,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn esx_payload(value: serde_json::Value) -> EsxCitizenPayload {
        serde_json::from_value(value).unwrap()
    }

    fn qb_payload(value: serde_json::Value) -> QbCitizenPayload {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn esx_accounts_string_maps_to_canonical_money() {
        let payload = esx_payload(json!({
            "identifier": "steam:110000112345678",
            "firstname": "Avery",
            "lastname": "Reyes",
            "dateofbirth": "1991-04-02",
            "sex": "f",
            "accounts": "{\"money\":100,\"bank\":200,\"black_money\":0}",
            "status": "[{\"name\":\"hunger\",\"percent\":80,\"val\":80}]",
        }));

        let record = normalize_esx_citizen(&payload, "org-1");
        assert_eq!(record.money["cash"], 100.0);
        assert_eq!(record.money["bank"], 200.0);
        assert_eq!(record.money["crypto"], 0.0);
        assert_eq!(record.metadata["hunger"], 80.0);
        assert_eq!(record.metadata["thirst"], 0.0);
        assert_eq!(record.display_name, "Avery Reyes");
        assert_eq!(record.organization_id, "org-1");
    }

    #[test]
    fn missing_status_effect_defaults_to_zero() {
        let effects: Vec<StatusEffect> =
            serde_json::from_value(json!([{"name": "thirst", "percent": 55.0}])).unwrap();
        assert_eq!(status_percent(&effects, "hunger"), 0.0);
        assert_eq!(status_percent(&effects, "thirst"), 55.0);
    }

    #[test]
    fn malformed_accounts_fall_back_to_defaults() {
        let payload = esx_payload(json!({
            "identifier": "steam:1",
            "accounts": "{not json at all",
        }));
        let record = normalize_esx_citizen(&payload, "org-1");
        assert_eq!(record.money["cash"], 0.0);
        assert_eq!(record.money["bank"], 0.0);
        assert_eq!(record.first_name, "Unknown");
        assert_eq!(record.last_name, "Unknown");
    }

    #[test]
    fn invalid_birthdate_uses_sentinel_instead_of_failing() {
        let payload = esx_payload(json!({
            "identifier": "steam:2",
            "dateofbirth": "not-a-date",
        }));
        let record = normalize_esx_citizen(&payload, "org-1");
        assert_eq!(record.date_of_birth, fallback_birthdate());
    }

    #[test]
    fn epoch_seconds_zero_or_absent_is_none() {
        assert_eq!(epoch_seconds_to_datetime(None), None);
        assert_eq!(epoch_seconds_to_datetime(Some(0.0)), None);
        let ts = epoch_seconds_to_datetime(Some(1_700_000_000.0)).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn qbcore_charinfo_string_is_parsed() {
        let payload = qb_payload(json!({
            "citizenid": "QBX1234",
            "charinfo": "{\"firstname\":\"Jordan\",\"lastname\":\"Vale\",\"birthdate\":\"1988-12-24\",\"gender\":0,\"phone\":\"555-0147\",\"nationality\":\"American\"}",
            "money": {"cash": 42.5, "bank": 1000},
            "metadata": "{\"fingerprint\":\"fp-77\",\"bloodtype\":\"O+\",\"isdead\":false,\"ishandcuffed\":true,\"injail\":15,\"hunger\":64}",
        }));

        let record = normalize_qbcore_citizen(&payload, "org-9");
        assert_eq!(record.first_name, "Jordan");
        assert_eq!(record.last_name, "Vale");
        assert_eq!(record.display_name, "Jordan Vale");
        assert_eq!(record.gender, "m");
        assert_eq!(record.phone.as_deref(), Some("555-0147"));
        assert_eq!(record.nationality.as_deref(), Some("American"));
        assert_eq!(record.money["cash"], 42.5);
        assert_eq!(record.money["crypto"], 0.0);
        assert_eq!(record.fingerprint.as_deref(), Some("fp-77"));
        assert_eq!(record.blood_type.as_deref(), Some("O+"));
        assert!(!record.dead);
        assert!(record.handcuffed);
        assert_eq!(record.jail_minutes, 15);
    }

    #[test]
    fn normalization_never_drops_records() {
        let payloads: Vec<QbCitizenPayload> = serde_json::from_value(json!([
            {"citizenid": "A"},
            {"citizenid": "B", "charinfo": "broken{"},
            {"citizenid": "C", "metadata": 17},
        ]))
        .unwrap();

        let records: Vec<_> = payloads
            .iter()
            .map(|p| normalize_qbcore_citizen(p, "org-1"))
            .collect();
        assert_eq!(records.len(), payloads.len());
        assert_eq!(records[1].first_name, "Unknown");
    }

    #[test]
    fn vehicle_normalization_defaults_and_epochs() {
        let payload: VehiclePayload = serde_json::from_value(json!({
            "plate": " ABC123 ",
            "citizenid": "stale-owner",
            "vehicle": "sultan",
            "fuel": 62.0,
            "mods": "{\"engine\": 3}",
            "impounded": 1,
            "impoundedtime": 0,
            "financetime": 1_700_000_000,
        }))
        .unwrap();

        let record = normalize_vehicle(&payload, "org-1", "QBX1234");
        assert_eq!(record.plate, "ABC123");
        assert_eq!(record.citizen_id, "QBX1234");
        assert_eq!(record.model, "sultan");
        assert_eq!(record.engine_health, 1000.0);
        assert_eq!(record.body_health, 1000.0);
        assert_eq!(record.fuel, 62.0);
        assert_eq!(record.mods["engine"], 3);
        assert!(record.impounded);
        assert_eq!(record.impounded_at, None);
        assert_eq!(
            record.finance_due_at.unwrap().timestamp(),
            1_700_000_000
        );
    }

    #[test]
    fn adapters_build_system_specific_endpoints() {
        let esx = adapter_for_system(GameSystem::Esx);
        let qb = adapter_for_system(GameSystem::Qbcore);

        assert_eq!(
            esx.citizens_url("http://game.example/"),
            "http://game.example/esx/citizens"
        );
        assert_eq!(
            qb.citizens_url("http://game.example"),
            "http://game.example/qbcore/citizens"
        );
        assert_eq!(
            esx.vehicles_url("http://game.example", "steam:1"),
            "http://game.example/vehicles/steam:1"
        );
        assert_eq!(
            qb.vehicles_url("http://game.example", "QBX1"),
            "http://game.example/vehicles/QBX1"
        );
    }
}
