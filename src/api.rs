use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{FromRequestParts, Query, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Redirect, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::auth::{self, AuthError, DynAuthProvider, SessionUser};
use crate::config::AppConfig;
use crate::ingest::{self, types::IngestReport};
use crate::leads::{DraftLeads, DynLeadsClient, LeadsError, LeadsRequest, DEFAULT_ARTICLE_TYPE};
use crate::news::EventType;
use crate::settings::{SettingsError, SettingsPatch, SettingsStore, UserSettings};
use crate::store::{NewsStore, PolicyFilterOptions, PolicyNewsQuery, StoreError, UnionNewsQuery};
use crate::topics::{generate_topics_at, Topic};

const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;
const MAX_DAYS: i64 = 365;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn NewsStore>,
    pub auth: DynAuthProvider,
    pub leads: DynLeadsClient,
    pub settings: Arc<SettingsStore>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn NewsStore>,
        auth: DynAuthProvider,
        leads: DynLeadsClient,
    ) -> Self {
        Self {
            store,
            auth,
            leads,
            settings: Arc::new(SettingsStore::new()),
            config: Arc::new(config),
        }
    }
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/topics", get(topics))
        .route("/api/union-news", get(union_news))
        .route("/api/union-news/webhook", post(union_webhook))
        .route("/api/policy-news", get(policy_news))
        .route("/api/policy-news/filters", get(policy_filters))
        .route("/api/policy-news/webhook", post(policy_webhook))
        .route("/api/generate-leads", post(generate_leads))
        .route("/api/settings", get(get_settings).put(put_settings))
        .route("/auth/callback", get(auth_callback))
        .route("/auth/login", post(login))
        .route("/auth/magic-link", post(magic_link))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

// ------------------------------------------------------------
// Errors
// ------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        error!(error = %e, "store failure");
        ApiError::Internal(e.to_string())
    }
}

impl From<LeadsError> for ApiError {
    fn from(e: LeadsError) -> Self {
        ApiError::Internal(e.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::InvalidCredentials | AuthError::InvalidCode | AuthError::InvalidToken => {
                ApiError::Unauthorized
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

type ApiResult<T> = Result<T, ApiError>;

// ------------------------------------------------------------
// Session extraction
// ------------------------------------------------------------

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Signed-in dashboard user resolved from `Authorization: Bearer <session token>`.
pub struct CurrentUser(pub SessionUser);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer(&parts.headers).ok_or(ApiError::Unauthorized)?;
        let user = state.auth.user_for_token(token).await?;
        Ok(CurrentUser(user))
    }
}

// ------------------------------------------------------------
// Paging helpers
// ------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct Paged<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}

fn paginate<T>(all: Vec<T>, page: Option<usize>, page_size: Option<usize>) -> Paged<T> {
    let page_size = page_size.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    let page = page.unwrap_or(1).max(1);
    let total = all.len();
    let total_pages = total.div_ceil(page_size);
    let items = all
        .into_iter()
        .skip((page - 1) * page_size)
        .take(page_size)
        .collect();
    Paged {
        items,
        total,
        page,
        page_size,
        total_pages,
    }
}

fn window_days(days: Option<i64>, cfg: &AppConfig) -> i64 {
    days.unwrap_or(cfg.topics.window_days).clamp(1, MAX_DAYS)
}

fn window_start(now: DateTime<Utc>, days: i64) -> DateTime<Utc> {
    now - Duration::days(days)
}

fn non_blank(v: Option<String>) -> Option<String> {
    v.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

// ------------------------------------------------------------
// Dashboard
// ------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct TopicsParams {
    days: Option<i64>,
}

#[derive(Debug, Serialize)]
struct TopicsResp {
    topics: Vec<Topic>,
    union_count: usize,
    policy_count: usize,
    window_days: i64,
    generated_at: DateTime<Utc>,
}

async fn topics(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Query(p): Query<TopicsParams>,
) -> ApiResult<Json<TopicsResp>> {
    let days = window_days(p.days, &state.config);
    let now = Utc::now();
    let since = window_start(now, days);

    let union = state
        .store
        .union_news(&UnionNewsQuery {
            since: Some(since.date_naive()),
            ..Default::default()
        })
        .await?;
    let policy = state
        .store
        .policy_news(&PolicyNewsQuery {
            since: Some(since),
            ..Default::default()
        })
        .await?;

    let topics = generate_topics_at(&union, &policy, now, &state.config.topics.topic_config());
    counter!("topics_generated_total").increment(1);

    Ok(Json(TopicsResp {
        topics,
        union_count: union.len(),
        policy_count: policy.len(),
        window_days: days,
        generated_at: now,
    }))
}

#[derive(Debug, Default, Deserialize)]
struct UnionListParams {
    days: Option<i64>,
    region_si: Option<String>,
    region_gu: Option<String>,
    event_type: Option<String>,
    q: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

async fn union_news(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Query(p): Query<UnionListParams>,
) -> ApiResult<Json<Paged<crate::news::UnionBulletin>>> {
    let event_type = match non_blank(p.event_type) {
        Some(label) => Some(
            EventType::parse(&label)
                .ok_or_else(|| ApiError::BadRequest(format!("unknown event_type: {label}")))?,
        ),
        None => None,
    };
    let days = window_days(p.days, &state.config);
    let query = UnionNewsQuery {
        since: Some(window_start(Utc::now(), days).date_naive()),
        region_si: non_blank(p.region_si),
        region_gu: non_blank(p.region_gu),
        event_type,
        search: non_blank(p.q),
    };
    let rows = state.store.union_news(&query).await?;
    Ok(Json(paginate(rows, p.page, p.page_size)))
}

#[derive(Debug, Default, Deserialize)]
struct PolicyListParams {
    days: Option<i64>,
    region_si: Option<String>,
    region_gu: Option<String>,
    policy_type: Option<String>,
    agency_name: Option<String>,
    q: Option<String>,
    page: Option<usize>,
    page_size: Option<usize>,
}

async fn policy_news(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Query(p): Query<PolicyListParams>,
) -> ApiResult<Json<Paged<crate::news::PolicyBulletin>>> {
    let days = window_days(p.days, &state.config);
    let query = PolicyNewsQuery {
        since: Some(window_start(Utc::now(), days)),
        region_si: non_blank(p.region_si),
        region_gu: non_blank(p.region_gu),
        policy_type: non_blank(p.policy_type),
        agency_name: non_blank(p.agency_name),
        search: non_blank(p.q),
    };
    let rows = state.store.policy_news(&query).await?;
    Ok(Json(paginate(rows, p.page, p.page_size)))
}

#[derive(Debug, Default, Deserialize)]
struct FilterParams {
    days: Option<i64>,
    region_si: Option<String>,
}

async fn policy_filters(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Query(p): Query<FilterParams>,
) -> ApiResult<Json<PolicyFilterOptions>> {
    let days = window_days(p.days, &state.config);
    let region = non_blank(p.region_si);
    let opts = state
        .store
        .policy_filter_options(Some(window_start(Utc::now(), days)), region.as_deref())
        .await?;
    Ok(Json(opts))
}

// ------------------------------------------------------------
// Ingestion webhooks
// ------------------------------------------------------------

#[derive(Debug, Serialize)]
struct WebhookResp {
    success: bool,
    message: String,
    results: IngestReport,
}

fn check_webhook_key(headers: &HeaderMap, cfg: &AppConfig) -> ApiResult<()> {
    match cfg.server.webhook_api_key.as_deref() {
        Some(key) if bearer(headers) != Some(key) => {
            warn!(target: "ingest", "webhook call with missing or wrong key");
            Err(ApiError::Unauthorized)
        }
        _ => Ok(()),
    }
}

/// Signed-in caller of a webhook, used as the last owner fallback. A bearer equal to
/// the webhook key is never a session.
async fn session_owner(state: &AppState, headers: &HeaderMap) -> Option<String> {
    let token = bearer(headers)?;
    if state.config.server.webhook_api_key.as_deref() == Some(token) {
        return None;
    }
    state.auth.user_for_token(token).await.ok().map(|u| u.id)
}

/// Parse `{ items: [...], default_user_id? }`; anything else is a 400.
fn parse_webhook_body(body: &Bytes) -> ApiResult<(Vec<Value>, Option<String>)> {
    let v: Value = serde_json::from_slice(body)
        .map_err(|e| ApiError::BadRequest(format!("invalid JSON body: {e}")))?;
    let items = match v.get("items") {
        Some(Value::Array(items)) if !items.is_empty() => items.clone(),
        _ => return Err(ApiError::BadRequest("items must be a non-empty array".into())),
    };
    let default_user_id = v
        .get("default_user_id")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    Ok((items, default_user_id))
}

fn webhook_reply(report: IngestReport) -> Json<WebhookResp> {
    Json(WebhookResp {
        success: true,
        message: report.message(),
        results: report,
    })
}

async fn union_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResp>> {
    check_webhook_key(&headers, &state.config)?;
    let (items, default_user_id) = parse_webhook_body(&body)?;
    let owner = match default_user_id {
        Some(id) => Some(id),
        None => session_owner(&state, &headers).await,
    };
    let report = ingest::ingest_union_batch(state.store.as_ref(), &items, owner.as_deref()).await;
    info!(target: "ingest", kind = "union", message = %report.message(), "webhook batch done");
    Ok(webhook_reply(report))
}

async fn policy_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResp>> {
    check_webhook_key(&headers, &state.config)?;
    let (items, _) = parse_webhook_body(&body)?;
    let report = ingest::ingest_policy_batch(state.store.as_ref(), &items).await;
    info!(target: "ingest", kind = "policy", message = %report.message(), "webhook batch done");
    Ok(webhook_reply(report))
}

// ------------------------------------------------------------
// Lead generation
// ------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LeadsBody {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    article_type: Option<String>,
}

#[derive(Debug, Serialize)]
struct LeadsResp {
    success: bool,
    #[serde(flatten)]
    draft: DraftLeads,
}

async fn generate_leads(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(body): Json<LeadsBody>,
) -> ApiResult<Json<LeadsResp>> {
    let topic = non_blank(body.topic).ok_or_else(|| ApiError::BadRequest("topic is required".into()))?;
    let req = LeadsRequest {
        topic,
        article_type: non_blank(body.article_type).unwrap_or_else(|| DEFAULT_ARTICLE_TYPE.to_string()),
        user_id: user.id,
        user_email: user.email,
    };

    match state.leads.generate(&req).await {
        Ok(draft) => {
            counter!("leads_requests_total", "outcome" => "ok").increment(1);
            Ok(Json(LeadsResp {
                success: true,
                draft,
            }))
        }
        Err(e) => {
            counter!("leads_requests_total", "outcome" => "error").increment(1);
            error!(target: "leads", provider = state.leads.provider_name(), error = %e, "lead generation failed");
            Err(e.into())
        }
    }
}

// ------------------------------------------------------------
// Auth
// ------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    next: Option<String>,
}

fn request_base(headers: &HeaderMap, cfg: &AppConfig) -> String {
    let host = headers.get(header::HOST).and_then(|h| h.to_str().ok());
    auth::base_url(cfg.server.site_url.as_deref(), host)
}

async fn auth_callback(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(p): Query<CallbackParams>,
) -> Redirect {
    let base = request_base(&headers, &state.config);
    let Some(code) = non_blank(p.code) else {
        return Redirect::to(&format!("{base}{}", auth::LOGIN_PATH));
    };
    match state.auth.exchange_code(&code).await {
        Ok(_session) => {
            info!(target: "auth", "code exchanged");
            Redirect::to(&format!("{base}{}", auth::safe_next(p.next.as_deref())))
        }
        Err(e) => {
            warn!(target: "auth", error = %e, "code exchange failed");
            Redirect::to(&format!("{base}{}", auth::LOGIN_PATH))
        }
    }
}

#[derive(Debug, Deserialize)]
struct LoginBody {
    email: String,
    password: String,
}

async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginBody>,
) -> ApiResult<Json<auth::Session>> {
    let session = state
        .auth
        .sign_in_with_password(body.email.trim(), &body.password)
        .await?;
    Ok(Json(session))
}

#[derive(Debug, Deserialize)]
struct MagicLinkBody {
    email: String,
}

async fn magic_link(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<MagicLinkBody>,
) -> ApiResult<Json<Value>> {
    let email = body.email.trim();
    if email.is_empty() || !email.contains('@') {
        return Err(ApiError::BadRequest("a valid email is required".into()));
    }
    let redirect_to = format!(
        "{}{}?next={}",
        request_base(&headers, &state.config),
        auth::CALLBACK_PATH,
        auth::DEFAULT_NEXT
    );
    state.auth.send_magic_link(email, &redirect_to).await?;
    Ok(Json(json!({ "success": true })))
}

// ------------------------------------------------------------
// Settings
// ------------------------------------------------------------

async fn get_settings(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Json<UserSettings> {
    Json(state.settings.get(&user.id))
}

async fn put_settings(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<Json<UserSettings>> {
    Ok(Json(state.settings.update(&user.id, patch)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_clamps_page_and_size() {
        let p = paginate((0..25).collect::<Vec<_>>(), Some(3), None);
        assert_eq!(p.items, vec![20, 21, 22, 23, 24]);
        assert_eq!(p.total_pages, 3);

        let p = paginate(vec![1, 2], Some(0), Some(0));
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, 1);
        assert_eq!(p.items, vec![1]);

        let empty = paginate(Vec::<u8>::new(), None, None);
        assert_eq!(empty.total_pages, 0);
        assert!(empty.items.is_empty());
    }

    #[test]
    fn webhook_body_requires_items_array() {
        assert!(parse_webhook_body(&Bytes::from_static(b"{}")).is_err());
        assert!(parse_webhook_body(&Bytes::from_static(b"{\"items\": []}")).is_err());
        assert!(parse_webhook_body(&Bytes::from_static(b"{\"items\": {}}")).is_err());
        assert!(parse_webhook_body(&Bytes::from_static(b"not json")).is_err());
        let (items, owner) =
            parse_webhook_body(&Bytes::from_static(b"{\"items\": [{}], \"default_user_id\": \" u1 \"}"))
                .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(owner.as_deref(), Some("u1"));
    }

    #[test]
    fn days_are_clamped() {
        let cfg = AppConfig::default();
        assert_eq!(window_days(None, &cfg), 14);
        assert_eq!(window_days(Some(0), &cfg), 1);
        assert_eq!(window_days(Some(10_000), &cfg), 365);
    }
}
