//! REST service wiring `nova-core`'s operation surface onto
//! `axum` routes, 1:1, no extra middleware beyond tracing and CORS.

#![deny(unsafe_code)]

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use dashmap::DashMap;
use nova_adapters::{LoggingSmsSender, PgConsentRepository, ReqwestHttp, SamplePlatformFetcher};
use nova_core::consent::parse_consent_id;
use nova_core::{
    analyze_gst, analyze_upi, analyze_utility, compute_score, compute_social_score, issue_quiz,
    normalise_all, score_quiz, validate_gstin, validate_profile_urls, AaEngine, AadhaarEngine,
    ConsentRequest, ConsentStore, CoreConfig, FiFetchInput, FiRequestInput, GstFiling, Http,
    IdentityStore, PlatformFetcher, QuizQuestion, QuizResponse, ScoringInputs, SmsSender,
    UtilityBill,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Where consent artefacts are persisted: in-process for dev/test, or a
/// Postgres-backed repository in front of the `consent_log` table.
#[derive(Debug, Clone)]
pub enum ConsentStorageConfig {
    Memory,
    Postgres { database_url: String, max_connections: u32 },
}

impl Default for ConsentStorageConfig {
    fn default() -> Self {
        Self::Memory
    }
}

#[derive(Debug, Clone, Default)]
pub struct ServiceConfig {
    pub core: CoreConfig,
    pub consent_storage: ConsentStorageConfig,
}

/// The bound-together engine: one `Arc` per component, capabilities injected
/// at bootstrap, the direct structural analogue of
/// `IBankEngine`.
#[derive(Clone)]
pub struct NovaEngine {
    config: Arc<CoreConfig>,
    aadhaar: Arc<AadhaarEngine>,
    consent: Arc<ConsentStore>,
    aa: Arc<AaEngine>,
    platform_fetchers: Arc<Vec<Arc<dyn PlatformFetcher>>>,
    quiz_sessions: Arc<DashMap<Uuid, Vec<u32>>>,
}

impl NovaEngine {
    pub async fn bootstrap(config: ServiceConfig) -> Result<Self, ServiceError> {
        let core = Arc::new(config.core);
        let http: Arc<dyn Http> = Arc::new(ReqwestHttp::default());
        let sms: Option<Arc<dyn SmsSender>> = Some(Arc::new(LoggingSmsSender));

        let consent = match config.consent_storage {
            ConsentStorageConfig::Memory => Arc::new(ConsentStore::memory()),
            ConsentStorageConfig::Postgres { database_url, max_connections } => {
                match PgConsentRepository::connect(&database_url, max_connections).await {
                    Ok(repo) => Arc::new(ConsentStore::new(Arc::new(repo))),
                    Err(err) if !core.production => {
                        tracing::warn!(%err, "consent: postgres unavailable, falling back to memory store");
                        Arc::new(ConsentStore::memory())
                    }
                    Err(err) => return Err(ServiceError::Core(err)),
                }
            }
        };

        let aadhaar = Arc::new(AadhaarEngine::new(
            Arc::new(IdentityStore::new()),
            core.clone(),
            http.clone(),
            sms,
        ));
        let aa = Arc::new(AaEngine::new(core.clone(), http, consent.clone()));

        let platform_fetchers: Vec<Arc<dyn PlatformFetcher>> = vec![
            Arc::new(SamplePlatformFetcher::new("linkedin")),
            Arc::new(SamplePlatformFetcher::new("twitter")),
            Arc::new(SamplePlatformFetcher::new("instagram")),
            Arc::new(SamplePlatformFetcher::new("youtube")),
        ];

        Ok(Self {
            config: core,
            aadhaar,
            consent,
            aa,
            platform_fetchers: Arc::new(platform_fetchers),
            quiz_sessions: Arc::new(DashMap::new()),
        })
    }
}

pub fn build_router(engine: NovaEngine) -> Router {
    Router::new()
        .route("/v1/health", get(health))
        .route("/v1/aadhaar/initiate", post(aadhaar_initiate))
        .route("/v1/aadhaar/verify", post(aadhaar_verify))
        .route("/v1/consent", post(consent_create))
        .route("/v1/consent/:consent_id", get(consent_get))
        .route("/v1/consent/:consent_id/revoke", post(consent_revoke))
        .route("/v1/consent/user/:user_reference_id", get(consent_list_by_user))
        .route("/v1/fi/request", post(fi_request))
        .route("/v1/fi/fetch", post(fi_fetch))
        .route("/v1/upi/analyse", post(upi_analyse))
        .route("/v1/gst/fetch", post(gst_fetch))
        .route("/v1/utility/fetch", post(utility_fetch))
        .route("/v1/behaviour/questions", get(behaviour_questions))
        .route("/v1/behaviour/submit", post(behaviour_submit))
        .route("/v1/social/connect", post(social_connect))
        .route("/v1/score", post(score_compute))
        .layer(tower_http::cors::CorsLayer::permissive())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(engine)
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Core(#[from] nova_core::NovaError),
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] nova_core::NovaError),
}

/// Error-kind to status-code mapping.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let ApiError::Core(err) = self;
        let status = match &err {
            nova_core::NovaError::Validation { .. } => StatusCode::BAD_REQUEST,
            nova_core::NovaError::NotFound(_) => StatusCode::NOT_FOUND,
            nova_core::NovaError::Conflict(_) => StatusCode::CONFLICT,
            nova_core::NovaError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            nova_core::NovaError::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            nova_core::NovaError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            nova_core::NovaError::DecryptionFailure(_) => StatusCode::UNPROCESSABLE_ENTITY,
            nova_core::NovaError::KeyUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            nova_core::NovaError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(json!({
            "error": err.to_string(),
            "code": err.code(),
        }));
        (status, body).into_response()
    }
}

#[derive(Debug, Clone, Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    production: bool,
}

async fn health(State(engine): State<NovaEngine>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        service: "nova-service",
        production: engine.config.production,
    })
}

#[derive(Debug, Deserialize)]
struct AadhaarInitiateRequest {
    aadhaar: String,
    demo_phone: Option<String>,
}

#[derive(Debug, Serialize)]
struct AadhaarInitiateResponse {
    txn_id: Uuid,
    degraded: bool,
}

async fn aadhaar_initiate(
    State(engine): State<NovaEngine>,
    Json(request): Json<AadhaarInitiateRequest>,
) -> Result<Json<AadhaarInitiateResponse>, ApiError> {
    let result = engine
        .aadhaar
        .initiate(&request.aadhaar, request.demo_phone.as_deref())
        .await?;
    Ok(Json(AadhaarInitiateResponse { txn_id: result.txn_id, degraded: result.degraded }))
}

#[derive(Debug, Deserialize)]
struct AadhaarVerifyRequest {
    aadhaar: String,
    otp: String,
    txn_id: Uuid,
}

async fn aadhaar_verify(
    State(engine): State<NovaEngine>,
    Json(request): Json<AadhaarVerifyRequest>,
) -> Result<Json<nova_core::VerifyResult>, ApiError> {
    let result = engine.aadhaar.verify(&request.aadhaar, &request.otp, request.txn_id).await?;
    Ok(Json(result))
}

async fn consent_create(
    State(engine): State<NovaEngine>,
    Json(request): Json<ConsentRequest>,
) -> Result<Json<nova_core::ConsentArtefact>, ApiError> {
    let artefact = engine.consent.create(request).await?;
    Ok(Json(artefact))
}

async fn consent_get(
    State(engine): State<NovaEngine>,
    Path(consent_id): Path<String>,
) -> Result<Json<nova_core::ConsentArtefact>, ApiError> {
    let id = parse_consent_id(&consent_id)?;
    let artefact = engine.consent.get(id).await?;
    Ok(Json(artefact))
}

async fn consent_revoke(
    State(engine): State<NovaEngine>,
    Path(consent_id): Path<String>,
) -> Result<Json<nova_core::ConsentArtefact>, ApiError> {
    let id = parse_consent_id(&consent_id)?;
    let artefact = engine.consent.revoke(id).await?;
    Ok(Json(artefact))
}

#[derive(Debug, Serialize)]
struct ConsentListResponse {
    items: Vec<nova_core::ConsentArtefact>,
}

async fn consent_list_by_user(
    State(engine): State<NovaEngine>,
    Path(user_reference_id): Path<String>,
) -> Result<Json<ConsentListResponse>, ApiError> {
    let items = engine.consent.list_by_user(&user_reference_id).await?;
    Ok(Json(ConsentListResponse { items }))
}

async fn fi_request(
    State(engine): State<NovaEngine>,
    Json(request): Json<FiRequestInput>,
) -> Result<Json<nova_core::FiRequestResult>, ApiError> {
    let result = engine.aa.request(request).await?;
    Ok(Json(result))
}

async fn fi_fetch(
    State(engine): State<NovaEngine>,
    Json(request): Json<FiFetchInput>,
) -> Result<Json<nova_core::FiFetchResult>, ApiError> {
    let result = engine.aa.fetch(request).await?;
    Ok(Json(result))
}

/// `transactions` accepts any of the five shapes `nova_core::normalise_all`
/// tolerates, including a raw FI-fetch `fi_plaintext` payload.
#[derive(Debug, Deserialize)]
struct UpiAnalyseRequest {
    transactions: Value,
}

async fn upi_analyse(
    State(_engine): State<NovaEngine>,
    Json(request): Json<UpiAnalyseRequest>,
) -> Result<Json<nova_core::UpiAnalytics>, ApiError> {
    let transactions = normalise_all(&request.transactions)?;
    Ok(Json(analyze_upi(&transactions)))
}

/// `gst.fetch` in this deployment takes the filing history directly rather
/// than re-fetching from a GSP the service has no adapter for (see
/// DESIGN.md).
#[derive(Debug, Deserialize)]
struct GstFetchRequest {
    gstin: String,
    filings: Vec<GstFiling>,
}

async fn gst_fetch(
    State(_engine): State<NovaEngine>,
    Json(request): Json<GstFetchRequest>,
) -> Result<Json<nova_core::ComplianceReport>, ApiError> {
    validate_gstin(&request.gstin)?;
    Ok(Json(analyze_gst(&request.filings)))
}

#[derive(Debug, Deserialize)]
struct UtilityFetchRequest {
    bills: Vec<UtilityBill>,
}

async fn utility_fetch(
    State(_engine): State<NovaEngine>,
    Json(request): Json<UtilityFetchRequest>,
) -> Result<Json<nova_core::ReliabilityReport>, ApiError> {
    Ok(Json(analyze_utility(&request.bills)))
}

#[derive(Debug, Serialize)]
struct IssuedQuizResponse {
    quiz_id: Uuid,
    questions: Vec<QuizQuestion>,
}

async fn behaviour_questions(State(engine): State<NovaEngine>) -> Json<IssuedQuizResponse> {
    let issued = issue_quiz();
    let quiz_id = Uuid::new_v4();
    engine.quiz_sessions.insert(quiz_id, issued.ids);
    Json(IssuedQuizResponse { quiz_id, questions: issued.questions })
}

#[derive(Debug, Deserialize)]
struct BehaviourSubmitRequest {
    quiz_id: Uuid,
    responses: Vec<QuizResponse>,
}

async fn behaviour_submit(
    State(engine): State<NovaEngine>,
    Json(request): Json<BehaviourSubmitRequest>,
) -> Result<Json<nova_core::ScoredQuiz>, ApiError> {
    let (_, issued_ids) = engine
        .quiz_sessions
        .remove(&request.quiz_id)
        .ok_or_else(|| nova_core::NovaError::not_found("no quiz issued with that quiz_id"))?;
    let scored = score_quiz(&issued_ids, &request.responses)?;
    Ok(Json(scored))
}

#[derive(Debug, Deserialize)]
struct SocialConnectRequest {
    profile_urls: Vec<String>,
}

async fn social_connect(
    State(engine): State<NovaEngine>,
    Json(request): Json<SocialConnectRequest>,
) -> Result<Json<nova_core::SocialScoreResult>, ApiError> {
    let profiles = validate_profile_urls(&request.profile_urls)?;
    let result = compute_social_score(&profiles, &engine.platform_fetchers).await?;
    Ok(Json(result))
}

#[derive(Debug, Deserialize, Default)]
struct ScoreRequest {
    transactions: Option<Value>,
    network_strength: Option<f64>,
    turnover_variance_pct: Option<f64>,
}

async fn score_compute(
    State(_engine): State<NovaEngine>,
    Json(request): Json<ScoreRequest>,
) -> Result<Json<nova_core::NovaScoreResult>, ApiError> {
    let upi = match request.transactions {
        Some(value) => Some(analyze_upi(&normalise_all(&value)?)),
        None => None,
    };
    let inputs = ScoringInputs {
        upi,
        network_strength: request.network_strength,
        turnover_variance_pct: request.turnover_variance_pct,
    };
    Ok(Json(compute_score(&inputs)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use tower::ServiceExt;

    async fn engine() -> NovaEngine {
        NovaEngine::bootstrap(ServiceConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn health_endpoint_reports_ok() {
        let app = build_router(engine().await);
        let response = app
            .oneshot(Request::builder().uri("/v1/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn aadhaar_initiate_then_verify_round_trips_in_degraded_mode() {
        let app = build_router(engine().await);
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/aadhaar/initiate")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "aadhaar": "123456789012" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let txn_id = body.get("txn_id").and_then(|v| v.as_str()).unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/aadhaar/verify")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        json!({ "aadhaar": "123456789012", "otp": "123456", "txn_id": txn_id }).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn consent_create_then_revoke_then_conflict_maps_to_409() {
        let app = build_router(engine().await);
        let payload = json!({
            "user_reference_id": "u1",
            "fi_types": ["DEPOSIT"],
            "data_range": { "from": "2025-01-01T00:00:00Z", "to": "2026-01-01T00:00:00Z" },
            "data_life": { "unit": "MONTH", "value": 6 },
        });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/consent")
                    .header("content-type", "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        let consent_id = body.get("consent_id").and_then(|v| v.as_str()).unwrap().to_string();

        let revoke_uri = format!("/v1/consent/{consent_id}/revoke");
        let response = app
            .clone()
            .oneshot(Request::builder().method("POST").uri(revoke_uri.clone()).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().method("POST").uri(revoke_uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn behaviour_quiz_round_trips_through_the_session_map() {
        let app = build_router(engine().await);
        let response = app
            .clone()
            .oneshot(Request::builder().uri("/v1/behaviour/questions").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let issued: Value = serde_json::from_slice(&bytes).unwrap();
        let quiz_id = issued.get("quiz_id").cloned().unwrap();
        let responses: Vec<Value> = issued["questions"]
            .as_array()
            .unwrap()
            .iter()
            .map(|q| json!({ "id": q["id"], "choice": "Often" }))
            .collect();

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/behaviour/submit")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "quiz_id": quiz_id, "responses": responses }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn upi_analyse_rejects_unrecognised_shape_with_400() {
        let app = build_router(engine().await);
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/v1/upi/analyse")
                    .header("content-type", "application/json")
                    .body(Body::from(json!({ "transactions": "not an object" }).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
