use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use crate::diagnostics::Diagnosis;
use crate::domain::campaign::{Campaign, EligibilitySnapshot, NewCampaign};
use crate::domain::identity::parse_identity_list;
use crate::error::EligibilityError;
use crate::ports::MintRequest;
use crate::ports::mint_gate::MintGate;
use crate::ports::store::CampaignStore;
use crate::registry::ConsistencyReport;
use crate::sync::{ChainStatus, PushOutcome, RootSync};

/// Shared application state for axum route handlers.
pub struct AppState<S: CampaignStore, G: MintGate> {
    pub sync: Arc<RootSync<S, G>>,
}

impl<S: CampaignStore, G: MintGate> Clone for AppState<S, G> {
    fn clone(&self) -> Self {
        Self {
            sync: self.sync.clone(),
        }
    }
}

// ── Request types ──

/// Identities as a JSON array, a raw newline/comma separated list, or both.
#[derive(Debug, Default, Deserialize)]
pub struct IdentitiesRequest {
    #[serde(default)]
    pub identities: Vec<String>,
    #[serde(default)]
    pub list: Option<String>,
}

impl IdentitiesRequest {
    fn into_raw(self) -> Result<Vec<String>, AppError> {
        let mut raw = self.identities;
        if let Some(list) = self.list {
            let parsed = parse_identity_list(&list).map_err(EligibilityError::from)?;
            raw.extend(parsed.into_iter().map(|i| i.as_str().to_string()));
        }
        Ok(raw)
    }
}

/// Body for POST /campaigns.
#[derive(Debug, Deserialize)]
pub struct CreateCampaignRequest {
    #[serde(flatten)]
    pub campaign: NewCampaign,
    #[serde(flatten)]
    pub seed: IdentitiesRequest,
}

// ── Route handlers ──

/// GET /campaigns
pub async fn list_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
) -> Result<Json<Vec<String>>, AppError> {
    let ids = state
        .sync
        .registry()
        .store()
        .list()
        .await
        .map_err(EligibilityError::from)?;
    Ok(Json(ids))
}

/// POST /campaigns
pub async fn create_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Json(body): Json<CreateCampaignRequest>,
) -> Result<(StatusCode, Json<Campaign>), AppError> {
    let seed = body.seed.into_raw()?;
    let campaign = state
        .sync
        .registry()
        .create_campaign(body.campaign, seed)
        .await?;
    Ok((StatusCode::CREATED, Json(campaign)))
}

/// GET /campaigns/{id}
pub async fn campaign_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>, AppError> {
    Ok(Json(state.sync.registry().campaign(&id).await?))
}

/// DELETE /campaigns/{id}
pub async fn delete_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
) -> Result<StatusCode, AppError> {
    state.sync.registry().delete_campaign(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /campaigns/{id}/identities: replace the eligible set.
pub async fn set_identities_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
    Json(body): Json<IdentitiesRequest>,
) -> Result<Json<EligibilitySnapshot>, AppError> {
    let raw = body.into_raw()?;
    Ok(Json(state.sync.set_identities(&id, raw).await?))
}

/// POST /campaigns/{id}/identities
pub async fn add_identities_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
    Json(body): Json<IdentitiesRequest>,
) -> Result<Json<EligibilitySnapshot>, AppError> {
    let raw = body.into_raw()?;
    Ok(Json(state.sync.add_identities(&id, raw).await?))
}

/// DELETE /campaigns/{id}/identities
pub async fn remove_identities_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
    Json(body): Json<IdentitiesRequest>,
) -> Result<Json<EligibilitySnapshot>, AppError> {
    let raw = body.into_raw()?;
    Ok(Json(state.sync.remove_identities(&id, raw).await?))
}

/// GET /campaigns/{id}/proof/{identity}: the payload a client submits to
/// the mint gate.
pub async fn proof_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path((id, identity)): Path<(String, String)>,
) -> Result<Json<MintRequest>, AppError> {
    Ok(Json(state.sync.mint_request(&id, &identity).await?))
}

/// GET /campaigns/{id}/diagnose/{identity}
pub async fn diagnose_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path((id, identity)): Path<(String, String)>,
) -> Result<Json<Diagnosis>, AppError> {
    Ok(Json(state.sync.diagnose(&id, &identity).await?))
}

/// GET /campaigns/{id}/consistency
pub async fn consistency_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
) -> Result<Json<ConsistencyReport>, AppError> {
    Ok(Json(state.sync.registry().check_consistency(&id).await?))
}

/// GET /campaigns/{id}/chain
pub async fn chain_status_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
) -> Result<Json<ChainStatus>, AppError> {
    Ok(Json(state.sync.chain_status(&id).await?))
}

/// POST /campaigns/{id}/sync: push the stored root to the mint gate.
pub async fn sync_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
) -> Result<Json<PushOutcome>, AppError> {
    Ok(Json(state.sync.push_root(&id).await?))
}

/// POST /campaigns/{id}/close
pub async fn close_handler<S: CampaignStore, G: MintGate>(
    State(state): State<AppState<S, G>>,
    Path(id): Path<String>,
) -> Result<Json<Campaign>, AppError> {
    Ok(Json(state.sync.registry().close_campaign(&id).await?))
}

// ── Error handling ──

/// Application error type that maps to HTTP status codes.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    GatewayTimeout(String),
    Internal(String),
}

impl From<EligibilityError> for AppError {
    fn from(e: EligibilityError) -> Self {
        let msg = e.to_string();
        match e {
            EligibilityError::NotEligible { .. }
            | EligibilityError::CampaignNotFound(_)
            | EligibilityError::NoMintGate(_) => AppError::NotFound(msg),
            EligibilityError::InvalidIdentity(_) | EligibilityError::EmptyEligibilitySet(_) => {
                AppError::BadRequest(msg)
            }
            EligibilityError::CampaignExists(_)
            | EligibilityError::CampaignLocked { .. }
            | EligibilityError::RootDrift { .. }
            | EligibilityError::ChainDrift { .. }
            | EligibilityError::AlreadyConsumed(_) => AppError::Conflict(msg),
            EligibilityError::ChainTimeout(_) => AppError::GatewayTimeout(msg),
            EligibilityError::Chain(_) => AppError::BadGateway(msg),
            EligibilityError::StaleProof { .. } | EligibilityError::Store(_) => {
                tracing::error!(error = %msg, "request failed on an inconsistent or unavailable store");
                AppError::Internal(msg)
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, msg) = match self {
            AppError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
            AppError::NotFound(m) => (StatusCode::NOT_FOUND, m),
            AppError::Conflict(m) => (StatusCode::CONFLICT, m),
            AppError::BadGateway(m) => (StatusCode::BAD_GATEWAY, m),
            AppError::GatewayTimeout(m) => (StatusCode::GATEWAY_TIMEOUT, m),
            AppError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m),
        };
        (status, Json(serde_json::json!({ "error": msg }))).into_response()
    }
}
