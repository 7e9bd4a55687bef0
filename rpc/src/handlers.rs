//! RPC request handlers.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cohort_crypto::MerkleProof;
use cohort_groups::{GroupUpdate, NewGroup, PublisherStatsSnapshot};
use cohort_store::GroupRecord;
use cohort_types::{Commitment, MerkleRoot};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};

use crate::error::RpcError;
use crate::server::RpcState;

type RpcResult<T> = Result<T, RpcError>;

fn parse_commitment(raw: &str) -> RpcResult<Commitment> {
    raw.parse()
        .map_err(|e| RpcError::InvalidRequest(format!("invalid commitment '{raw}': {e}")))
}

// ── Groups ───────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct GroupResponse {
    pub name: String,
    pub description: String,
    pub tree_depth: u8,
    pub tag: String,
    pub admin: String,
    pub members: Vec<Commitment>,
    pub member_count: usize,
    /// Root of the cached tree.
    pub root: MerkleRoot,
    pub created_at: u64,
}

impl GroupResponse {
    fn from_record(record: GroupRecord, root: MerkleRoot) -> Self {
        Self {
            member_count: record.members.len(),
            name: record.name,
            description: record.description,
            tree_depth: record.tree_depth,
            tag: record.tag,
            admin: record.admin,
            members: record.members,
            root,
            created_at: record.created_at.as_secs(),
        }
    }
}

fn group_response(state: &RpcState, record: GroupRecord) -> RpcResult<GroupResponse> {
    let root = state.registry.root_of(&record.name)?;
    Ok(GroupResponse::from_record(record, root))
}

#[derive(Deserialize)]
pub struct ListGroupsQuery {
    pub admin: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateGroupRequest {
    pub caller: String,
    #[serde(flatten)]
    pub update: GroupUpdate,
}

/// POST /groups
pub async fn create_group(
    State(state): State<Arc<RpcState>>,
    Json(req): Json<NewGroup>,
) -> RpcResult<(StatusCode, Json<GroupResponse>)> {
    let record = state.registry.create_group(req).await?;
    Ok((StatusCode::CREATED, Json(group_response(&state, record)?)))
}

/// GET /groups?admin=
pub async fn list_groups(
    State(state): State<Arc<RpcState>>,
    Query(query): Query<ListGroupsQuery>,
) -> RpcResult<Json<Vec<GroupResponse>>> {
    let records = match query.admin {
        Some(admin) => state.registry.list_groups_by_admin(&admin).await?,
        None => state.registry.list_groups().await?,
    };
    let groups = records
        .into_iter()
        .map(|r| group_response(&state, r))
        .collect::<RpcResult<Vec<_>>>()?;
    Ok(Json(groups))
}

/// GET /groups/:name
pub async fn get_group(
    State(state): State<Arc<RpcState>>,
    Path(name): Path<String>,
) -> RpcResult<Json<GroupResponse>> {
    let record = state.registry.get_group(&name).await?;
    Ok(Json(group_response(&state, record)?))
}

/// PUT /groups/:name
pub async fn update_group(
    State(state): State<Arc<RpcState>>,
    Path(name): Path<String>,
    Json(req): Json<UpdateGroupRequest>,
) -> RpcResult<Json<GroupResponse>> {
    let record = state
        .registry
        .update_group(&name, req.update, &req.caller)
        .await?;
    Ok(Json(group_response(&state, record)?))
}

// ── Members ──────────────────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AddMemberRequest {
    /// Hex (`0x` optional) or decimal.
    pub commitment: String,
    pub invite_code: String,
    pub caller: Option<String>,
}

#[derive(Serialize)]
pub struct MembershipResponse {
    pub group: String,
    pub commitment: Commitment,
    pub is_member: bool,
}

#[derive(Serialize)]
pub struct ProofResponse {
    pub group: String,
    pub proof: MerkleProof,
}

/// POST /groups/:name/members
pub async fn add_member(
    State(state): State<Arc<RpcState>>,
    Path(name): Path<String>,
    Json(req): Json<AddMemberRequest>,
) -> RpcResult<(StatusCode, Json<GroupResponse>)> {
    let leaf = parse_commitment(&req.commitment)?;
    let record = state
        .registry
        .add_member(&name, leaf, &req.invite_code, req.caller.as_deref())
        .await?;
    Ok((StatusCode::CREATED, Json(group_response(&state, record)?)))
}

/// GET /groups/:name/members/:commitment
pub async fn is_member(
    State(state): State<Arc<RpcState>>,
    Path((name, commitment)): Path<(String, String)>,
) -> RpcResult<Json<MembershipResponse>> {
    let leaf = parse_commitment(&commitment)?;
    let is_member = state.registry.is_member(&name, &leaf)?;
    Ok(Json(MembershipResponse {
        group: name,
        commitment: leaf,
        is_member,
    }))
}

/// GET /groups/:name/members/:commitment/proof
pub async fn generate_proof(
    State(state): State<Arc<RpcState>>,
    Path((name, commitment)): Path<(String, String)>,
) -> RpcResult<Json<ProofResponse>> {
    let leaf = parse_commitment(&commitment)?;
    let proof = state.registry.generate_proof(&name, &leaf)?;
    Ok(Json(ProofResponse { group: name, proof }))
}

// ── Node ─────────────────────────────────────────────────────────────────

#[derive(Serialize)]
pub struct HealthResponse {
    pub ready: bool,
    pub group_count: u64,
    pub pending_updates: u64,
    pub publication_scheduled: bool,
    pub publisher: PublisherStatsSnapshot,
}

/// GET /health
pub async fn health(State(state): State<Arc<RpcState>>) -> Response {
    let stats = state.registry.stats();
    let ready = state.registry.is_ready();
    let body = HealthResponse {
        ready,
        group_count: stats.group_count,
        pending_updates: stats.pending_updates,
        publication_scheduled: state.registry.publisher().is_pending(),
        publisher: stats.publisher,
    };
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body)).into_response()
}

/// GET /metrics
pub async fn metrics(State(state): State<Arc<RpcState>>) -> RpcResult<Response> {
    let Some(registry) = &state.metrics else {
        return Ok(StatusCode::NOT_FOUND.into_response());
    };
    let mut buffer = Vec::new();
    let encoder = TextEncoder::new();
    encoder
        .encode(&registry.gather(), &mut buffer)
        .map_err(|e| RpcError::Server(format!("failed to encode metrics: {e}")))?;
    Ok((
        [(header::CONTENT_TYPE, encoder.format_type().to_string())],
        buffer,
    )
        .into_response())
}
