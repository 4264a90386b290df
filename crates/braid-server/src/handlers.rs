use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use braid_core::identity::ClientId;
use braid_core::ids::{MessageRowId, StorageId, ThreadId, ThreadRowId};
use braid_engine::{CreateMessage, ServiceError};
use braid_store::messages::MessageRow;
use braid_store::threads::ThreadRow;

use crate::error::ApiError;
use crate::server::{AppState, Identity};

fn parse_row_id(raw: &str) -> Result<ThreadRowId, ApiError> {
    raw.parse::<i64>()
        .map(ThreadRowId::from_raw)
        .map_err(|_| ApiError(ServiceError::InvalidArgument(format!("invalid thread ref: {raw}"))))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

// ── Threads ──

#[derive(Deserialize)]
pub struct CreateThreadBody {
    pub id: String,
}

pub async fn create_thread(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(body): Json<CreateThreadBody>,
) -> Result<Json<ThreadRow>, ApiError> {
    let thread = state
        .threads
        .create_thread(&caller, &ThreadId::from_raw(body.id))?;
    Ok(Json(thread))
}

pub async fn list_threads(
    State(state): State<AppState>,
    Identity(caller): Identity,
) -> Result<Json<Vec<ThreadRow>>, ApiError> {
    Ok(Json(state.threads.get_threads(&caller)?))
}

#[derive(Deserialize)]
pub struct RenameThreadBody {
    pub title: String,
}

pub async fn rename_thread(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(thread_ref): Path<String>,
    Json(body): Json<RenameThreadBody>,
) -> Result<Json<Value>, ApiError> {
    let row_id = parse_row_id(&thread_ref)?;
    state.threads.update_thread_title(&caller, row_id, &body.title)?;
    Ok(Json(json!({ "ok": true })))
}

#[derive(Deserialize)]
pub struct DeleteThreadParams {
    /// External thread id, needed for the message cascade.
    pub id: String,
}

pub async fn delete_thread(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(thread_ref): Path<String>,
    Query(params): Query<DeleteThreadParams>,
) -> Result<Json<Value>, ApiError> {
    let row_id = parse_row_id(&thread_ref)?;
    state
        .threads
        .delete_thread(&caller, row_id, &ThreadId::from_raw(params.id))?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn share_thread(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(thread_ref): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let row_id = parse_row_id(&thread_ref)?;
    let shared = state.threads.share(&caller, row_id)?;
    Ok(Json(json!({ "row_id": shared })))
}

pub async fn clone_thread(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(thread_ref): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let row_id = parse_row_id(&thread_ref)?;
    let thread_id = state.threads.clone_to_current_user(&caller, row_id)?;
    Ok(Json(json!({ "thread_id": thread_id })))
}

#[derive(Deserialize)]
pub struct BranchThreadBody {
    pub thread_id: String,
    pub message_row_id: i64,
}

pub async fn branch_thread(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(body): Json<BranchThreadBody>,
) -> Result<Json<Value>, ApiError> {
    let thread_id = state.lineage.branch_off(
        &caller,
        &ThreadId::from_raw(body.thread_id),
        MessageRowId::from_raw(body.message_row_id),
    )?;
    Ok(Json(json!({ "thread_id": thread_id })))
}

// ── Messages ──

pub async fn create_message(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(body): Json<CreateMessage>,
) -> Result<Json<Value>, ApiError> {
    state.messages.create_message(&caller, body)?;
    Ok(Json(json!({ "ok": true })))
}

pub async fn list_messages(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(thread_ref): Path<String>,
) -> Result<Json<Vec<MessageRow>>, ApiError> {
    let msgs = state
        .messages
        .get_messages(&caller, &ThreadId::from_raw(thread_ref))?;
    Ok(Json(msgs))
}

pub async fn list_shared_messages(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Path(thread_ref): Path<String>,
) -> Result<Json<Vec<MessageRow>>, ApiError> {
    let row_id = parse_row_id(&thread_ref)?;
    Ok(Json(state.messages.get_shared_messages(&caller, row_id)?))
}

// ── Files ──

pub async fn create_upload_url(
    State(state): State<AppState>,
    Identity(_caller): Identity,
) -> Json<Value> {
    let ticket = state.objects.create_upload_url().await;
    Json(json!({ "storage_id": ticket.storage_id, "url": ticket.url }))
}

pub async fn resolve_file_url(
    State(state): State<AppState>,
    Identity(_caller): Identity,
    Path(storage_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let id = StorageId::from_raw(storage_id);
    match state.objects.resolve_url(&id).await {
        Some(url) => Ok(Json(json!({ "url": url }))),
        None => Err(ApiError(ServiceError::NotFound(format!("file {id}")))),
    }
}

pub async fn list_attachments(
    State(state): State<AppState>,
    Identity(caller): Identity,
) -> Result<Json<Value>, ApiError> {
    let attachments = state.messages.list_attachments(&caller)?;
    Ok(Json(json!({ "attachments": attachments })))
}

// ── Promotion ──

#[derive(Deserialize)]
pub struct PromoteBody {
    pub anonymous_id: String,
}

pub async fn promote(
    State(state): State<AppState>,
    Identity(caller): Identity,
    Json(body): Json<PromoteBody>,
) -> Result<Json<Value>, ApiError> {
    state
        .lineage
        .promote(&caller, &ClientId::from_raw(body.anonymous_id))?;
    Ok(Json(json!({ "ok": true })))
}
