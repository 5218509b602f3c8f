use std::time::Instant;

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use ledgerlens_core::{LineItem, Money, ProcessedReceipt, ReceiptStatus};
use ledgerlens_export::{receipts_to_csv, receipts_to_json, ExpenseSummary};
use ledgerlens_storage as storage;

use crate::error::ApiError;
use crate::state::AppState;

/// One receipt as the API presents it.
#[derive(Debug, Serialize)]
pub struct ReceiptView {
    pub id: Uuid,
    pub vendor: Option<String>,
    pub amount: Option<f64>,
    pub date: Option<String>,
    pub category: String,
    pub description: String,
    pub status: String,
    pub requires_review: bool,
    pub confidence_score: f32,
    pub tax_amount: Option<f64>,
    pub items: Vec<ItemView>,
    pub notes: String,
    pub processed_at: String,
}

#[derive(Debug, Serialize)]
pub struct ItemView {
    pub description: String,
    pub amount: Option<f64>,
    pub quantity: Option<f32>,
}

impl From<&LineItem> for ItemView {
    fn from(item: &LineItem) -> Self {
        Self {
            description: item.description.clone(),
            amount: item.amount_cents.map(cents_to_dollars),
            quantity: item.quantity,
        }
    }
}

impl From<&ProcessedReceipt> for ReceiptView {
    fn from(p: &ProcessedReceipt) -> Self {
        let r = &p.receipt;
        Self {
            id: r.id,
            vendor: r.vendor.as_ref().map(|v| v.value.clone()),
            amount: r.total().map(Money::to_f64),
            date: r.date.as_ref().map(|d| d.value.to_string()),
            category: p.category.clone(),
            description: p.description.clone(),
            status: p.status.to_string(),
            requires_review: p.requires_review,
            confidence_score: r.confidence,
            tax_amount: r.tax_cents.as_ref().map(|t| cents_to_dollars(t.value)),
            items: r.line_items.iter().map(ItemView::from).collect(),
            notes: p.notes.clone(),
            processed_at: p.processed_at.to_rfc3339(),
        }
    }
}

fn cents_to_dollars(cents: i64) -> f64 {
    Money::from_cents(cents).to_f64()
}

#[derive(Debug, Serialize)]
pub struct ProcessResponse {
    pub status: String,
    pub data: ReceiptView,
    /// Wall-clock seconds spent in the pipeline.
    pub processing_time: f64,
    pub ai_model: String,
}

/// `POST /api/process` — multipart upload, field `file`.
pub async fn process_receipt(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<ProcessResponse>, ApiError> {
    let started = Instant::now();

    let mut upload: Option<(String, Vec<u8>)> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("malformed multipart body: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("upload.bin").to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
        upload = Some((filename, data.to_vec()));
        break;
    }
    let (filename, data) =
        upload.ok_or_else(|| ApiError::BadRequest("no file uploaded".to_string()))?;

    tracing::debug!(filename = %filename, bytes = data.len(), "processing upload");
    let result = state.pipeline.process_bytes(&state.pool, &data, &filename).await?;

    let status = if result.duplicate { "duplicate" } else { "success" };
    Ok(Json(ProcessResponse {
        status: status.to_string(),
        data: ReceiptView::from(&result.processed),
        processing_time: started.elapsed().as_secs_f64(),
        ai_model: result.model,
    }))
}

/// `GET /api/receipts`
pub async fn list_receipts(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReceiptView>>, ApiError> {
    let receipts = storage::list_all(&state.pool).await?;
    Ok(Json(receipts.iter().map(ReceiptView::from).collect()))
}

/// `GET /api/receipts/pending`
pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<Json<Vec<ReceiptView>>, ApiError> {
    let receipts = storage::list_pending_review(&state.pool).await?;
    Ok(Json(receipts.iter().map(ReceiptView::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct StatusUpdate {
    pub status: String,
    #[serde(default)]
    pub note: String,
}

/// `POST /api/receipts/{id}/status` — approve, reject, or mark synced.
pub async fn update_receipt_status(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<StatusUpdate>,
) -> Result<Json<ReceiptView>, ApiError> {
    let status: ReceiptStatus = update
        .status
        .parse()
        .map_err(|e: String| ApiError::BadRequest(e))?;
    if !matches!(
        status,
        ReceiptStatus::Approved | ReceiptStatus::Rejected | ReceiptStatus::Synced
    ) {
        return Err(ApiError::BadRequest(format!(
            "cannot set status '{status}' through this endpoint"
        )));
    }

    let note = if update.note.is_empty() { "api".to_string() } else { update.note };
    let updated = storage::update_status(&state.pool, id, status, &note).await?;
    tracing::info!(%id, status = %updated.status, "receipt status updated");
    Ok(Json(ReceiptView::from(&updated)))
}

/// How many receipts the dashboard's recent list carries.
const RECENT_LIMIT: i64 = 10;

/// `GET /api/analytics` — the dashboard aggregate.
pub async fn analytics(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let receipts = storage::list_all(&state.pool).await?;
    let summary = ExpenseSummary::build(&receipts);
    let recent: Vec<ReceiptView> =
        receipts.iter().take(RECENT_LIMIT as usize).map(ReceiptView::from).collect();

    let categories: serde_json::Map<String, serde_json::Value> = summary
        .categories
        .iter()
        .map(|(cat, cents)| (cat.clone(), cents_to_dollars(*cents).into()))
        .collect();

    Ok(Json(serde_json::json!({
        "total_processed": summary.total_processed,
        "total_amount": cents_to_dollars(summary.total_amount_cents),
        "avg_confidence": summary.avg_confidence,
        "requires_review": summary.requires_review,
        "categories": categories,
        "category_percentages": summary.category_percentages,
        "top_vendors": summary.top_vendors.iter()
            .map(|(vendor, cents)| serde_json::json!({
                "vendor": vendor,
                "amount": cents_to_dollars(*cents),
            }))
            .collect::<Vec<_>>(),
        "recent": recent,
    })))
}

/// `GET /api/export.csv`
pub async fn export_csv(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let receipts = storage::list_all(&state.pool).await?;
    let body = receipts_to_csv(&receipts).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
            (header::CONTENT_DISPOSITION, "attachment; filename=\"receipts.csv\""),
        ],
        body,
    ))
}

/// `GET /api/export.json`
pub async fn export_json(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let receipts = storage::list_all(&state.pool).await?;
    let body = receipts_to_json(&receipts).map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}

/// `GET /health`
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(serde_json::json!({ "status": "ok" })))
}
