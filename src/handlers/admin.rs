use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::Json;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{AppointmentSettings, AppointmentStatus, BlockedSlot};
use crate::services::scheduling;
use crate::state::AppState;

fn check_auth(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("");
    if token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[derive(Deserialize)]
pub struct BusinessQuery {
    pub business_id: Option<String>,
}

fn business_id_or_default(state: &AppState, requested: Option<String>) -> String {
    requested.unwrap_or_else(|| state.config.business_id.clone())
}

fn parse_date(s: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("invalid date format (YYYY-MM-DD)".to_string()))
}

fn parse_time(s: &str) -> Result<NaiveTime, AppError> {
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| AppError::Validation("invalid time format (HH:MM)".to_string()))
}

// GET /api/admin/settings
pub async fn get_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BusinessQuery>,
) -> Result<Json<AppointmentSettings>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let business_id = business_id_or_default(&state, query.business_id);

    let db = state.db.lock().unwrap();
    let settings = queries::get_settings(&db, &business_id)?
        .unwrap_or_else(|| AppointmentSettings::defaults(&business_id));
    Ok(Json(settings))
}

// PUT /api/admin/settings
#[derive(Deserialize)]
pub struct UpdateSettingsRequest {
    pub business_id: Option<String>,
    pub timezone: Option<String>,
    pub available_days: Option<Vec<u8>>,
    pub start_hour: Option<u32>,
    pub end_hour: Option<u32>,
    pub default_duration: Option<i64>,
    pub buffer_time: Option<i64>,
    pub min_advance_hours: Option<i64>,
    pub max_advance_days: Option<i64>,
}

pub async fn update_settings(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<UpdateSettingsRequest>,
) -> Result<Json<AppointmentSettings>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let business_id = business_id_or_default(&state, body.business_id);

    let db = state.db.lock().unwrap();
    let mut settings = queries::get_settings(&db, &business_id)?
        .unwrap_or_else(|| AppointmentSettings::defaults(&business_id));

    if let Some(timezone) = body.timezone {
        settings.timezone = timezone;
    }
    if let Some(available_days) = body.available_days {
        settings.available_days = available_days;
    }
    if let Some(start_hour) = body.start_hour {
        settings.start_hour = start_hour;
    }
    if let Some(end_hour) = body.end_hour {
        settings.end_hour = end_hour;
    }
    if let Some(default_duration) = body.default_duration {
        settings.default_duration = default_duration;
    }
    if let Some(buffer_time) = body.buffer_time {
        settings.buffer_time = buffer_time;
    }
    if let Some(min_advance_hours) = body.min_advance_hours {
        settings.min_advance_hours = min_advance_hours;
    }
    if let Some(max_advance_days) = body.max_advance_days {
        settings.max_advance_days = max_advance_days;
    }

    settings
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;
    queries::save_settings(&db, &settings)?;

    Ok(Json(settings))
}

// GET /api/admin/appointments
#[derive(Deserialize)]
pub struct AppointmentsQuery {
    pub business_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct AppointmentResponse {
    id: String,
    date: String,
    start_time: String,
    end_time: String,
    duration_minutes: i64,
    customer_name: String,
    customer_email: String,
    customer_phone: Option<String>,
    status: String,
    cancelled_at: Option<String>,
    cancel_reason: Option<String>,
    created_at: String,
}

pub async fn list_appointments(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<AppointmentsQuery>,
) -> Result<Json<Vec<AppointmentResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let business_id = business_id_or_default(&state, query.business_id);
    let limit = query.limit.unwrap_or(50);

    let appointments = {
        let db = state.db.lock().unwrap();
        queries::list_appointments(&db, &business_id, query.status.as_deref(), limit)?
    };

    let response = appointments
        .into_iter()
        .map(|a| AppointmentResponse {
            id: a.id,
            date: a.date.format("%Y-%m-%d").to_string(),
            start_time: a.start_time.format("%H:%M").to_string(),
            end_time: a.end_time.format("%H:%M").to_string(),
            duration_minutes: a.duration_minutes,
            customer_name: a.customer_name,
            customer_email: a.customer_email,
            customer_phone: a.customer_phone,
            status: a.status.as_str().to_string(),
            cancelled_at: a
                .cancelled_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string()),
            cancel_reason: a.cancel_reason,
            created_at: a.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
        })
        .collect();

    Ok(Json(response))
}

// POST /api/admin/appointments/:id/cancel
#[derive(Deserialize, Default)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

pub async fn cancel_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<CancelRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let cancelled = {
        let db = state.db.lock().unwrap();
        scheduling::cancel_appointment(&db, &id, body.reason.as_deref())?
    };

    Ok(Json(serde_json::json!({
        "ok": true,
        "id": cancelled.id,
        "status": cancelled.status.as_str(),
    })))
}

// POST /api/admin/appointments/:id/status
#[derive(Deserialize)]
pub struct OutcomeRequest {
    pub status: String,
}

pub async fn finish_appointment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<OutcomeRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let outcome = match body.status.as_str() {
        "completed" => AppointmentStatus::Completed,
        "no_show" => AppointmentStatus::NoShow,
        other => {
            return Err(AppError::Validation(format!(
                "status must be completed or no_show, got {other}"
            )))
        }
    };

    let updated = {
        let db = state.db.lock().unwrap();
        scheduling::finish_appointment(&db, &id, outcome)?
    };

    Ok(Json(serde_json::json!({
        "ok": true,
        "id": updated.id,
        "status": updated.status.as_str(),
    })))
}

// GET /api/admin/status
pub async fn get_status(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BusinessQuery>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let business_id = business_id_or_default(&state, query.business_id);

    let stats = {
        let db = state.db.lock().unwrap();
        queries::appointment_stats(&db, &business_id)?
    };

    Ok(Json(serde_json::json!({
        "upcoming_confirmed": stats.upcoming_confirmed,
        "total_confirmed": stats.total_confirmed,
        "total_cancelled": stats.total_cancelled,
        "total_completed": stats.total_completed,
        "total_no_show": stats.total_no_show,
    })))
}

// GET /api/admin/blocked
#[derive(Serialize)]
pub struct BlockedSlotResponse {
    id: String,
    date: Option<String>,
    start_time: Option<String>,
    end_time: Option<String>,
    is_recurring: bool,
    recurring_days: Vec<u8>,
}

pub async fn list_blocked(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Query(query): Query<BusinessQuery>,
) -> Result<Json<Vec<BlockedSlotResponse>>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let business_id = business_id_or_default(&state, query.business_id);

    let slots = {
        let db = state.db.lock().unwrap();
        queries::list_blocked_slots(&db, &business_id)?
    };

    let response = slots
        .into_iter()
        .map(|s| BlockedSlotResponse {
            id: s.id,
            date: s.date.map(|d| d.format("%Y-%m-%d").to_string()),
            start_time: s.start_time.map(|t| t.format("%H:%M").to_string()),
            end_time: s.end_time.map(|t| t.format("%H:%M").to_string()),
            is_recurring: s.is_recurring,
            recurring_days: s.recurring_days,
        })
        .collect();

    Ok(Json(response))
}

// POST /api/admin/blocked
#[derive(Deserialize)]
pub struct BlockRequest {
    pub business_id: Option<String>,
    pub date: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    #[serde(default)]
    pub is_recurring: bool,
    #[serde(default)]
    pub recurring_days: Vec<u8>,
}

pub async fn create_blocked(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(body): Json<BlockRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;
    let business_id = business_id_or_default(&state, body.business_id);

    let slot = BlockedSlot {
        id: Uuid::new_v4().to_string(),
        business_id,
        date: body.date.as_deref().map(parse_date).transpose()?,
        start_time: body.start_time.as_deref().map(parse_time).transpose()?,
        end_time: body.end_time.as_deref().map(parse_time).transpose()?,
        is_recurring: body.is_recurring,
        recurring_days: body.recurring_days,
        created_at: Utc::now().naive_utc(),
    };
    slot.validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    {
        let db = state.db.lock().unwrap();
        queries::insert_blocked_slot(&db, &slot)?;
    }

    Ok(Json(serde_json::json!({ "ok": true, "id": slot.id })))
}

// DELETE /api/admin/blocked/:id
pub async fn delete_blocked(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, AppError> {
    check_auth(&headers, &state.config.admin_token)?;

    let removed = {
        let db = state.db.lock().unwrap();
        queries::delete_blocked_slot(&db, &id)?
    };

    if removed {
        Ok(Json(serde_json::json!({ "ok": true })))
    } else {
        Err(AppError::NotFound("blocked slot not found".to_string()))
    }
}
