use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::UiComponent;
use crate::services::scheduling;
use crate::state::AppState;

// GET /api/availability/days
#[derive(Deserialize)]
pub struct DaysQuery {
    pub business_id: Option<String>,
}

pub async fn get_days(
    State(state): State<Arc<AppState>>,
    Query(query): Query<DaysQuery>,
) -> Result<Json<UiComponent>, AppError> {
    let business_id = query
        .business_id
        .unwrap_or_else(|| state.config.business_id.clone());

    let db = state.db.lock().unwrap();
    let settings = queries::get_settings(&db, &business_id)?
        .ok_or_else(|| AppError::NotFound("appointment settings not configured".to_string()))?;

    let days = scheduling::day_options(&db, &settings, Utc::now())?;
    Ok(Json(UiComponent::AvailableDays { days }))
}

// GET /api/availability/slots
#[derive(Deserialize)]
pub struct SlotsQuery {
    pub business_id: Option<String>,
    pub date: String,
}

pub async fn get_slots(
    State(state): State<Arc<AppState>>,
    Query(query): Query<SlotsQuery>,
) -> Result<Json<UiComponent>, AppError> {
    let business_id = query
        .business_id
        .unwrap_or_else(|| state.config.business_id.clone());
    let date = NaiveDate::parse_from_str(&query.date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("invalid date format (YYYY-MM-DD)".to_string()))?;

    let db = state.db.lock().unwrap();
    let settings = queries::get_settings(&db, &business_id)?
        .ok_or_else(|| AppError::NotFound("appointment settings not configured".to_string()))?;

    let slots = scheduling::slot_options(&db, &settings, date, Utc::now())?;
    Ok(Json(UiComponent::TimeSlots { date, slots }))
}
