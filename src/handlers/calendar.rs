use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::db::queries;
use crate::services::calendar::generate_ics;
use crate::state::AppState;

// GET /calendar/:appointment_id(.ics)
pub async fn download_ics(
    State(state): State<Arc<AppState>>,
    Path(raw_id): Path<String>,
) -> Response {
    let appointment_id = raw_id.strip_suffix(".ics").unwrap_or(&raw_id);

    let appointment = {
        let db = state.db.lock().unwrap();
        match queries::get_appointment(&db, appointment_id) {
            Ok(Some(a)) => a,
            Ok(None) => {
                return (StatusCode::NOT_FOUND, "Appointment not found").into_response();
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to load appointment for .ics");
                return (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response();
            }
        }
    };

    let business_name = if state.config.business_name.is_empty() {
        "Appointment".to_string()
    } else {
        state.config.business_name.clone()
    };

    let ics = generate_ics(&appointment, &business_name);
    let filename = format!("appointment-{}.ics", appointment_id);

    (
        [
            (header::CONTENT_TYPE, "text/calendar; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                &format!("attachment; filename=\"{filename}\""),
            ),
        ],
        ics,
    )
        .into_response()
}
