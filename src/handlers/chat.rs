use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{NaiveDate, NaiveTime, Utc};
use serde::Deserialize;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::db::queries;
use crate::errors::AppError;
use crate::models::{
    ChatChunk, CustomerDetails, SessionAction, SessionError, SessionEvent, UiComponent,
};
use crate::services::scheduling::{self, SchedulingError};
use crate::services::{conversation, notify};
use crate::state::AppState;

fn business_id_or_default(state: &AppState, requested: Option<String>) -> String {
    requested.unwrap_or_else(|| state.config.business_id.clone())
}

fn session_error(e: SessionError) -> AppError {
    match e {
        SessionError::UnknownOption => AppError::Validation(e.to_string()),
        SessionError::InvalidTransition => AppError::InvalidTransition(e.to_string()),
    }
}

// POST /api/chat (streams the assistant reply as SSE)
#[derive(Deserialize)]
pub struct ChatRequest {
    pub conversation_id: String,
    pub business_id: Option<String>,
    pub message: String,
}

pub async fn chat_stream(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ChatRequest>,
) -> Result<Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>>, AppError> {
    if body.conversation_id.trim().is_empty() {
        return Err(AppError::Validation("conversation_id is required".to_string()));
    }
    if body.message.trim().is_empty() {
        return Err(AppError::Validation("message is required".to_string()));
    }
    let business_id = business_id_or_default(&state, body.business_id);

    let (tx, rx) = tokio::sync::mpsc::channel::<ChatChunk>(32);
    let task_state = state.clone();
    let conversation_id = body.conversation_id.clone();
    let message = body.message.clone();
    tokio::spawn(async move {
        if let Err(e) = conversation::run_chat_turn(
            &task_state,
            &conversation_id,
            &business_id,
            &message,
            tx.clone(),
        )
        .await
        {
            tracing::error!(error = %e, "chat turn failed");
            let _ = tx.send(ChatChunk::apology()).await;
        }
    });

    let stream = ReceiverStream::new(rx)
        .map(|chunk| Event::default().data(serde_json::to_string(&chunk).unwrap_or_default()))
        .chain(tokio_stream::once(Event::default().data("[DONE]")))
        .map(Ok::<_, Infallible>);

    Ok(Sse::new(stream))
}

// POST /api/chat/select-day: a day pill was clicked; respond with fresh time slots
#[derive(Deserialize)]
pub struct SelectDayRequest {
    pub conversation_id: String,
    pub business_id: Option<String>,
    pub date: String,
}

pub async fn select_day(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectDayRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let date = NaiveDate::parse_from_str(&body.date, "%Y-%m-%d")
        .map_err(|_| AppError::Validation("invalid date format (YYYY-MM-DD)".to_string()))?;
    let business_id = business_id_or_default(&state, body.business_id);

    let db = state.db.lock().unwrap();
    let mut conv = queries::get_conversation(&db, &body.conversation_id)?
        .ok_or_else(|| AppError::NotFound("conversation not found".to_string()))?;
    let settings = queries::get_settings(&db, &business_id)?
        .ok_or_else(|| AppError::NotFound("appointment settings not configured".to_string()))?;

    let slots = scheduling::slot_options(&db, &settings, date, Utc::now())?;
    let (session, _) = conv
        .session
        .apply(SessionEvent::DayPicked {
            date,
            slots: slots.clone(),
        })
        .map_err(session_error)?;
    conv.session = session;
    conv.touch();
    queries::save_conversation(&db, &conv)?;

    let message = if slots.is_empty() {
        "Sorry, that day just filled up. Want to try another one?".to_string()
    } else {
        format!("Here are the open times for {}.", date.format("%A, %B %-d"))
    };

    Ok(Json(serde_json::json!({
        "message": message,
        "uiComponent": UiComponent::TimeSlots { date, slots },
    })))
}

// POST /api/chat/select-slot: a time pill was clicked; open the inline form
#[derive(Deserialize)]
pub struct SelectSlotRequest {
    pub conversation_id: String,
    pub time: String,
}

pub async fn select_slot(
    State(state): State<Arc<AppState>>,
    Json(body): Json<SelectSlotRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let time = NaiveTime::parse_from_str(&body.time, "%H:%M")
        .map_err(|_| AppError::Validation("invalid time format (HH:MM)".to_string()))?;

    let db = state.db.lock().unwrap();
    let mut conv = queries::get_conversation(&db, &body.conversation_id)?
        .ok_or_else(|| AppError::NotFound("conversation not found".to_string()))?;

    let (session, _) = conv
        .session
        .apply(SessionEvent::SlotPicked { time })
        .map_err(session_error)?;
    conv.session = session;
    conv.touch();
    queries::save_conversation(&db, &conv)?;

    Ok(Json(serde_json::json!({
        "ok": true,
        "time": time.format("%H:%M").to_string(),
        "display": time.format("%-I:%M %p").to_string(),
    })))
}

// POST /api/chat/book: the inline form was submitted
#[derive(Deserialize)]
pub struct BookRequest {
    pub conversation_id: String,
    pub business_id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

pub async fn book(
    State(state): State<Arc<AppState>>,
    Json(body): Json<BookRequest>,
) -> Result<Response, AppError> {
    let customer = CustomerDetails {
        name: body.name,
        email: body.email,
        phone: body.phone.filter(|p| !p.trim().is_empty()),
    };
    customer
        .validate()
        .map_err(|e| AppError::Validation(e.to_string()))?;

    let business_id = business_id_or_default(&state, body.business_id);
    let now = Utc::now();

    let appointment = {
        let mut db = state.db.lock().unwrap();
        let mut conv = queries::get_conversation(&db, &body.conversation_id)?
            .ok_or_else(|| AppError::NotFound("conversation not found".to_string()))?;
        let settings = queries::get_settings(&db, &business_id)?
            .ok_or_else(|| AppError::NotFound("appointment settings not configured".to_string()))?;

        let (session, action) = conv
            .session
            .apply(SessionEvent::FormSubmitted {
                customer: customer.clone(),
            })
            .map_err(session_error)?;
        conv.session = session;
        let Some(SessionAction::CreateAppointment { date, time, customer }) = action else {
            return Err(AppError::Internal(anyhow::anyhow!(
                "form submission produced no booking action"
            )));
        };

        match scheduling::create_appointment(&mut db, &settings, date, time, &customer, now) {
            Ok(appointment) => {
                let (session, _) = conv
                    .session
                    .apply(SessionEvent::BookingCreated)
                    .map_err(session_error)?;
                conv.session = session;
                conv.messages.push(crate::models::ChatMessage::assistant(format!(
                    "You're booked for {} at {}. See you then!",
                    date.format("%A, %B %-d"),
                    time.format("%-I:%M %p"),
                )));
                conv.touch();
                queries::save_conversation(&db, &conv)?;
                appointment
            }
            Err(SchedulingError::SlotConflict) => {
                // Someone beat this customer to the slot: refresh the list and
                // drop them back into picking a time.
                let slots = scheduling::slot_options(&db, &settings, date, now)?;
                let (session, _) = conv
                    .session
                    .apply(SessionEvent::SlotTaken {
                        slots: slots.clone(),
                    })
                    .map_err(session_error)?;
                conv.session = session;
                conv.touch();
                queries::save_conversation(&db, &conv)?;

                return Ok((
                    StatusCode::CONFLICT,
                    Json(serde_json::json!({
                        "error": "that time was just taken",
                        "message": "Sorry, that time was just taken. Here are the times still open.",
                        "uiComponent": UiComponent::TimeSlots { date, slots },
                    })),
                )
                    .into_response());
            }
            Err(e) => return Err(e.into()),
        }
    };

    // Owner notification is fire-and-forget; the booking already stands.
    let notify_state = state.clone();
    let subject = format!(
        "New booking: {} on {}",
        appointment.customer_name, appointment.date
    );
    let body_text = format!(
        "{} ({}) booked {} at {}.",
        appointment.customer_name,
        appointment.customer_email,
        appointment.date.format("%A, %B %-d"),
        appointment.start_time.format("%-I:%M %p"),
    );
    tokio::spawn(async move {
        notify::notify_owner(&notify_state, &subject, &body_text).await;
    });

    Ok(Json(serde_json::json!({
        "ok": true,
        "appointment_id": appointment.id,
        "message": format!(
            "You're booked for {} at {}.",
            appointment.date.format("%A, %B %-d"),
            appointment.start_time.format("%-I:%M %p"),
        ),
        "calendar_url": format!("/calendar/{}.ics", appointment.id),
    }))
    .into_response())
}

// POST /api/chat/dismiss: the widget was closed or the flow abandoned
#[derive(Deserialize)]
pub struct DismissRequest {
    pub conversation_id: String,
}

pub async fn dismiss(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DismissRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    let db = state.db.lock().unwrap();
    // Dismissing an unknown or expired conversation is a no-op.
    if let Some(mut conv) = queries::get_conversation(&db, &body.conversation_id)? {
        if let Ok((session, _)) = conv.session.apply(SessionEvent::FlowDismissed) {
            conv.session = session;
        }
        conv.touch();
        queries::save_conversation(&db, &conv)?;
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
