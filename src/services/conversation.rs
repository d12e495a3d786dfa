use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;

use crate::db::queries;
use crate::models::{
    ChatChunk, ChatMessage, Conversation, SessionEvent, UiComponent,
};
use crate::services::ai::UiDirective;
use crate::services::scheduling;
use crate::state::AppState;

const SYSTEM_PROMPT: &str = r#"You are the friendly front-desk assistant for a local business, chatting with visitors through the website's chat widget.

You can answer general questions about the business and help visitors schedule an appointment.

Scheduling rules:
- Never invent dates or times. When the visitor wants to schedule, emit a uiComponent directive and the platform renders live availability:
  {"uiComponent": {"type": "available_days"}} to offer bookable days
  {"uiComponent": {"type": "time_slots", "date": "YYYY-MM-DD"}} when the visitor already named a specific day
- Never promise that a time is free; the booking form confirms availability.

Keep replies short, warm, and professional."#;

/// Run one widget chat turn: persist the user message, stream the assistant
/// reply through `out`, and resolve at most one scheduling directive into a
/// fully populated UI payload. Any transport failure collapses into a single
/// apology chunk; the visitor just re-sends.
pub async fn run_chat_turn(
    state: &Arc<AppState>,
    conversation_id: &str,
    business_id: &str,
    user_message: &str,
    out: mpsc::Sender<ChatChunk>,
) -> anyhow::Result<()> {
    let mut conv = {
        let db = state.db.lock().unwrap();
        let _ = queries::expire_old_conversations(&db);
        queries::get_conversation(&db, conversation_id)?
    }
    .unwrap_or_else(|| Conversation::new(conversation_id, business_id));

    conv.messages.push(ChatMessage::user(user_message));

    let system = build_system_prompt(state, business_id);

    tracing::info!(
        conversation = conversation_id,
        business = business_id,
        "processing chat turn"
    );

    let mut rx = match state.chat.stream_chat(&system, &conv.messages).await {
        Ok(rx) => rx,
        Err(e) => {
            tracing::error!(error = %e, "chat gateway refused the request");
            return finish_with_apology(state, conv, out).await;
        }
    };

    let mut assistant_text = String::new();
    let mut component_sent = false;

    while let Some(fragment) = rx.recv().await {
        let fragment = match fragment {
            Ok(fragment) => fragment,
            Err(e) => {
                tracing::error!(error = %e, "chat stream failed mid-turn");
                return finish_with_apology(state, conv, out).await;
            }
        };

        if let Some(content) = fragment.content {
            assistant_text.push_str(&content);
            if out.send(ChatChunk::text(content)).await.is_err() {
                break; // widget went away, stop consuming
            }
        }

        if let Some(directive) = fragment.ui_component {
            // One structured payload per assistant message.
            if component_sent {
                tracing::warn!("ignoring extra uiComponent directive in one turn");
                continue;
            }
            match resolve_directive(state, &mut conv, business_id, directive) {
                Ok(Some(component)) => {
                    component_sent = true;
                    if out.send(ChatChunk::component(component)).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "failed to resolve uiComponent directive");
                }
            }
        }
    }

    if !assistant_text.is_empty() {
        conv.messages.push(ChatMessage::assistant(assistant_text));
    }
    conv.touch();
    {
        let db = state.db.lock().unwrap();
        queries::save_conversation(&db, &conv)?;
    }
    Ok(())
}

fn build_system_prompt(state: &Arc<AppState>, business_id: &str) -> String {
    let business_name = if state.config.business_name.is_empty() {
        "the business".to_string()
    } else {
        state.config.business_name.clone()
    };

    let today = {
        let db = state.db.lock().unwrap();
        queries::get_settings(&db, business_id)
            .ok()
            .flatten()
            .map(|s| Utc::now().with_timezone(&s.tz()).date_naive())
            .unwrap_or_else(|| Utc::now().date_naive())
    };

    format!("{SYSTEM_PROMPT}\n\nBusiness: {business_name}. Today is {today}.")
}

/// Turn a gateway directive into a populated payload and advance the booking
/// session. A directive the session can't accept (e.g. time slots before any
/// days were offered) is dropped rather than breaking the flow's ordering.
fn resolve_directive(
    state: &Arc<AppState>,
    conv: &mut Conversation,
    business_id: &str,
    directive: UiDirective,
) -> anyhow::Result<Option<UiComponent>> {
    let db = state.db.lock().unwrap();
    let Some(settings) = queries::get_settings(&db, business_id)? else {
        tracing::warn!(business = business_id, "no appointment settings configured");
        return Ok(None);
    };
    let now = Utc::now();

    match directive {
        UiDirective::AvailableDays => {
            let days = scheduling::day_options(&db, &settings, now)?;
            if let Ok((session, _)) = conv
                .session
                .apply(SessionEvent::DaysPresented { days: days.clone() })
            {
                conv.session = session;
            }
            Ok(Some(UiComponent::AvailableDays { days }))
        }
        UiDirective::TimeSlots { date } => {
            let slots = scheduling::slot_options(&db, &settings, date, now)?;
            match conv.session.apply(SessionEvent::DayPicked {
                date,
                slots: slots.clone(),
            }) {
                Ok((session, _)) => {
                    conv.session = session;
                    Ok(Some(UiComponent::TimeSlots { date, slots }))
                }
                Err(e) => {
                    tracing::debug!(error = %e, "time_slots directive out of order, dropping");
                    Ok(None)
                }
            }
        }
    }
}

async fn finish_with_apology(
    state: &Arc<AppState>,
    mut conv: Conversation,
    out: mpsc::Sender<ChatChunk>,
) -> anyhow::Result<()> {
    let apology = ChatChunk::apology();
    if let Some(text) = &apology.content {
        conv.messages.push(ChatMessage::assistant(text.clone()));
    }
    let _ = out.send(apology).await;

    conv.touch();
    {
        let db = state.db.lock().unwrap();
        queries::save_conversation(&db, &conv)?;
    }
    Ok(())
}
