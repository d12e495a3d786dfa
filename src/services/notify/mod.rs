pub mod email;

use std::sync::Arc;

use async_trait::async_trait;

use crate::state::AppState;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_email(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Fire-and-forget owner notification. Delivery problems are logged and
/// swallowed; a booking never rolls back because an email bounced.
pub async fn notify_owner(state: &Arc<AppState>, subject: &str, body: &str) {
    if state.config.owner_email.is_empty() {
        tracing::warn!("owner_email not configured, skipping notification");
        return;
    }

    if let Err(e) = state
        .notifier
        .send_email(&state.config.owner_email, subject, body)
        .await
    {
        tracing::error!(error = %e, "failed to notify owner");
    }
}
