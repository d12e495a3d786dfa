pub mod gateway;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::ChatMessage;

/// A scheduling hint embedded in the assistant's stream. The gateway only
/// names the component it wants rendered; this service fills in the actual
/// days/slots from the availability calculator before anything reaches the
/// widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiDirective {
    AvailableDays,
    TimeSlots { date: NaiveDate },
}

/// One fragment of the gateway's chunked response.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StreamFragment {
    pub content: Option<String>,
    #[serde(rename = "uiComponent", skip_serializing_if = "Option::is_none")]
    pub ui_component: Option<UiDirective>,
}

#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Start a streaming completion. Fragments (or a terminal error) arrive
    /// on the returned channel; the channel closing means the stream finished.
    async fn stream_chat(
        &self,
        system_prompt: &str,
        messages: &[ChatMessage],
    ) -> anyhow::Result<mpsc::Receiver<anyhow::Result<StreamFragment>>>;
}
