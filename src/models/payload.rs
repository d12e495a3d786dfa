use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

/// Times cross the wire as "HH:MM".
pub mod hhmm {
    use chrono::NaiveTime;
    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&time.format("%H:%M").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&s, "%H:%M").map_err(serde::de::Error::custom)
    }
}

/// A selectable day pill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DayOption {
    pub date: NaiveDate,
    /// Short human label, e.g. "Jun 3".
    pub display: String,
    /// Full weekday name, e.g. "Tuesday".
    pub day_name: String,
}

/// A selectable time-slot pill.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlotOption {
    #[serde(with = "hhmm")]
    pub time: NaiveTime,
    /// Human label, e.g. "9:00 AM".
    pub display: String,
}

/// Structured payload attached to an assistant message so the widget can
/// render interactive pills instead of plain text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UiComponent {
    AvailableDays { days: Vec<DayOption> },
    TimeSlots { date: NaiveDate, slots: Vec<SlotOption> },
}

/// One fragment of the chunked chat response streamed to the widget.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatChunk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "uiComponent", skip_serializing_if = "Option::is_none")]
    pub ui_component: Option<UiComponent>,
}

impl ChatChunk {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ui_component: None,
        }
    }

    pub fn component(component: UiComponent) -> Self {
        Self {
            content: None,
            ui_component: Some(component),
        }
    }

    /// The single generic message shown when the assistant stream fails.
    pub fn apology() -> Self {
        Self::text("Sorry, I'm having trouble right now. Please try again in a moment.")
    }
}
