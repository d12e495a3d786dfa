pub mod appointment;
pub mod blocked_slot;
pub mod conversation;
pub mod payload;
pub mod session;
pub mod settings;

pub use appointment::{Appointment, AppointmentStatus};
pub use blocked_slot::BlockedSlot;
pub use conversation::{ChatMessage, Conversation};
pub use payload::{ChatChunk, DayOption, SlotOption, UiComponent};
pub use session::{BookingSession, CustomerDetails, SessionAction, SessionError, SessionEvent};
pub use settings::{weekday_number, AppointmentSettings};
