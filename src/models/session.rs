use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::models::payload::{DayOption, SlotOption};

/// Customer fields collected by the inline booking form.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CustomerDetails {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl CustomerDetails {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.name.trim().is_empty() {
            anyhow::bail!("name is required");
        }
        let email = self.email.trim();
        let valid_email = email
            .split_once('@')
            .map(|(local, domain)| !local.is_empty() && domain.contains('.'))
            .unwrap_or(false);
        if !valid_email {
            anyhow::bail!("a valid email address is required");
        }
        Ok(())
    }
}

/// Where a conversation's booking flow currently stands. Serialized into the
/// conversation row between requests; every handler runs `apply` and stores
/// the value it gets back.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BookingSession {
    #[default]
    Idle,
    DaysOffered {
        days: Vec<DayOption>,
    },
    SlotsOffered {
        date: NaiveDate,
        slots: Vec<SlotOption>,
    },
    FormOpen {
        date: NaiveDate,
        #[serde(with = "crate::models::payload::hhmm")]
        time: NaiveTime,
    },
    Submitting {
        date: NaiveDate,
        #[serde(with = "crate::models::payload::hhmm")]
        time: NaiveTime,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The assistant offered day pills.
    DaysPresented { days: Vec<DayOption> },
    /// The customer picked a day; `slots` is the fresh availability for it.
    DayPicked {
        date: NaiveDate,
        slots: Vec<SlotOption>,
    },
    /// The customer picked a time pill.
    SlotPicked { time: NaiveTime },
    /// The customer submitted the inline form.
    FormSubmitted { customer: CustomerDetails },
    /// The store accepted the appointment.
    BookingCreated,
    /// The store reported a conflict; `slots` is the refreshed list.
    SlotTaken { slots: Vec<SlotOption> },
    /// The customer backed out of the form.
    FormCancelled,
    /// The customer closed the widget or walked away from the flow.
    FlowDismissed,
}

/// Side effect the caller must perform after a transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    CreateAppointment {
        date: NaiveDate,
        time: NaiveTime,
        customer: CustomerDetails,
    },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SessionError {
    #[error("that action isn't available right now")]
    InvalidTransition,
    #[error("that option wasn't one of the offered choices")]
    UnknownOption,
}

impl BookingSession {
    /// Pure reducer over the booking flow. Invalid events leave the caller's
    /// state untouched; the flow never skips a step.
    pub fn apply(
        &self,
        event: SessionEvent,
    ) -> Result<(BookingSession, Option<SessionAction>), SessionError> {
        use BookingSession::*;

        match (self, event) {
            // Offering days (re)starts the flow from anywhere, implicitly
            // cancelling a pending selection or form.
            (_, SessionEvent::DaysPresented { days }) => Ok((DaysOffered { days }, None)),

            (DaysOffered { days }, SessionEvent::DayPicked { date, slots }) => {
                if !days.iter().any(|d| d.date == date) {
                    return Err(SessionError::UnknownOption);
                }
                Ok((SlotsOffered { date, slots }, None))
            }
            // Picking a different day while slots or the form are showing
            // abandons the earlier selection.
            (SlotsOffered { .. } | FormOpen { .. }, SessionEvent::DayPicked { date, slots }) => {
                Ok((SlotsOffered { date, slots }, None))
            }

            (SlotsOffered { date, slots }, SessionEvent::SlotPicked { time }) => {
                if !slots.iter().any(|s| s.time == time) {
                    return Err(SessionError::UnknownOption);
                }
                Ok((
                    FormOpen {
                        date: *date,
                        time,
                    },
                    None,
                ))
            }

            (FormOpen { date, time }, SessionEvent::FormSubmitted { customer }) => Ok((
                Submitting {
                    date: *date,
                    time: *time,
                },
                Some(SessionAction::CreateAppointment {
                    date: *date,
                    time: *time,
                    customer,
                }),
            )),

            (Submitting { .. }, SessionEvent::BookingCreated) => Ok((Idle, None)),
            (Submitting { date, .. }, SessionEvent::SlotTaken { slots }) => {
                Ok((SlotsOffered { date: *date, slots }, None))
            }

            (FormOpen { .. }, SessionEvent::FormCancelled) => Ok((Idle, None)),
            (_, SessionEvent::FlowDismissed) => Ok((Idle, None)),

            _ => Err(SessionError::InvalidTransition),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(date: &str) -> DayOption {
        DayOption {
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap(),
            display: "Jun 3".to_string(),
            day_name: "Tuesday".to_string(),
        }
    }

    fn slot(time: &str) -> SlotOption {
        SlotOption {
            time: NaiveTime::parse_from_str(time, "%H:%M").unwrap(),
            display: time.to_string(),
        }
    }

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: None,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    #[test]
    fn test_happy_path_reaches_each_state_in_order() {
        let session = BookingSession::Idle;

        let (session, action) = session
            .apply(SessionEvent::DaysPresented {
                days: vec![day("2025-06-03")],
            })
            .unwrap();
        assert!(matches!(session, BookingSession::DaysOffered { .. }));
        assert!(action.is_none());

        let (session, _) = session
            .apply(SessionEvent::DayPicked {
                date: date("2025-06-03"),
                slots: vec![slot("14:00")],
            })
            .unwrap();
        assert!(matches!(session, BookingSession::SlotsOffered { .. }));

        let (session, _) = session
            .apply(SessionEvent::SlotPicked { time: time("14:00") })
            .unwrap();
        assert!(matches!(session, BookingSession::FormOpen { .. }));

        let (session, action) = session
            .apply(SessionEvent::FormSubmitted {
                customer: customer(),
            })
            .unwrap();
        assert!(matches!(session, BookingSession::Submitting { .. }));
        assert_eq!(
            action,
            Some(SessionAction::CreateAppointment {
                date: date("2025-06-03"),
                time: time("14:00"),
                customer: customer(),
            })
        );

        let (session, _) = session.apply(SessionEvent::BookingCreated).unwrap();
        assert_eq!(session, BookingSession::Idle);
    }

    #[test]
    fn test_no_step_can_be_skipped() {
        // Picking a day or slot before it was offered is rejected.
        let idle = BookingSession::Idle;
        assert_eq!(
            idle.apply(SessionEvent::DayPicked {
                date: date("2025-06-03"),
                slots: vec![],
            }),
            Err(SessionError::InvalidTransition)
        );
        assert_eq!(
            idle.apply(SessionEvent::SlotPicked { time: time("14:00") }),
            Err(SessionError::InvalidTransition)
        );
        assert_eq!(
            idle.apply(SessionEvent::FormSubmitted {
                customer: customer()
            }),
            Err(SessionError::InvalidTransition)
        );

        let days_offered = BookingSession::DaysOffered {
            days: vec![day("2025-06-03")],
        };
        assert_eq!(
            days_offered.apply(SessionEvent::SlotPicked { time: time("14:00") }),
            Err(SessionError::InvalidTransition)
        );
    }

    #[test]
    fn test_selection_must_come_from_offered_options() {
        let days_offered = BookingSession::DaysOffered {
            days: vec![day("2025-06-03")],
        };
        assert_eq!(
            days_offered.apply(SessionEvent::DayPicked {
                date: date("2025-06-04"),
                slots: vec![],
            }),
            Err(SessionError::UnknownOption)
        );

        let slots_offered = BookingSession::SlotsOffered {
            date: date("2025-06-03"),
            slots: vec![slot("14:00")],
        };
        assert_eq!(
            slots_offered.apply(SessionEvent::SlotPicked { time: time("15:00") }),
            Err(SessionError::UnknownOption)
        );
    }

    #[test]
    fn test_new_day_selection_cancels_pending_form() {
        let form_open = BookingSession::FormOpen {
            date: date("2025-06-03"),
            time: time("14:00"),
        };
        let (session, _) = form_open
            .apply(SessionEvent::DayPicked {
                date: date("2025-06-04"),
                slots: vec![slot("09:00")],
            })
            .unwrap();
        assert_eq!(
            session,
            BookingSession::SlotsOffered {
                date: date("2025-06-04"),
                slots: vec![slot("09:00")],
            }
        );
    }

    #[test]
    fn test_slot_conflict_returns_to_fresh_slots() {
        let submitting = BookingSession::Submitting {
            date: date("2025-06-03"),
            time: time("14:00"),
        };
        let (session, _) = submitting
            .apply(SessionEvent::SlotTaken {
                slots: vec![slot("15:00")],
            })
            .unwrap();
        assert_eq!(
            session,
            BookingSession::SlotsOffered {
                date: date("2025-06-03"),
                slots: vec![slot("15:00")],
            }
        );
    }

    #[test]
    fn test_form_cancel_and_dismiss_return_to_idle() {
        let form_open = BookingSession::FormOpen {
            date: date("2025-06-03"),
            time: time("14:00"),
        };
        let (session, _) = form_open.apply(SessionEvent::FormCancelled).unwrap();
        assert_eq!(session, BookingSession::Idle);

        for state in [
            BookingSession::Idle,
            BookingSession::DaysOffered { days: vec![] },
            BookingSession::SlotsOffered {
                date: date("2025-06-03"),
                slots: vec![],
            },
            BookingSession::FormOpen {
                date: date("2025-06-03"),
                time: time("14:00"),
            },
        ] {
            let (session, _) = state.apply(SessionEvent::FlowDismissed).unwrap();
            assert_eq!(session, BookingSession::Idle);
        }
    }

    #[test]
    fn test_days_presented_restarts_flow_from_anywhere() {
        let form_open = BookingSession::FormOpen {
            date: date("2025-06-03"),
            time: time("14:00"),
        };
        let (session, _) = form_open
            .apply(SessionEvent::DaysPresented {
                days: vec![day("2025-06-03")],
            })
            .unwrap();
        assert!(matches!(session, BookingSession::DaysOffered { .. }));
    }

    #[test]
    fn test_customer_validation() {
        assert!(customer().validate().is_ok());

        let mut c = customer();
        c.name = "  ".to_string();
        assert!(c.validate().is_err());

        let mut c = customer();
        c.email = "not-an-email".to_string();
        assert!(c.validate().is_err());

        let mut c = customer();
        c.email = "a@b".to_string();
        assert!(c.validate().is_err());
    }

    #[test]
    fn test_session_serde_round_trip() {
        let session = BookingSession::FormOpen {
            date: date("2025-06-03"),
            time: time("14:00"),
        };
        let json = serde_json::to_string(&session).unwrap();
        assert!(json.contains(r#""state":"form_open""#));
        let back: BookingSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, session);
    }
}
