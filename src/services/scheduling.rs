//! Appointment store operations. `create_appointment` is the only write path
//! that can introduce a booking, and it re-derives availability inside the
//! write transaction; a slot list shown earlier is never trusted. Together
//! with the serialized connection this makes conflict-check + insert atomic,
//! so two customers racing for one slot produce exactly one confirmed row.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use rusqlite::Connection;
use uuid::Uuid;

use crate::db::queries;
use crate::models::{
    Appointment, AppointmentSettings, AppointmentStatus, CustomerDetails, DayOption, SlotOption,
};
use crate::services::availability::{self, minute_of_day, time_from_minute};

#[derive(Debug, thiserror::Error)]
pub enum SchedulingError {
    #[error("that time slot is no longer available")]
    SlotConflict,

    #[error("appointment is already {0}")]
    InvalidTransition(&'static str),

    #[error("appointment not found")]
    NotFound,

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

/// Book a slot for a customer. Fails with `SlotConflict` when the requested
/// start is not in the freshly recomputed free list, whether it was taken
/// by a faster customer, newly blocked, or never valid at all.
pub fn create_appointment(
    conn: &mut Connection,
    settings: &AppointmentSettings,
    date: NaiveDate,
    start_time: NaiveTime,
    customer: &CustomerDetails,
    now: DateTime<Utc>,
) -> Result<Appointment, SchedulingError> {
    let tx = conn.transaction()?;

    let appointments = queries::appointments_for_date(&tx, &settings.business_id, date)?;
    let blocked = queries::blocked_slots_for_date(&tx, &settings.business_id, date)?;

    let open = availability::free_slots(settings, &appointments, &blocked, date, now);
    if !open.iter().any(|slot| slot.time == start_time) {
        return Err(SchedulingError::SlotConflict);
    }

    let created_at = now.naive_utc();
    let appointment = Appointment {
        id: Uuid::new_v4().to_string(),
        business_id: settings.business_id.clone(),
        date,
        start_time,
        end_time: time_from_minute(minute_of_day(start_time) + settings.default_duration),
        duration_minutes: settings.default_duration,
        customer_name: customer.name.trim().to_string(),
        customer_email: customer.email.trim().to_string(),
        customer_phone: customer.phone.clone(),
        status: AppointmentStatus::Confirmed,
        cancelled_at: None,
        cancel_reason: None,
        created_at,
        updated_at: created_at,
    };

    queries::insert_appointment(&tx, &appointment)?;
    tx.commit()?;

    tracing::info!(
        appointment_id = %appointment.id,
        business_id = %appointment.business_id,
        date = %appointment.date,
        start = %appointment.start_time,
        "appointment created"
    );
    Ok(appointment)
}

/// Cancel a confirmed appointment. Any other current status is terminal and
/// yields `InvalidTransition`; rows are never deleted.
pub fn cancel_appointment(
    conn: &Connection,
    id: &str,
    reason: Option<&str>,
) -> Result<Appointment, SchedulingError> {
    let appointment = queries::get_appointment(conn, id)?.ok_or(SchedulingError::NotFound)?;

    if appointment.status != AppointmentStatus::Confirmed {
        return Err(SchedulingError::InvalidTransition(
            appointment.status.as_str(),
        ));
    }

    let cancelled_at = Utc::now().naive_utc();
    queries::update_appointment_status(
        conn,
        id,
        AppointmentStatus::Cancelled,
        Some(cancelled_at),
        reason,
    )?;

    let updated = queries::get_appointment(conn, id)?.ok_or(SchedulingError::NotFound)?;
    tracing::info!(appointment_id = %id, reason = ?reason, "appointment cancelled");
    Ok(updated)
}

/// Record the outcome of a past appointment: completed or no-show.
pub fn finish_appointment(
    conn: &Connection,
    id: &str,
    outcome: AppointmentStatus,
) -> Result<Appointment, SchedulingError> {
    if !matches!(
        outcome,
        AppointmentStatus::Completed | AppointmentStatus::NoShow
    ) {
        return Err(SchedulingError::InvalidTransition(outcome.as_str()));
    }

    let appointment = queries::get_appointment(conn, id)?.ok_or(SchedulingError::NotFound)?;
    if appointment.status != AppointmentStatus::Confirmed {
        return Err(SchedulingError::InvalidTransition(
            appointment.status.as_str(),
        ));
    }

    queries::update_appointment_status(conn, id, outcome, None, None)?;
    let updated = queries::get_appointment(conn, id)?.ok_or(SchedulingError::NotFound)?;
    Ok(updated)
}

/// Bookable days over the whole horizon, backed by live store data.
pub fn day_options(
    conn: &Connection,
    settings: &AppointmentSettings,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<DayOption>> {
    let today = availability::business_today(settings, now);
    let horizon = today + chrono::Duration::days(settings.max_advance_days);

    let appointments =
        queries::appointments_in_range(conn, &settings.business_id, today, horizon)?;
    let blocked = queries::blocked_slots_in_range(conn, &settings.business_id, today, horizon)?;

    Ok(availability::available_days(
        settings,
        &appointments,
        &blocked,
        now,
    ))
}

/// Fresh free slots for one date, backed by live store data.
pub fn slot_options(
    conn: &Connection,
    settings: &AppointmentSettings,
    date: NaiveDate,
    now: DateTime<Utc>,
) -> anyhow::Result<Vec<SlotOption>> {
    let appointments = queries::appointments_for_date(conn, &settings.business_id, date)?;
    let blocked = queries::blocked_slots_for_date(conn, &settings.business_id, date)?;

    Ok(availability::free_slots(
        settings,
        &appointments,
        &blocked,
        date,
        now,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::BlockedSlot;
    use chrono::TimeZone;
    use chrono_tz::Tz;

    fn setup_db() -> Connection {
        db::init_db(":memory:").unwrap()
    }

    fn settings() -> AppointmentSettings {
        AppointmentSettings {
            business_id: "default".to_string(),
            timezone: "America/Chicago".to_string(),
            available_days: vec![1, 2, 3, 4, 5],
            start_hour: 9,
            end_hour: 17,
            default_duration: 30,
            buffer_time: 0,
            min_advance_hours: 2,
            max_advance_days: 14,
        }
    }

    fn customer() -> CustomerDetails {
        CustomerDetails {
            name: "Alice".to_string(),
            email: "alice@example.com".to_string(),
            phone: Some("+15551110000".to_string()),
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn time(s: &str) -> NaiveTime {
        NaiveTime::parse_from_str(s, "%H:%M").unwrap()
    }

    fn now() -> DateTime<Utc> {
        // Friday morning, well before the Monday slots used below.
        let tz: Tz = "America/Chicago".parse().unwrap();
        tz.with_ymd_and_hms(2025, 6, 13, 9, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_create_books_an_offered_slot() {
        let mut conn = setup_db();
        let appointment = create_appointment(
            &mut conn,
            &settings(),
            date("2025-06-16"),
            time("14:00"),
            &customer(),
            now(),
        )
        .unwrap();

        assert_eq!(appointment.status, AppointmentStatus::Confirmed);
        assert_eq!(appointment.end_time, time("14:30"));
        assert_eq!(appointment.duration_minutes, 30);

        // The booked slot is gone from the next read.
        let open = slot_options(&conn, &settings(), date("2025-06-16"), now()).unwrap();
        assert!(!open.iter().any(|s| s.time == time("14:00")));
        assert!(open.iter().any(|s| s.time == time("14:30")));
    }

    #[test]
    fn test_losing_the_race_yields_slot_conflict() {
        let mut conn = setup_db();
        create_appointment(
            &mut conn,
            &settings(),
            date("2025-06-16"),
            time("14:00"),
            &customer(),
            now(),
        )
        .unwrap();

        let second = create_appointment(
            &mut conn,
            &settings(),
            date("2025-06-16"),
            time("14:00"),
            &customer(),
            now(),
        );
        assert!(matches!(second, Err(SchedulingError::SlotConflict)));

        // Exactly one confirmed row exists.
        let rows = queries::appointments_for_date(&conn, "default", date("2025-06-16")).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_create_rejects_slot_inside_blocked_window() {
        let mut conn = setup_db();
        queries::insert_blocked_slot(
            &conn,
            &BlockedSlot {
                id: "b1".to_string(),
                business_id: "default".to_string(),
                date: Some(date("2025-06-16")),
                start_time: Some(time("12:00")),
                end_time: Some(time("13:00")),
                is_recurring: false,
                recurring_days: vec![],
                created_at: Utc::now().naive_utc(),
            },
        )
        .unwrap();

        let result = create_appointment(
            &mut conn,
            &settings(),
            date("2025-06-16"),
            time("12:30"),
            &customer(),
            now(),
        );
        assert!(matches!(result, Err(SchedulingError::SlotConflict)));
    }

    #[test]
    fn test_create_rejects_off_grid_time() {
        let mut conn = setup_db();
        let result = create_appointment(
            &mut conn,
            &settings(),
            date("2025-06-16"),
            time("14:10"),
            &customer(),
            now(),
        );
        assert!(matches!(result, Err(SchedulingError::SlotConflict)));
    }

    #[test]
    fn test_cancel_reopens_the_slot() {
        let mut conn = setup_db();
        let appointment = create_appointment(
            &mut conn,
            &settings(),
            date("2025-06-16"),
            time("14:00"),
            &customer(),
            now(),
        )
        .unwrap();

        let cancelled =
            cancel_appointment(&conn, &appointment.id, Some("customer asked")).unwrap();
        assert_eq!(cancelled.status, AppointmentStatus::Cancelled);
        assert!(cancelled.cancelled_at.is_some());
        assert_eq!(cancelled.cancel_reason.as_deref(), Some("customer asked"));

        let open = slot_options(&conn, &settings(), date("2025-06-16"), now()).unwrap();
        assert!(open.iter().any(|s| s.time == time("14:00")));
    }

    #[test]
    fn test_cancel_is_only_legal_from_confirmed() {
        let mut conn = setup_db();
        let appointment = create_appointment(
            &mut conn,
            &settings(),
            date("2025-06-16"),
            time("14:00"),
            &customer(),
            now(),
        )
        .unwrap();

        cancel_appointment(&conn, &appointment.id, None).unwrap();
        let again = cancel_appointment(&conn, &appointment.id, None);
        assert!(matches!(
            again,
            Err(SchedulingError::InvalidTransition("cancelled"))
        ));

        let missing = cancel_appointment(&conn, "nope", None);
        assert!(matches!(missing, Err(SchedulingError::NotFound)));
    }

    #[test]
    fn test_finish_appointment_outcomes() {
        let mut conn = setup_db();
        let appointment = create_appointment(
            &mut conn,
            &settings(),
            date("2025-06-16"),
            time("14:00"),
            &customer(),
            now(),
        )
        .unwrap();

        let done =
            finish_appointment(&conn, &appointment.id, AppointmentStatus::Completed).unwrap();
        assert_eq!(done.status, AppointmentStatus::Completed);

        // Terminal now; a no-show mark is rejected.
        let result = finish_appointment(&conn, &appointment.id, AppointmentStatus::NoShow);
        assert!(matches!(result, Err(SchedulingError::InvalidTransition(_))));

        // Cancelled is not an outcome this path accepts.
        let result = finish_appointment(&conn, &appointment.id, AppointmentStatus::Cancelled);
        assert!(matches!(result, Err(SchedulingError::InvalidTransition(_))));
    }

    #[test]
    fn test_day_options_reflect_store_contents() {
        let mut conn = setup_db();
        let days = day_options(&conn, &settings(), now()).unwrap();
        assert!(days.iter().any(|d| d.date == date("2025-06-16")));

        // Book out the entire Monday: 16 half-hour slots.
        let mut minute = 9 * 60;
        while minute + 30 <= 17 * 60 {
            create_appointment(
                &mut conn,
                &settings(),
                date("2025-06-16"),
                time_from_minute(minute),
                &customer(),
                now(),
            )
            .unwrap();
            minute += 30;
        }

        let days = day_options(&conn, &settings(), now()).unwrap();
        assert!(!days.iter().any(|d| d.date == date("2025-06-16")));
        assert!(days.iter().any(|d| d.date == date("2025-06-17")));
    }
}
