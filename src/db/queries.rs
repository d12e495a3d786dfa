use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rusqlite::{params, Connection};

use crate::models::{
    Appointment, AppointmentSettings, AppointmentStatus, BlockedSlot, ChatMessage, Conversation,
};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M";
const DATETIME_FMT: &str = "%Y-%m-%d %H:%M:%S";

fn parse_date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, DATE_FMT).unwrap_or_else(|_| Utc::now().date_naive())
}

fn parse_time(s: &str) -> NaiveTime {
    NaiveTime::parse_from_str(s, TIME_FMT)
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .unwrap_or_else(|_| NaiveTime::from_hms_opt(0, 0, 0).unwrap())
}

fn parse_datetime(s: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(s, DATETIME_FMT).unwrap_or_else(|_| Utc::now().naive_utc())
}

// ── Appointment Settings ──

pub fn get_settings(
    conn: &Connection,
    business_id: &str,
) -> anyhow::Result<Option<AppointmentSettings>> {
    let result = conn.query_row(
        "SELECT business_id, timezone, available_days, start_hour, end_hour, default_duration,
                buffer_time, min_advance_hours, max_advance_days
         FROM appointment_settings WHERE business_id = ?1",
        params![business_id],
        |row| {
            let available_days_json: String = row.get(2)?;
            Ok(AppointmentSettings {
                business_id: row.get(0)?,
                timezone: row.get(1)?,
                available_days: serde_json::from_str(&available_days_json).unwrap_or_default(),
                start_hour: row.get(3)?,
                end_hour: row.get(4)?,
                default_duration: row.get(5)?,
                buffer_time: row.get(6)?,
                min_advance_hours: row.get(7)?,
                max_advance_days: row.get(8)?,
            })
        },
    );

    match result {
        Ok(settings) => Ok(Some(settings)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_settings(conn: &Connection, settings: &AppointmentSettings) -> anyhow::Result<()> {
    let available_days = serde_json::to_string(&settings.available_days)?;

    conn.execute(
        "INSERT INTO appointment_settings
            (business_id, timezone, available_days, start_hour, end_hour, default_duration,
             buffer_time, min_advance_hours, max_advance_days, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, datetime('now'))
         ON CONFLICT(business_id) DO UPDATE SET
           timezone = excluded.timezone,
           available_days = excluded.available_days,
           start_hour = excluded.start_hour,
           end_hour = excluded.end_hour,
           default_duration = excluded.default_duration,
           buffer_time = excluded.buffer_time,
           min_advance_hours = excluded.min_advance_hours,
           max_advance_days = excluded.max_advance_days,
           updated_at = datetime('now')",
        params![
            settings.business_id,
            settings.timezone,
            available_days,
            settings.start_hour,
            settings.end_hour,
            settings.default_duration,
            settings.buffer_time,
            settings.min_advance_hours,
            settings.max_advance_days,
        ],
    )?;
    Ok(())
}

// ── Appointments ──

const APPOINTMENT_COLUMNS: &str = "id, business_id, date, start_time, end_time, duration_minutes, \
     customer_name, customer_email, customer_phone, status, cancelled_at, cancel_reason, \
     created_at, updated_at";

fn parse_appointment_row(row: &rusqlite::Row) -> anyhow::Result<Appointment> {
    let date_str: String = row.get(2)?;
    let start_str: String = row.get(3)?;
    let end_str: String = row.get(4)?;
    let status_str: String = row.get(9)?;
    let cancelled_at_str: Option<String> = row.get(10)?;
    let created_at_str: String = row.get(12)?;
    let updated_at_str: String = row.get(13)?;

    Ok(Appointment {
        id: row.get(0)?,
        business_id: row.get(1)?,
        date: parse_date(&date_str),
        start_time: parse_time(&start_str),
        end_time: parse_time(&end_str),
        duration_minutes: row.get(5)?,
        customer_name: row.get(6)?,
        customer_email: row.get(7)?,
        customer_phone: row.get(8)?,
        status: AppointmentStatus::parse(&status_str),
        cancelled_at: cancelled_at_str.as_deref().map(parse_datetime),
        cancel_reason: row.get(11)?,
        created_at: parse_datetime(&created_at_str),
        updated_at: parse_datetime(&updated_at_str),
    })
}

pub fn insert_appointment(conn: &Connection, appointment: &Appointment) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO appointments
            (id, business_id, date, start_time, end_time, duration_minutes,
             customer_name, customer_email, customer_phone, status, cancelled_at, cancel_reason,
             created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            appointment.id,
            appointment.business_id,
            appointment.date.format(DATE_FMT).to_string(),
            appointment.start_time.format(TIME_FMT).to_string(),
            appointment.end_time.format(TIME_FMT).to_string(),
            appointment.duration_minutes,
            appointment.customer_name,
            appointment.customer_email,
            appointment.customer_phone,
            appointment.status.as_str(),
            appointment
                .cancelled_at
                .map(|t| t.format(DATETIME_FMT).to_string()),
            appointment.cancel_reason,
            appointment.created_at.format(DATETIME_FMT).to_string(),
            appointment.updated_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

/// All appointments on a date regardless of status; callers filter.
pub fn appointments_for_date(
    conn: &Connection,
    business_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE business_id = ?1 AND date = ?2 ORDER BY start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![business_id, date.format(DATE_FMT).to_string()],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn appointments_in_range(
    conn: &Connection,
    business_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<Appointment>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {APPOINTMENT_COLUMNS} FROM appointments
         WHERE business_id = ?1 AND date >= ?2 AND date <= ?3
         ORDER BY date ASC, start_time ASC"
    ))?;

    let rows = stmt.query_map(
        params![
            business_id,
            from.format(DATE_FMT).to_string(),
            to.format(DATE_FMT).to_string(),
        ],
        |row| Ok(parse_appointment_row(row)),
    )?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn get_appointment(conn: &Connection, id: &str) -> anyhow::Result<Option<Appointment>> {
    let result = conn.query_row(
        &format!("SELECT {APPOINTMENT_COLUMNS} FROM appointments WHERE id = ?1"),
        params![id],
        |row| Ok(parse_appointment_row(row)),
    );

    match result {
        Ok(appointment) => Ok(Some(appointment?)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn list_appointments(
    conn: &Connection,
    business_id: &str,
    status_filter: Option<&str>,
    limit: i64,
) -> anyhow::Result<Vec<Appointment>> {
    let (sql, params_vec): (String, Vec<Box<dyn rusqlite::types::ToSql>>) = match status_filter {
        Some(status) => (
            format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE business_id = ?1 AND status = ?2
                 ORDER BY date DESC, start_time DESC LIMIT ?3"
            ),
            vec![
                Box::new(business_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(status.to_string()),
                Box::new(limit),
            ],
        ),
        None => (
            format!(
                "SELECT {APPOINTMENT_COLUMNS} FROM appointments
                 WHERE business_id = ?1
                 ORDER BY date DESC, start_time DESC LIMIT ?2"
            ),
            vec![
                Box::new(business_id.to_string()) as Box<dyn rusqlite::types::ToSql>,
                Box::new(limit),
            ],
        ),
    };

    let mut stmt = conn.prepare(&sql)?;
    let params_refs: Vec<&dyn rusqlite::types::ToSql> =
        params_vec.iter().map(|p| p.as_ref()).collect();
    let rows = stmt.query_map(params_refs.as_slice(), |row| Ok(parse_appointment_row(row)))?;

    let mut appointments = vec![];
    for row in rows {
        appointments.push(row??);
    }
    Ok(appointments)
}

pub fn update_appointment_status(
    conn: &Connection,
    id: &str,
    status: AppointmentStatus,
    cancelled_at: Option<NaiveDateTime>,
    cancel_reason: Option<&str>,
) -> anyhow::Result<bool> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "UPDATE appointments
         SET status = ?1, cancelled_at = ?2, cancel_reason = ?3, updated_at = ?4
         WHERE id = ?5",
        params![
            status.as_str(),
            cancelled_at.map(|t| t.format(DATETIME_FMT).to_string()),
            cancel_reason,
            now,
            id,
        ],
    )?;
    Ok(count > 0)
}

pub struct AppointmentStats {
    pub upcoming_confirmed: i64,
    pub total_confirmed: i64,
    pub total_cancelled: i64,
    pub total_completed: i64,
    pub total_no_show: i64,
}

pub fn appointment_stats(conn: &Connection, business_id: &str) -> anyhow::Result<AppointmentStats> {
    let today = Utc::now().date_naive().format(DATE_FMT).to_string();

    let upcoming_confirmed: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM appointments
             WHERE business_id = ?1 AND status = 'confirmed' AND date >= ?2",
            params![business_id, today],
            |row| row.get(0),
        )
        .unwrap_or(0);

    let count_for = |status: &str| -> i64 {
        conn.query_row(
            "SELECT COUNT(*) FROM appointments WHERE business_id = ?1 AND status = ?2",
            params![business_id, status],
            |row| row.get(0),
        )
        .unwrap_or(0)
    };

    Ok(AppointmentStats {
        upcoming_confirmed,
        total_confirmed: count_for("confirmed"),
        total_cancelled: count_for("cancelled"),
        total_completed: count_for("completed"),
        total_no_show: count_for("no_show"),
    })
}

// ── Blocked Slots ──

fn parse_blocked_slot_row(row: &rusqlite::Row) -> anyhow::Result<BlockedSlot> {
    let date_str: Option<String> = row.get(2)?;
    let start_str: Option<String> = row.get(3)?;
    let end_str: Option<String> = row.get(4)?;
    let recurring_days_json: Option<String> = row.get(6)?;
    let created_at_str: String = row.get(7)?;

    Ok(BlockedSlot {
        id: row.get(0)?,
        business_id: row.get(1)?,
        date: date_str.as_deref().map(parse_date),
        start_time: start_str.as_deref().map(parse_time),
        end_time: end_str.as_deref().map(parse_time),
        is_recurring: row.get::<_, i32>(5)? != 0,
        recurring_days: recurring_days_json
            .as_deref()
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default(),
        created_at: parse_datetime(&created_at_str),
    })
}

pub fn insert_blocked_slot(conn: &Connection, slot: &BlockedSlot) -> anyhow::Result<()> {
    let recurring_days = if slot.recurring_days.is_empty() {
        None
    } else {
        Some(serde_json::to_string(&slot.recurring_days)?)
    };

    conn.execute(
        "INSERT INTO blocked_slots
            (id, business_id, date, start_time, end_time, is_recurring, recurring_days, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            slot.id,
            slot.business_id,
            slot.date.map(|d| d.format(DATE_FMT).to_string()),
            slot.start_time.map(|t| t.format(TIME_FMT).to_string()),
            slot.end_time.map(|t| t.format(TIME_FMT).to_string()),
            slot.is_recurring as i32,
            recurring_days,
            slot.created_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

/// Blocked slots that can affect any date in `[from, to]`: dated rows inside
/// the range plus every recurring row (weekday matching happens in Rust).
pub fn blocked_slots_in_range(
    conn: &Connection,
    business_id: &str,
    from: NaiveDate,
    to: NaiveDate,
) -> anyhow::Result<Vec<BlockedSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, business_id, date, start_time, end_time, is_recurring, recurring_days, created_at
         FROM blocked_slots
         WHERE business_id = ?1 AND (is_recurring = 1 OR (date >= ?2 AND date <= ?3))",
    )?;

    let rows = stmt.query_map(
        params![
            business_id,
            from.format(DATE_FMT).to_string(),
            to.format(DATE_FMT).to_string(),
        ],
        |row| Ok(parse_blocked_slot_row(row)),
    )?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

pub fn blocked_slots_for_date(
    conn: &Connection,
    business_id: &str,
    date: NaiveDate,
) -> anyhow::Result<Vec<BlockedSlot>> {
    blocked_slots_in_range(conn, business_id, date, date)
}

pub fn list_blocked_slots(conn: &Connection, business_id: &str) -> anyhow::Result<Vec<BlockedSlot>> {
    let mut stmt = conn.prepare(
        "SELECT id, business_id, date, start_time, end_time, is_recurring, recurring_days, created_at
         FROM blocked_slots WHERE business_id = ?1 ORDER BY created_at DESC",
    )?;

    let rows = stmt.query_map(params![business_id], |row| Ok(parse_blocked_slot_row(row)))?;

    let mut slots = vec![];
    for row in rows {
        slots.push(row??);
    }
    Ok(slots)
}

pub fn delete_blocked_slot(conn: &Connection, id: &str) -> anyhow::Result<bool> {
    let count = conn.execute("DELETE FROM blocked_slots WHERE id = ?1", params![id])?;
    Ok(count > 0)
}

// ── Conversations ──

pub fn get_conversation(conn: &Connection, id: &str) -> anyhow::Result<Option<Conversation>> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let result = conn.query_row(
        "SELECT id, business_id, messages, session, last_activity, expires_at
         FROM conversations WHERE id = ?1 AND expires_at > ?2",
        params![id, now],
        |row| {
            let messages_json: String = row.get(2)?;
            let session_json: String = row.get(3)?;
            let last_activity_str: String = row.get(4)?;
            let expires_at_str: String = row.get(5)?;
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                messages_json,
                session_json,
                last_activity_str,
                expires_at_str,
            ))
        },
    );

    match result {
        Ok((id, business_id, messages_json, session_json, last_activity_str, expires_at_str)) => {
            let messages: Vec<ChatMessage> =
                serde_json::from_str(&messages_json).unwrap_or_default();
            let session = serde_json::from_str(&session_json).unwrap_or_default();

            Ok(Some(Conversation {
                id,
                business_id,
                messages,
                session,
                last_activity: parse_datetime(&last_activity_str),
                expires_at: parse_datetime(&expires_at_str),
            }))
        }
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

pub fn save_conversation(conn: &Connection, conv: &Conversation) -> anyhow::Result<()> {
    let messages = serde_json::to_string(&conv.messages)?;
    let session = serde_json::to_string(&conv.session)?;

    conn.execute(
        "INSERT INTO conversations (id, business_id, messages, session, last_activity, expires_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
           messages = excluded.messages,
           session = excluded.session,
           last_activity = excluded.last_activity,
           expires_at = excluded.expires_at",
        params![
            conv.id,
            conv.business_id,
            messages,
            session,
            conv.last_activity.format(DATETIME_FMT).to_string(),
            conv.expires_at.format(DATETIME_FMT).to_string(),
        ],
    )?;
    Ok(())
}

pub fn expire_old_conversations(conn: &Connection) -> anyhow::Result<usize> {
    let now = Utc::now().naive_utc().format(DATETIME_FMT).to_string();
    let count = conn.execute(
        "DELETE FROM conversations WHERE expires_at <= ?1",
        params![now],
    )?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::models::BookingSession;

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

    #[test]
    fn test_settings_round_trip() {
        let conn = setup_db();
        assert!(get_settings(&conn, "default").unwrap().is_none());

        save_settings(&conn, &settings()).unwrap();
        let loaded = get_settings(&conn, "default").unwrap().unwrap();
        assert_eq!(loaded.timezone, "America/Chicago");
        assert_eq!(loaded.available_days, vec![1, 2, 3, 4, 5]);

        // Upsert updates in place.
        let mut changed = settings();
        changed.end_hour = 18;
        save_settings(&conn, &changed).unwrap();
        let loaded = get_settings(&conn, "default").unwrap().unwrap();
        assert_eq!(loaded.end_hour, 18);
    }

    #[test]
    fn test_appointments_partition_by_business_and_date() {
        let conn = setup_db();
        let now = Utc::now().naive_utc();
        let base = Appointment {
            id: "a1".to_string(),
            business_id: "default".to_string(),
            date: NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            start_time: NaiveTime::from_hms_opt(10, 0, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(10, 30, 0).unwrap(),
            duration_minutes: 30,
            customer_name: "Alice".to_string(),
            customer_email: "alice@example.com".to_string(),
            customer_phone: None,
            status: AppointmentStatus::Confirmed,
            cancelled_at: None,
            cancel_reason: None,
            created_at: now,
            updated_at: now,
        };
        insert_appointment(&conn, &base).unwrap();
        insert_appointment(
            &conn,
            &Appointment {
                id: "a2".to_string(),
                business_id: "other".to_string(),
                ..base.clone()
            },
        )
        .unwrap();

        let found =
            appointments_for_date(&conn, "default", NaiveDate::from_ymd_opt(2025, 6, 16).unwrap())
                .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, "a1");
        assert_eq!(found[0].start_time, NaiveTime::from_hms_opt(10, 0, 0).unwrap());
    }

    #[test]
    fn test_conversation_round_trip_and_expiry() {
        let conn = setup_db();
        let mut conv = Conversation::new("c1", "default");
        conv.messages.push(ChatMessage::user("hi"));
        save_conversation(&conn, &conv).unwrap();

        let loaded = get_conversation(&conn, "c1").unwrap().unwrap();
        assert_eq!(loaded.messages.len(), 1);
        assert_eq!(loaded.session, BookingSession::Idle);

        // An expired conversation is invisible and gets swept.
        conv.expires_at = Utc::now().naive_utc() - chrono::Duration::minutes(1);
        save_conversation(&conn, &conv).unwrap();
        assert!(get_conversation(&conn, "c1").unwrap().is_none());
        assert_eq!(expire_old_conversations(&conn).unwrap(), 1);
    }

    #[test]
    fn test_blocked_slot_range_includes_recurring() {
        let conn = setup_db();
        let created_at = Utc::now().naive_utc();
        insert_blocked_slot(
            &conn,
            &BlockedSlot {
                id: "b1".to_string(),
                business_id: "default".to_string(),
                date: Some(NaiveDate::from_ymd_opt(2025, 12, 25).unwrap()),
                start_time: None,
                end_time: None,
                is_recurring: false,
                recurring_days: vec![],
                created_at,
            },
        )
        .unwrap();
        insert_blocked_slot(
            &conn,
            &BlockedSlot {
                id: "b2".to_string(),
                business_id: "default".to_string(),
                date: None,
                start_time: NaiveTime::from_hms_opt(12, 0, 0),
                end_time: NaiveTime::from_hms_opt(13, 0, 0),
                is_recurring: true,
                recurring_days: vec![2],
                created_at,
            },
        )
        .unwrap();

        // A June window excludes the December date but keeps the recurring row.
        let slots = blocked_slots_in_range(
            &conn,
            "default",
            NaiveDate::from_ymd_opt(2025, 6, 16).unwrap(),
            NaiveDate::from_ymd_opt(2025, 6, 30).unwrap(),
        )
        .unwrap();
        assert_eq!(slots.len(), 1);
        assert_eq!(slots[0].id, "b2");
        assert_eq!(slots[0].recurring_days, vec![2]);

        assert!(delete_blocked_slot(&conn, "b2").unwrap());
        assert!(!delete_blocked_slot(&conn, "b2").unwrap());
    }
}
