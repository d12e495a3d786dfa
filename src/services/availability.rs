//! Pure slot math: business hours + existing appointments + blocked slots
//! in, bookable days and times out. No I/O here; callers fetch the rows and
//! pass `now` in, so everything is deterministic under test.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc};

use crate::models::{Appointment, AppointmentSettings, BlockedSlot, DayOption, SlotOption};

pub(crate) fn minute_of_day(time: NaiveTime) -> i64 {
    (time.hour() * 60 + time.minute()) as i64
}

pub(crate) fn time_from_minute(minute: i64) -> NaiveTime {
    // A slot ending exactly at a midnight close is stored as 23:59:59.
    if minute >= 24 * 60 {
        return NaiveTime::from_hms_opt(23, 59, 59).unwrap();
    }
    NaiveTime::from_hms_opt((minute / 60) as u32, (minute % 60) as u32, 0).unwrap()
}

/// Today's date on the business's wall clock.
pub fn business_today(settings: &AppointmentSettings, now: DateTime<Utc>) -> NaiveDate {
    now.with_timezone(&settings.tz()).date_naive()
}

/// Every surviving slot for `date`, chronological. Rules, in order: the date
/// must be bookable at all (weekday, not past, not fully blocked); raw starts
/// advance by `default_duration + buffer_time` so offered slots keep the
/// mandatory gap between each other; a slot is dropped when it starts before
/// `now + min_advance_hours`, when it overlaps a confirmed appointment
/// expanded by the buffer on both sides, or when it overlaps a partial block.
/// The trailing partial slot is dropped, never truncated.
pub fn free_slots(
    settings: &AppointmentSettings,
    appointments: &[Appointment],
    blocked: &[BlockedSlot],
    date: NaiveDate,
    now: DateTime<Utc>,
) -> Vec<SlotOption> {
    let tz = settings.tz();

    if date < business_today(settings, now) {
        return vec![];
    }
    if !settings.accepts_weekday(date.weekday()) {
        return vec![];
    }

    let day_blocks: Vec<&BlockedSlot> = blocked.iter().filter(|b| b.applies_on(date)).collect();
    if day_blocks.iter().any(|b| b.blocks_whole_day()) {
        return vec![];
    }

    let earliest = now + Duration::hours(settings.min_advance_hours);

    let busy: Vec<(i64, i64)> = appointments
        .iter()
        .filter(|a| a.date == date && a.blocks_slot())
        .map(|a| {
            (
                minute_of_day(a.start_time) - settings.buffer_time,
                minute_of_day(a.end_time) + settings.buffer_time,
            )
        })
        .collect();

    let windows: Vec<(i64, i64)> = day_blocks
        .iter()
        .filter_map(|b| b.interval())
        .map(|(start, end)| (minute_of_day(start), minute_of_day(end)))
        .collect();

    let day_end = settings.end_hour as i64 * 60;
    let duration = settings.default_duration;
    let step = duration + settings.buffer_time;

    let mut slots = Vec::new();
    let mut start = settings.start_hour as i64 * 60;
    while start + duration <= day_end {
        let end = start + duration;
        let candidate = start;
        start += step;

        // Wall-clock time → instant; times erased by a DST gap don't exist.
        let local = date.and_time(time_from_minute(candidate));
        let slot_start = match tz.from_local_datetime(&local) {
            chrono::LocalResult::Single(t) => t,
            chrono::LocalResult::Ambiguous(t, _) => t,
            chrono::LocalResult::None => continue,
        };

        if slot_start.with_timezone(&Utc) < earliest {
            continue;
        }
        if busy.iter().any(|&(bs, be)| candidate < be && end > bs) {
            continue;
        }
        if windows.iter().any(|&(ws, we)| candidate < we && end > ws) {
            continue;
        }

        let time = time_from_minute(candidate);
        slots.push(SlotOption {
            time,
            display: time.format("%-I:%M %p").to_string(),
        });
    }
    slots
}

/// Days in the booking horizon with at least one free slot. A weekday-eligible
/// date drops out once whole-day blocks, bookings, or the advance-notice
/// cutoff leave nothing open on it.
pub fn available_days(
    settings: &AppointmentSettings,
    appointments: &[Appointment],
    blocked: &[BlockedSlot],
    now: DateTime<Utc>,
) -> Vec<DayOption> {
    let today = business_today(settings, now);

    let mut days = Vec::new();
    for offset in 0..=settings.max_advance_days {
        let date = today + Duration::days(offset);
        if free_slots(settings, appointments, blocked, date, now).is_empty() {
            continue;
        }
        days.push(DayOption {
            date,
            display: date.format("%b %-d").to_string(),
            day_name: date.format("%A").to_string(),
        });
    }
    days
}
