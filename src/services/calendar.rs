use crate::models::Appointment;

pub fn generate_ics(appointment: &Appointment, business_name: &str) -> String {
    let dtstart = appointment
        .date
        .and_time(appointment.start_time)
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtend = appointment
        .date
        .and_time(appointment.end_time)
        .format("%Y%m%dT%H%M%S")
        .to_string();
    let dtstamp = appointment.created_at.format("%Y%m%dT%H%M%S").to_string();
    let uid = format!("{}@frontdesk", appointment.id);

    let summary = format!("Appointment with {}", business_name);
    let description = format!("Booked for {}", appointment.customer_name);

    format!(
        "BEGIN:VCALENDAR\r\n\
         VERSION:2.0\r\n\
         PRODID:-//Frontdesk//Booking Widget//EN\r\n\
         BEGIN:VEVENT\r\n\
         UID:{uid}\r\n\
         DTSTAMP:{dtstamp}\r\n\
         DTSTART:{dtstart}\r\n\
         DTEND:{dtend}\r\n\
         SUMMARY:{summary}\r\n\
         DESCRIPTION:{description}\r\n\
         END:VEVENT\r\n\
         END:VCALENDAR\r\n"
    )
}
