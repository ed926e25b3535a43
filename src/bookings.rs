//! Table bookings.
//!
//! Older booking rows carry the customer's contact details inside the free-text `notes` column,
//! one `Prefix: value` per line. New rows use dedicated columns; the parser below is only kept
//! for reading the legacy rows.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::BookingEntity;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct ContactDetails {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub message: Option<String>,
}

enum Field {
    Name,
    Email,
    Phone,
    Message,
}

fn field_for(prefix: &str) -> Option<Field> {
    match prefix.trim().to_lowercase().as_str() {
        "namn" | "name" | "kund" => Some(Field::Name),
        "e-post" | "epost" | "email" | "e-mail" | "mail" => Some(Field::Email),
        "telefon" | "tel" | "phone" | "mobil" => Some(Field::Phone),
        "meddelande" | "message" | "övrigt" | "kommentar" => Some(Field::Message),
        _ => None,
    }
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

/// Parses a legacy `notes` blob.
///
/// Lines with an unknown or missing prefix are treated as part of the free-text message, so a
/// blob that never followed the convention still surfaces as a message.
pub fn parse_legacy_notes(notes: &str) -> ContactDetails {
    let mut details = ContactDetails::default();
    let mut message_lines: Vec<String> = Vec::new();

    for line in notes.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let parsed = line
            .split_once(':')
            .and_then(|(prefix, value)| field_for(prefix).map(|field| (field, value)));

        match parsed {
            Some((Field::Name, value)) => details.name = non_empty(value).or(details.name),
            Some((Field::Email, value)) => details.email = non_empty(value).or(details.email),
            Some((Field::Phone, value)) => details.phone = non_empty(value).or(details.phone),
            Some((Field::Message, value)) => message_lines.extend(non_empty(value)),
            None => message_lines.push(line.to_string()),
        }
    }

    if !message_lines.is_empty() {
        details.message = Some(message_lines.join("\n"));
    }
    details
}

/// A booking as returned by the booking read API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct BookingView {
    pub id: i32,
    pub date: NaiveDate,
    pub time: String,
    pub guests: i32,
    pub location: String,
    pub status: String,
    /// Only included for staff.
    pub contact: Option<ContactDetails>,
    pub created_at: DateTime<Utc>,
}

impl BookingView {
    pub fn new(booking: BookingEntity, with_contact: bool) -> Self {
        let contact = with_contact.then(|| booking.contact());
        Self {
            id: booking.id,
            date: booking.date,
            time: booking.time,
            guests: booking.guests,
            location: booking.location,
            status: booking.status,
            contact,
            created_at: booking.created_at,
        }
    }
}
