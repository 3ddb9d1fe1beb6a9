use anyhow::anyhow;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReservationStatus {
    Pending,
    Confirmed,
    Denied,
}

impl ReservationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "Pending",
            ReservationStatus::Confirmed => "Confirmed",
            ReservationStatus::Denied => "Denied",
        }
    }

    pub fn from_db(value: &str) -> anyhow::Result<Self> {
        match value {
            "Pending" => Ok(ReservationStatus::Pending),
            "Confirmed" => Ok(ReservationStatus::Confirmed),
            "Denied" => Ok(ReservationStatus::Denied),
            other => Err(anyhow!("Unknown reservation status in store: {}", other)),
        }
    }

    /// Confirmed and Denied are terminal, only Pending reservations can still change.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ReservationStatus::Pending)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Reservation {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date: String,
    pub time: String,
    pub diners: String,
    pub seating: String,
    pub pickup: String,
    pub status: ReservationStatus,
    pub denial_reason: Option<String>,
    pub token: Uuid,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub status_changed_at: OffsetDateTime,
}

impl Reservation {
    pub fn from_input(input: &ReservationInput) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            name: input.name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            date: input.date.clone(),
            time: input.time.clone(),
            diners: input.diners.clone(),
            seating: input.seating.clone(),
            pickup: input.pickup.clone(),
            status: ReservationStatus::Pending,
            denial_reason: None,
            token: Uuid::new_v4(),
            created_at: now,
            status_changed_at: now,
        }
    }
}

/// Intake payload. Absent fields deserialize to empty strings so that
/// presence checking happens in one place, `missing_field`.
#[derive(Serialize, Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct ReservationInput {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub date: String,
    pub time: String,
    pub diners: String,
    pub seating: String,
    pub pickup: String,
}

impl ReservationInput {
    /// Fields are opaque to the workflow, only presence is checked here.
    pub fn missing_field(&self) -> Option<&'static str> {
        let fields = [
            ("name", &self.name),
            ("email", &self.email),
            ("phone", &self.phone),
            ("date", &self.date),
            ("time", &self.time),
            ("diners", &self.diners),
            ("seating", &self.seating),
            ("pickup", &self.pickup),
        ];

        for (name, value) in fields {
            if value.trim().is_empty() {
                return Some(name);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_input() -> ReservationInput {
        ReservationInput {
            name: "A".to_string(),
            email: "a@x.com".to_string(),
            phone: "555".to_string(),
            date: "2025-01-10".to_string(),
            time: "7:00 PM".to_string(),
            diners: "2".to_string(),
            seating: "inside".to_string(),
            pickup: "no".to_string(),
        }
    }

    #[test]
    fn new_reservation_starts_pending() {
        let reservation = Reservation::from_input(&sample_input());
        assert_eq!(reservation.status, ReservationStatus::Pending);
        assert!(reservation.denial_reason.is_none());
        assert_ne!(reservation.id, reservation.token);
    }

    #[test]
    fn missing_field_reports_first_empty_one() {
        let mut input = sample_input();
        assert_eq!(input.missing_field(), None);

        input.phone = "  ".to_string();
        assert_eq!(input.missing_field(), Some("phone"));
    }

    #[test]
    fn status_round_trips_through_db_repr() {
        for status in [
            ReservationStatus::Pending,
            ReservationStatus::Confirmed,
            ReservationStatus::Denied,
        ] {
            assert_eq!(ReservationStatus::from_db(status.as_str()).unwrap(), status);
        }
        assert!(ReservationStatus::from_db("Cancelled").is_err());
    }
}
