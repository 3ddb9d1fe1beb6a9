use std::collections::HashMap;
use std::sync::Mutex;

use time::OffsetDateTime;
use uuid::Uuid;

use crate::models::reservation::{Reservation, ReservationInput, ReservationStatus};
use crate::repositories::reservation_repo::{ReservationStore, StoreUpdateError};

/// In-memory store backing tests and `--environment local` runs. Applies the
/// same transition rules as the postgres repo.
#[derive(Default)]
pub struct MemoryReservationRepo {
    reservations: Mutex<HashMap<Uuid, Reservation>>,
}

impl MemoryReservationRepo {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn remove(&self, id: Uuid) -> Option<Reservation> {
        self.reservations.lock().unwrap().remove(&id)
    }
}

#[async_trait::async_trait]
impl ReservationStore for MemoryReservationRepo {
    async fn create(&self, input: &ReservationInput) -> anyhow::Result<Reservation> {
        let reservation = Reservation::from_input(input);
        self.reservations
            .lock()
            .unwrap()
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Reservation>> {
        Ok(self.reservations.lock().unwrap().get(&id).cloned())
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        denial_reason: Option<&str>,
    ) -> Result<Reservation, StoreUpdateError> {
        let mut reservations = self.reservations.lock().unwrap();
        let reservation = reservations
            .get_mut(&id)
            .ok_or(StoreUpdateError::NotFound(id))?;

        if reservation.status.is_terminal() || status == ReservationStatus::Pending {
            return Err(StoreUpdateError::InvalidTransition {
                id,
                status: reservation.status,
            });
        }
        if status == ReservationStatus::Denied && denial_reason.is_none() {
            return Err(StoreUpdateError::Backend(anyhow::anyhow!(
                "Denied reservations must carry a reason"
            )));
        }

        reservation.status = status;
        reservation.denial_reason = denial_reason.map(str::to_string);
        reservation.status_changed_at = OffsetDateTime::now_utc();
        Ok(reservation.clone())
    }

    async fn list(&self) -> anyhow::Result<Vec<Reservation>> {
        Ok(self.reservations.lock().unwrap().values().cloned().collect())
    }
}
