use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::reservation::{Reservation, ReservationInput, ReservationStatus};

#[derive(Debug, Error)]
pub enum StoreUpdateError {
    #[error("Reservation {0} not found")]
    NotFound(Uuid),

    #[error("Reservation {id} is already {status:?} and cannot change")]
    InvalidTransition { id: Uuid, status: ReservationStatus },

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

/// Durable record of reservations. Writes are atomic per reservation and the
/// transition table is enforced here: only Pending rows may move, and only to
/// Confirmed or Denied (the latter with a reason).
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn create(&self, input: &ReservationInput) -> anyhow::Result<Reservation>;

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Reservation>>;

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        denial_reason: Option<&str>,
    ) -> Result<Reservation, StoreUpdateError>;

    async fn list(&self) -> anyhow::Result<Vec<Reservation>>;
}
