use anyhow::anyhow;
use bb8_postgres::bb8::{Pool, PooledConnection};
use bb8_postgres::tokio_postgres::{NoTls, Row};
use bb8_postgres::PostgresConnectionManager;
use time::OffsetDateTime;
use tracing::warn;
use uuid::Uuid;

use crate::models::reservation::{Reservation, ReservationInput, ReservationStatus};
use crate::repositories::reservation_repo::{ReservationStore, StoreUpdateError};

pub const RETRY_LIMIT: usize = 5;

pub struct PostgresReservationRepo {
    postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
}

impl PostgresReservationRepo {
    pub fn new(
        postgres_connection: Pool<PostgresConnectionManager<NoTls>>,
    ) -> Self {
        Self {
            postgres_connection
        }
    }

    async fn get_postgres_connection(
        &self,
    ) -> anyhow::Result<PooledConnection<PostgresConnectionManager<NoTls>>> {
        for _ in 0..RETRY_LIMIT {
            match self.postgres_connection.get().await {
                Ok(conn) => return Ok(conn),
                Err(e) => {
                    warn!("Failed to retrieve postgres connection due to: {}, retrying in 3s", e);
                    tokio::time::sleep(tokio::time::Duration::from_secs(3)).await;
                    continue;
                }
            }
        }

        return Err(anyhow!("Failed to retrieve a valid connection from postgres pool, BAILING"));
    }
}

#[async_trait::async_trait]
impl ReservationStore for PostgresReservationRepo {
    async fn create(&self, input: &ReservationInput) -> anyhow::Result<Reservation> {
        let conn = self.get_postgres_connection().await?;
        let reservation = Reservation::from_input(input);

        conn.execute(
            "INSERT INTO reservations \
                (id, name, email, phone, date, time, diners, seating, pickup, \
                 status, denial_reason, token, created_at, status_changed_at) \
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14);",
            &[
                &reservation.id,
                &reservation.name,
                &reservation.email,
                &reservation.phone,
                &reservation.date,
                &reservation.time,
                &reservation.diners,
                &reservation.seating,
                &reservation.pickup,
                &reservation.status.as_str(),
                &reservation.denial_reason,
                &reservation.token,
                &reservation.created_at,
                &reservation.status_changed_at,
            ],
        ).await?;

        Ok(reservation)
    }

    async fn get(&self, id: Uuid) -> anyhow::Result<Option<Reservation>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query("SELECT * FROM reservations where id = $1 limit 1;", &[&id])
            .await?;

        return match rows.into_iter().next() {
            Some(row) => Ok(Some(parse_row_into_reservation(row)?)),
            None => Ok(None),
        };
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: ReservationStatus,
        denial_reason: Option<&str>,
    ) -> Result<Reservation, StoreUpdateError> {
        let conn = self.get_postgres_connection().await?;

        // The status guard makes the decision a single atomic compare-and-set,
        // a row that already left Pending is never touched.
        let rows = conn
            .query(
                "UPDATE reservations \
                    SET status = $2, denial_reason = $3, status_changed_at = $4 \
                    where id = $1 and status = 'Pending' \
                    RETURNING *;",
                &[
                    &id,
                    &status.as_str(),
                    &denial_reason,
                    &OffsetDateTime::now_utc(),
                ],
            )
            .await
            .map_err(|e| StoreUpdateError::Backend(e.into()))?;

        if let Some(row) = rows.into_iter().next() {
            return Ok(parse_row_into_reservation(row)?);
        }

        let existing = conn
            .query("SELECT status FROM reservations where id = $1 limit 1;", &[&id])
            .await
            .map_err(|e| StoreUpdateError::Backend(e.into()))?;

        return match existing.into_iter().next() {
            Some(row) => {
                let status = ReservationStatus::from_db(row.get("status"))?;
                Err(StoreUpdateError::InvalidTransition { id, status })
            }
            None => Err(StoreUpdateError::NotFound(id)),
        };
    }

    async fn list(&self) -> anyhow::Result<Vec<Reservation>> {
        let conn = self.get_postgres_connection().await?;
        let rows = conn
            .query("SELECT * FROM reservations order by date, time;", &[])
            .await?;

        let mut reservations: Vec<Reservation> = Vec::new();
        for row in rows {
            reservations.push(parse_row_into_reservation(row)?);
        }
        Ok(reservations)
    }
}

fn parse_row_into_reservation(
    row: Row,
) -> anyhow::Result<Reservation> {
    Ok(Reservation {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone: row.get("phone"),
        date: row.get("date"),
        time: row.get("time"),
        diners: row.get("diners"),
        seating: row.get("seating"),
        pickup: row.get("pickup"),
        status: ReservationStatus::from_db(row.get("status"))?,
        denial_reason: row.get("denial_reason"),
        token: row.get("token"),
        created_at: row.get("created_at"),
        status_changed_at: row.get("status_changed_at"),
    })
}
