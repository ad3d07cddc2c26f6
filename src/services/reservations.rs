//! reservations.rs
//!
//! Seat booking and cancellation.
//!
//! Two invariants are kept here:
//! - a `(row, seat, session)` triple holds at most one ticket;
//! - a reservation exists exactly as long as it has at least one ticket.
//!
//! Seats are 1-indexed and bounded inclusively by the dome's grid. The
//! store's uniqueness constraint is the authoritative double-booking guard;
//! the `seat_taken` lookup only produces the friendly error early.

use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::middleware::AuthUser;
use crate::models::{PlanetariumDome, Reservation, TicketDetail, TicketRequest};
use crate::store::{BookingTx, PlanetariumStore, StoreError, SEAT_UNIQUE_CONSTRAINT};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeatAxis {
    Row,
    Seat,
}

impl fmt::Display for SeatAxis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeatAxis::Row => write!(f, "row"),
            SeatAxis::Seat => write!(f, "seat"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error("row and seat must not be negative (got row {row}, seat {seat})")]
    NegativeCoordinate { row: i32, seat: i32 },
    #[error("{axis} must be in range [1, {max}], got {value}")]
    OutOfRange { axis: SeatAxis, value: i32, max: i32 },
    #[error("seat {seat} in row {row} is already taken for show session {session_id}")]
    SeatTaken { session_id: i64, row: i32, seat: i32 },
    #[error("show session {0} does not exist")]
    UnknownSession(i64),
    #[error("reservation {0} does not exist")]
    UnknownReservation(i64),
    #[error("ticket {0} not found")]
    NotFound(i64),
    #[error("you do not have permission to modify this {0}")]
    Forbidden(&'static str),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Checks `(row, seat)` against the dome's grid.
///
/// Negative coordinates are reported as such before any range check.
pub fn validate_seat(dome: &PlanetariumDome, row: i32, seat: i32) -> Result<(), BookingError> {
    if row < 0 || seat < 0 {
        return Err(BookingError::NegativeCoordinate { row, seat });
    }
    if !(1..=dome.rows).contains(&row) {
        return Err(BookingError::OutOfRange {
            axis: SeatAxis::Row,
            value: row,
            max: dome.rows,
        });
    }
    if !(1..=dome.seats_in_row).contains(&seat) {
        return Err(BookingError::OutOfRange {
            axis: SeatAxis::Seat,
            value: seat,
            max: dome.seats_in_row,
        });
    }
    Ok(())
}

/// Returns the reservation the next ticket should join.
///
/// With `reservation_id` the caller's existing reservation is locked and
/// reused; without it a fresh reservation owned by the caller is created.
pub async fn find_or_create_open_reservation(
    tx: &mut dyn BookingTx,
    user: &AuthUser,
    reservation_id: Option<i64>,
) -> Result<Reservation, BookingError> {
    match reservation_id {
        Some(id) => {
            let reservation = tx
                .lock_reservation(id)
                .await?
                .ok_or(BookingError::UnknownReservation(id))?;
            if reservation.user_id != user.user_id {
                return Err(BookingError::Forbidden("reservation"));
            }
            Ok(reservation)
        }
        None => Ok(tx.insert_reservation(user.user_id).await?),
    }
}

// A unique violation on the seat key means a concurrent booking won the race
fn seat_conflict(err: StoreError, session_id: i64, row: i32, seat: i32) -> BookingError {
    match err {
        StoreError::UniqueViolation(constraint) if constraint == SEAT_UNIQUE_CONSTRAINT => {
            warn!(
                "seat ({}, {}) of session {} taken by a concurrent booking",
                row, seat, session_id
            );
            BookingError::SeatTaken { session_id, row, seat }
        }
        other => BookingError::Store(other),
    }
}

/// Books a seat inside an already opened transaction and commits it.
async fn book_in(
    mut tx: Box<dyn BookingTx>,
    request: &TicketRequest,
    user: &AuthUser,
) -> Result<TicketDetail, BookingError> {
    let TicketRequest {
        row,
        seat,
        show_session_id: session_id,
        reservation_id,
    } = *request;

    let dome = tx
        .session_dome(session_id)
        .await?
        .ok_or(BookingError::UnknownSession(session_id))?;
    validate_seat(&dome, row, seat)?;

    if tx.seat_taken(session_id, row, seat).await? {
        return Err(BookingError::SeatTaken { session_id, row, seat });
    }

    let reservation = find_or_create_open_reservation(&mut *tx, user, reservation_id).await?;
    let ticket = tx
        .insert_ticket(session_id, row, seat, reservation.id)
        .await
        .map_err(|e| seat_conflict(e, session_id, row, seat))?;

    let detail = tx
        .ticket_detail(ticket.id)
        .await?
        .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
    tx.commit()
        .await
        .map_err(|e| seat_conflict(e, session_id, row, seat))?;

    info!(
        "user {} booked row {} seat {} of session {} (ticket {}, reservation {})",
        user.user_id, row, seat, session_id, ticket.id, reservation.id
    );
    Ok(detail)
}

#[derive(Clone)]
pub struct SeatReservationManager {
    store: Arc<dyn PlanetariumStore>,
}

impl SeatReservationManager {
    pub fn new(store: Arc<dyn PlanetariumStore>) -> Self {
        Self { store }
    }

    /// Books one seat for `user` and returns the new ticket.
    ///
    /// The reservation and the ticket are committed together or not at all.
    pub async fn book_seat(
        &self,
        request: &TicketRequest,
        user: &AuthUser,
    ) -> Result<TicketDetail, BookingError> {
        let tx = self.store.begin().await?;
        book_in(tx, request, user).await
    }

    /// Cancels a ticket and removes its reservation if it was the last one.
    ///
    /// Only the reservation's owner or staff may cancel.
    pub async fn cancel_ticket(&self, ticket_id: i64, user: &AuthUser) -> Result<(), BookingError> {
        let mut tx = self.store.begin().await?;

        let ticket = tx
            .lock_ticket(ticket_id)
            .await?
            .ok_or(BookingError::NotFound(ticket_id))?;
        let reservation = tx
            .lock_reservation(ticket.reservation_id)
            .await?
            .ok_or(BookingError::NotFound(ticket_id))?;

        if reservation.user_id != user.user_id && !user.is_staff {
            return Err(BookingError::Forbidden("ticket"));
        }

        if !tx.delete_ticket(ticket.id).await? {
            return Err(BookingError::NotFound(ticket_id));
        }

        let remaining = tx.count_tickets(reservation.id).await?;
        if remaining == 0 {
            tx.delete_reservation(reservation.id).await?;
        }
        tx.commit().await?;

        info!(
            "user {} cancelled ticket {} (reservation {}, {} tickets left)",
            user.user_id, ticket.id, reservation.id, remaining
        );
        Ok(())
    }
}
