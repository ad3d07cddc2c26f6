use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{ReservationSummary, ShowSessionSummary};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub show_session_id: i64,
    pub reservation_id: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketDetail {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub show_session: ShowSessionSummary,
    pub reservation: ReservationSummary,
}

// Flat join of tickets with their session and reservation
#[derive(Debug, Clone, FromRow)]
pub struct TicketRow {
    pub id: i64,
    pub row: i32,
    pub seat: i32,
    pub session_id: i64,
    pub astronomy_show: String,
    pub planetarium_dome: String,
    pub show_time: DateTime<Utc>,
    pub reservation_id: i64,
    pub reservation_created_at: DateTime<Utc>,
    pub owner_email: String,
}

impl From<TicketRow> for TicketDetail {
    fn from(r: TicketRow) -> Self {
        TicketDetail {
            id: r.id,
            row: r.row,
            seat: r.seat,
            show_session: ShowSessionSummary {
                id: r.session_id,
                astronomy_show: r.astronomy_show,
                planetarium_dome: r.planetarium_dome,
                show_time: r.show_time,
            },
            reservation: ReservationSummary {
                id: r.reservation_id,
                created_at: r.reservation_created_at,
                user: r.owner_email,
            },
        }
    }
}

// POST /api/tickets
#[derive(Debug, Clone, Deserialize)]
pub struct TicketRequest {
    pub row: i32,
    pub seat: i32,
    #[serde(alias = "show_session")]
    pub show_session_id: i64,
    /// Existing reservation of the caller to add the ticket to.
    #[serde(default, alias = "reservation")]
    pub reservation_id: Option<i64>,
}
