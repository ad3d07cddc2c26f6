//! Record store for the catalog, reservations and tickets.
//!
//! [`PlanetariumStore`] covers the plain reads and catalog writes. Anything
//! that has to keep the ticket/reservation invariants goes through a
//! [`BookingTx`], which commits all of its writes or none of them.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use crate::models::{
    AstronomyShow, DomeInput, PlanetariumDome, Reservation, ReservationSummary, SessionInput,
    ShowInput, ShowSessionDetail, ShowSessionSummary, ShowTheme, ThemeInput, Ticket,
    TicketDetail, User,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Name of the uniqueness constraint on `(row, seat, show_session)`.
pub const SEAT_UNIQUE_CONSTRAINT: &str = "tickets_row_seat_session_key";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),
    #[error("database error: {0}")]
    Database(sqlx::Error),
    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db) = &err {
            let constraint = db.constraint().unwrap_or_default().to_string();
            if db.is_unique_violation() {
                return StoreError::UniqueViolation(constraint);
            }
            if db.is_foreign_key_violation() {
                return StoreError::ForeignKeyViolation(constraint);
            }
        }
        StoreError::Database(err)
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Ownership scope for reservation/ticket reads: `Some(user_id)` restricts
/// results to that owner, `None` sees everything.
pub type Owner = Option<i64>;

#[async_trait]
pub trait PlanetariumStore: Send + Sync {
    // --- users ---
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;
    async fn create_user(&self, email: &str, password_hash: &str, is_staff: bool) -> StoreResult<User>;

    // --- show themes ---
    async fn list_themes(&self) -> StoreResult<Vec<ShowTheme>>;
    async fn get_theme(&self, id: i64) -> StoreResult<Option<ShowTheme>>;
    async fn create_theme(&self, input: &ThemeInput) -> StoreResult<ShowTheme>;
    async fn update_theme(&self, id: i64, input: &ThemeInput) -> StoreResult<Option<ShowTheme>>;
    async fn delete_theme(&self, id: i64) -> StoreResult<bool>;

    // --- astronomy shows ---
    /// Empty `theme_filter` lists every show; otherwise only shows linked to
    /// at least one of the given themes.
    async fn list_shows(&self, theme_filter: &[i64]) -> StoreResult<Vec<AstronomyShow>>;
    async fn get_show(&self, id: i64) -> StoreResult<Option<AstronomyShow>>;
    async fn create_show(&self, input: &ShowInput) -> StoreResult<AstronomyShow>;
    async fn update_show(&self, id: i64, input: &ShowInput) -> StoreResult<Option<AstronomyShow>>;
    async fn delete_show(&self, id: i64) -> StoreResult<bool>;

    // --- planetarium domes ---
    async fn list_domes(&self) -> StoreResult<Vec<PlanetariumDome>>;
    async fn get_dome(&self, id: i64) -> StoreResult<Option<PlanetariumDome>>;
    async fn create_dome(&self, input: &DomeInput) -> StoreResult<PlanetariumDome>;
    async fn update_dome(&self, id: i64, input: &DomeInput) -> StoreResult<Option<PlanetariumDome>>;
    async fn delete_dome(&self, id: i64) -> StoreResult<bool>;

    // --- show sessions ---
    async fn list_sessions(&self) -> StoreResult<Vec<ShowSessionSummary>>;
    async fn get_session(&self, id: i64) -> StoreResult<Option<ShowSessionDetail>>;
    async fn create_session(&self, input: &SessionInput) -> StoreResult<ShowSessionSummary>;
    async fn update_session(&self, id: i64, input: &SessionInput) -> StoreResult<Option<ShowSessionSummary>>;
    /// Removes the session, its tickets and any reservation left empty.
    async fn delete_session(&self, id: i64) -> StoreResult<bool>;

    // --- reservations and tickets (read side) ---
    async fn list_reservations(&self, owner: Owner) -> StoreResult<Vec<ReservationSummary>>;
    async fn get_reservation(&self, id: i64, owner: Owner) -> StoreResult<Option<ReservationSummary>>;
    async fn list_tickets(&self, owner: Owner) -> StoreResult<Vec<TicketDetail>>;
    async fn get_ticket(&self, id: i64, owner: Owner) -> StoreResult<Option<TicketDetail>>;

    /// Opens a transaction for booking or cancelling tickets. Dropping it
    /// without [`BookingTx::commit`] discards every write.
    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>>;
}

#[async_trait]
pub trait BookingTx: Send {
    /// Dome hosting the session, or `None` if the session does not exist.
    async fn session_dome(&mut self, session_id: i64) -> StoreResult<Option<PlanetariumDome>>;
    async fn seat_taken(&mut self, session_id: i64, row: i32, seat: i32) -> StoreResult<bool>;
    /// Reads a reservation and holds it against concurrent cleanup until commit.
    async fn lock_reservation(&mut self, id: i64) -> StoreResult<Option<Reservation>>;
    async fn insert_reservation(&mut self, user_id: i64) -> StoreResult<Reservation>;
    /// Fails with [`StoreError::UniqueViolation`] if the seat is already booked.
    async fn insert_ticket(
        &mut self,
        session_id: i64,
        row: i32,
        seat: i32,
        reservation_id: i64,
    ) -> StoreResult<Ticket>;
    async fn ticket_detail(&mut self, ticket_id: i64) -> StoreResult<Option<TicketDetail>>;
    /// Reads a ticket and holds it until commit.
    async fn lock_ticket(&mut self, id: i64) -> StoreResult<Option<Ticket>>;
    async fn delete_ticket(&mut self, id: i64) -> StoreResult<bool>;
    async fn count_tickets(&mut self, reservation_id: i64) -> StoreResult<i64>;
    async fn delete_reservation(&mut self, id: i64) -> StoreResult<bool>;
    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
