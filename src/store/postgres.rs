//! PostgreSQL-backed store.
//!
//! Queries are plain runtime `sqlx` queries. Cascading deletes lock the
//! affected sessions first and prune reservations left without tickets in
//! the same transaction.

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, Transaction};
use tracing::debug;

use super::{BookingTx, Owner, PlanetariumStore, StoreError, StoreResult};
use crate::database::Database;
use crate::models::{
    AstronomyShow, DomeInput, PlanetariumDome, Reservation, ReservationSummary, SessionInput,
    ShowInput, ShowSession, ShowSessionDetail, ShowSessionSummary, ShowTheme, ThemeInput, Ticket,
    TicketDetail, TicketRow, User,
};

const SHOW_SELECT: &str = r#"
    SELECT a.id, a.title, a.description,
           COALESCE(
               array_agg(ast.show_theme_id ORDER BY ast.show_theme_id)
                   FILTER (WHERE ast.show_theme_id IS NOT NULL),
               '{}'
           ) AS show_themes
    FROM astronomy_shows a
    LEFT JOIN astronomy_show_themes ast ON ast.astronomy_show_id = a.id
"#;

const SESSION_SUMMARY_SELECT: &str = r#"
    SELECT s.id, a.title AS astronomy_show, d.name AS planetarium_dome, s.show_time
    FROM show_sessions s
    JOIN astronomy_shows a ON a.id = s.astronomy_show_id
    JOIN planetarium_domes d ON d.id = s.planetarium_dome_id
"#;

const RESERVATION_SELECT: &str = r#"
    SELECT r.id, r.created_at, u.email AS "user"
    FROM reservations r
    JOIN users u ON u.id = r.user_id
"#;

const TICKET_SELECT: &str = r#"
    SELECT t.id, t."row", t.seat,
           s.id AS session_id, a.title AS astronomy_show, d.name AS planetarium_dome, s.show_time,
           r.id AS reservation_id, r.created_at AS reservation_created_at, u.email AS owner_email
    FROM tickets t
    JOIN show_sessions s ON s.id = t.show_session_id
    JOIN astronomy_shows a ON a.id = s.astronomy_show_id
    JOIN planetarium_domes d ON d.id = s.planetarium_dome_id
    JOIN reservations r ON r.id = t.reservation_id
    JOIN users u ON u.id = r.user_id
"#;

#[derive(Clone)]
pub struct PgStore {
    db: Database,
}

impl PgStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

/* ---------- helpers ---------- */

async fn fetch_show(conn: &mut PgConnection, id: i64) -> StoreResult<Option<AstronomyShow>> {
    let sql = format!("{SHOW_SELECT} WHERE a.id = $1 GROUP BY a.id");
    let show = sqlx::query_as::<_, AstronomyShow>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(show)
}

async fn fetch_session_summary(
    conn: &mut PgConnection,
    id: i64,
) -> StoreResult<Option<ShowSessionSummary>> {
    let sql = format!("{SESSION_SUMMARY_SELECT} WHERE s.id = $1");
    let session = sqlx::query_as::<_, ShowSessionSummary>(&sql)
        .bind(id)
        .fetch_optional(conn)
        .await?;
    Ok(session)
}

async fn link_themes(conn: &mut PgConnection, show_id: i64, theme_ids: &[i64]) -> StoreResult<()> {
    if theme_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        r#"
        INSERT INTO astronomy_show_themes (astronomy_show_id, show_theme_id)
        SELECT $1, theme_id FROM UNNEST($2::bigint[]) AS theme_id
        ON CONFLICT DO NOTHING
        "#,
    )
    .bind(show_id)
    .bind(theme_ids)
    .execute(conn)
    .await?;
    Ok(())
}

/// Deletes the tickets of the given (already locked) sessions and returns
/// the reservations they belonged to.
async fn delete_session_tickets(conn: &mut PgConnection, session_ids: &[i64]) -> StoreResult<Vec<i64>> {
    if session_ids.is_empty() {
        return Ok(Vec::new());
    }
    let reservation_ids = sqlx::query_scalar::<_, i64>(
        "DELETE FROM tickets WHERE show_session_id = ANY($1) RETURNING reservation_id",
    )
    .bind(session_ids)
    .fetch_all(conn)
    .await?;
    Ok(reservation_ids)
}

/// Removes every listed reservation that no longer has tickets.
async fn prune_empty_reservations(conn: &mut PgConnection, ids: &[i64]) -> StoreResult<u64> {
    if ids.is_empty() {
        return Ok(0);
    }
    // Wait out bookings that are attaching tickets to these reservations
    sqlx::query("SELECT id FROM reservations WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(ids)
        .fetch_all(&mut *conn)
        .await?;

    let result = sqlx::query(
        r#"
        DELETE FROM reservations r
        WHERE r.id = ANY($1)
          AND NOT EXISTS (SELECT 1 FROM tickets t WHERE t.reservation_id = r.id)
        "#,
    )
    .bind(ids)
    .execute(conn)
    .await?;
    Ok(result.rows_affected())
}

impl PgStore {
    /// Deletes a catalog row whose removal cascades to the sessions selected
    /// by `lock_sessions_sql`, keeping the reservation invariant intact.
    async fn delete_with_sessions(
        &self,
        lock_sessions_sql: &str,
        delete_sql: &str,
        id: i64,
    ) -> StoreResult<bool> {
        let mut tx = self.db.pool.begin().await?;

        let session_ids = sqlx::query_scalar::<_, i64>(lock_sessions_sql)
            .bind(id)
            .fetch_all(&mut *tx)
            .await?;
        let reservation_ids = delete_session_tickets(&mut tx, &session_ids).await?;

        let deleted = sqlx::query(delete_sql)
            .bind(id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        let pruned = prune_empty_reservations(&mut tx, &reservation_ids).await?;
        tx.commit().await?;

        debug!(
            "cascade delete: {} sessions, {} tickets, {} reservations pruned",
            session_ids.len(),
            reservation_ids.len(),
            pruned
        );
        Ok(deleted)
    }
}

#[async_trait]
impl PlanetariumStore for PgStore {
    /* ---------- users ---------- */

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, email, password_hash, is_staff, created_at FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(user)
    }

    async fn create_user(&self, email: &str, password_hash: &str, is_staff: bool) -> StoreResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (email, password_hash, is_staff)
            VALUES ($1, $2, $3)
            RETURNING id, email, password_hash, is_staff, created_at
            "#,
        )
        .bind(email)
        .bind(password_hash)
        .bind(is_staff)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(user)
    }

    /* ---------- show themes ---------- */

    async fn list_themes(&self) -> StoreResult<Vec<ShowTheme>> {
        let themes = sqlx::query_as::<_, ShowTheme>("SELECT id, name FROM show_themes ORDER BY id")
            .fetch_all(&self.db.pool)
            .await?;
        Ok(themes)
    }

    async fn get_theme(&self, id: i64) -> StoreResult<Option<ShowTheme>> {
        let theme = sqlx::query_as::<_, ShowTheme>("SELECT id, name FROM show_themes WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(theme)
    }

    async fn create_theme(&self, input: &ThemeInput) -> StoreResult<ShowTheme> {
        let theme = sqlx::query_as::<_, ShowTheme>(
            "INSERT INTO show_themes (name) VALUES ($1) RETURNING id, name",
        )
        .bind(&input.name)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(theme)
    }

    async fn update_theme(&self, id: i64, input: &ThemeInput) -> StoreResult<Option<ShowTheme>> {
        let theme = sqlx::query_as::<_, ShowTheme>(
            "UPDATE show_themes SET name = $2 WHERE id = $1 RETURNING id, name",
        )
        .bind(id)
        .bind(&input.name)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(theme)
    }

    async fn delete_theme(&self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM show_themes WHERE id = $1")
            .bind(id)
            .execute(&self.db.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /* ---------- astronomy shows ---------- */

    async fn list_shows(&self, theme_filter: &[i64]) -> StoreResult<Vec<AstronomyShow>> {
        let filter: Option<Vec<i64>> = if theme_filter.is_empty() {
            None
        } else {
            Some(theme_filter.to_vec())
        };
        let sql = format!(
            r#"{SHOW_SELECT}
            WHERE $1::bigint[] IS NULL
               OR EXISTS (
                   SELECT 1 FROM astronomy_show_themes f
                   WHERE f.astronomy_show_id = a.id AND f.show_theme_id = ANY($1)
               )
            GROUP BY a.id
            ORDER BY a.id"#
        );
        let shows = sqlx::query_as::<_, AstronomyShow>(&sql)
            .bind(filter)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(shows)
    }

    async fn get_show(&self, id: i64) -> StoreResult<Option<AstronomyShow>> {
        let mut conn = self.db.pool.acquire().await?;
        fetch_show(&mut conn, id).await
    }

    async fn create_show(&self, input: &ShowInput) -> StoreResult<AstronomyShow> {
        let mut tx = self.db.pool.begin().await?;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO astronomy_shows (title, description) VALUES ($1, $2) RETURNING id",
        )
        .bind(&input.title)
        .bind(&input.description)
        .fetch_one(&mut *tx)
        .await?;
        link_themes(&mut tx, id, &input.show_themes).await?;

        let show = fetch_show(&mut tx, id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))?;
        tx.commit().await?;
        Ok(show)
    }

    async fn update_show(&self, id: i64, input: &ShowInput) -> StoreResult<Option<AstronomyShow>> {
        let mut tx = self.db.pool.begin().await?;

        let updated = sqlx::query("UPDATE astronomy_shows SET title = $2, description = $3 WHERE id = $1")
            .bind(id)
            .bind(&input.title)
            .bind(&input.description)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        if updated == 0 {
            return Ok(None);
        }

        sqlx::query("DELETE FROM astronomy_show_themes WHERE astronomy_show_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        link_themes(&mut tx, id, &input.show_themes).await?;

        let show = fetch_show(&mut tx, id).await?;
        tx.commit().await?;
        Ok(show)
    }

    async fn delete_show(&self, id: i64) -> StoreResult<bool> {
        self.delete_with_sessions(
            "SELECT id FROM show_sessions WHERE astronomy_show_id = $1 ORDER BY id FOR UPDATE",
            "DELETE FROM astronomy_shows WHERE id = $1",
            id,
        )
        .await
    }

    /* ---------- planetarium domes ---------- */

    async fn list_domes(&self) -> StoreResult<Vec<PlanetariumDome>> {
        let domes = sqlx::query_as::<_, PlanetariumDome>(
            "SELECT id, name, rows, seats_in_row FROM planetarium_domes ORDER BY id",
        )
        .fetch_all(&self.db.pool)
        .await?;
        Ok(domes)
    }

    async fn get_dome(&self, id: i64) -> StoreResult<Option<PlanetariumDome>> {
        let dome = sqlx::query_as::<_, PlanetariumDome>(
            "SELECT id, name, rows, seats_in_row FROM planetarium_domes WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(dome)
    }

    async fn create_dome(&self, input: &DomeInput) -> StoreResult<PlanetariumDome> {
        let dome = sqlx::query_as::<_, PlanetariumDome>(
            r#"
            INSERT INTO planetarium_domes (name, rows, seats_in_row)
            VALUES ($1, $2, $3)
            RETURNING id, name, rows, seats_in_row
            "#,
        )
        .bind(&input.name)
        .bind(input.rows)
        .bind(input.seats_in_row)
        .fetch_one(&self.db.pool)
        .await?;
        Ok(dome)
    }

    async fn update_dome(&self, id: i64, input: &DomeInput) -> StoreResult<Option<PlanetariumDome>> {
        let dome = sqlx::query_as::<_, PlanetariumDome>(
            r#"
            UPDATE planetarium_domes SET name = $2, rows = $3, seats_in_row = $4
            WHERE id = $1
            RETURNING id, name, rows, seats_in_row
            "#,
        )
        .bind(id)
        .bind(&input.name)
        .bind(input.rows)
        .bind(input.seats_in_row)
        .fetch_optional(&self.db.pool)
        .await?;
        Ok(dome)
    }

    async fn delete_dome(&self, id: i64) -> StoreResult<bool> {
        self.delete_with_sessions(
            "SELECT id FROM show_sessions WHERE planetarium_dome_id = $1 ORDER BY id FOR UPDATE",
            "DELETE FROM planetarium_domes WHERE id = $1",
            id,
        )
        .await
    }

    /* ---------- show sessions ---------- */

    async fn list_sessions(&self) -> StoreResult<Vec<ShowSessionSummary>> {
        let sql = format!("{SESSION_SUMMARY_SELECT} ORDER BY s.show_time, s.id");
        let sessions = sqlx::query_as::<_, ShowSessionSummary>(&sql)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(sessions)
    }

    async fn get_session(&self, id: i64) -> StoreResult<Option<ShowSessionDetail>> {
        let mut conn = self.db.pool.acquire().await?;

        let Some(session) = sqlx::query_as::<_, ShowSession>(
            "SELECT id, astronomy_show_id, planetarium_dome_id, show_time FROM show_sessions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?
        else {
            return Ok(None);
        };

        let show = fetch_show(&mut conn, session.astronomy_show_id).await?;
        let dome = sqlx::query_as::<_, PlanetariumDome>(
            "SELECT id, name, rows, seats_in_row FROM planetarium_domes WHERE id = $1",
        )
        .bind(session.planetarium_dome_id)
        .fetch_optional(&mut *conn)
        .await?;

        Ok(show.zip(dome).map(|(astronomy_show, planetarium_dome)| ShowSessionDetail {
            id: session.id,
            astronomy_show,
            planetarium_dome,
            show_time: session.show_time,
        }))
    }

    async fn create_session(&self, input: &SessionInput) -> StoreResult<ShowSessionSummary> {
        let mut conn = self.db.pool.acquire().await?;

        let id = sqlx::query_scalar::<_, i64>(
            r#"
            INSERT INTO show_sessions (astronomy_show_id, planetarium_dome_id, show_time)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(input.astronomy_show_id)
        .bind(input.planetarium_dome_id)
        .bind(input.show_time)
        .fetch_one(&mut *conn)
        .await?;

        fetch_session_summary(&mut conn, id)
            .await?
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_session(&self, id: i64, input: &SessionInput) -> StoreResult<Option<ShowSessionSummary>> {
        let mut conn = self.db.pool.acquire().await?;

        let updated = sqlx::query(
            r#"
            UPDATE show_sessions
            SET astronomy_show_id = $2, planetarium_dome_id = $3, show_time = $4
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(input.astronomy_show_id)
        .bind(input.planetarium_dome_id)
        .bind(input.show_time)
        .execute(&mut *conn)
        .await?
        .rows_affected();
        if updated == 0 {
            return Ok(None);
        }

        fetch_session_summary(&mut conn, id).await
    }

    async fn delete_session(&self, id: i64) -> StoreResult<bool> {
        self.delete_with_sessions(
            "SELECT id FROM show_sessions WHERE id = $1 FOR UPDATE",
            "DELETE FROM show_sessions WHERE id = $1",
            id,
        )
        .await
    }

    /* ---------- reservations and tickets ---------- */

    async fn list_reservations(&self, owner: Owner) -> StoreResult<Vec<ReservationSummary>> {
        let sql = format!(
            "{RESERVATION_SELECT} WHERE ($1::bigint IS NULL OR r.user_id = $1) ORDER BY r.created_at DESC, r.id DESC"
        );
        let reservations = sqlx::query_as::<_, ReservationSummary>(&sql)
            .bind(owner)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(reservations)
    }

    async fn get_reservation(&self, id: i64, owner: Owner) -> StoreResult<Option<ReservationSummary>> {
        let sql = format!("{RESERVATION_SELECT} WHERE r.id = $1 AND ($2::bigint IS NULL OR r.user_id = $2)");
        let reservation = sqlx::query_as::<_, ReservationSummary>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(reservation)
    }

    async fn list_tickets(&self, owner: Owner) -> StoreResult<Vec<TicketDetail>> {
        let sql = format!("{TICKET_SELECT} WHERE ($1::bigint IS NULL OR r.user_id = $1) ORDER BY t.id");
        let rows = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(owner)
            .fetch_all(&self.db.pool)
            .await?;
        Ok(rows.into_iter().map(TicketDetail::from).collect())
    }

    async fn get_ticket(&self, id: i64, owner: Owner) -> StoreResult<Option<TicketDetail>> {
        let sql = format!("{TICKET_SELECT} WHERE t.id = $1 AND ($2::bigint IS NULL OR r.user_id = $2)");
        let row = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(id)
            .bind(owner)
            .fetch_optional(&self.db.pool)
            .await?;
        Ok(row.map(TicketDetail::from))
    }

    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>> {
        let tx = self.db.pool.begin().await?;
        Ok(Box::new(PgBookingTx { tx }))
    }
}

pub struct PgBookingTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl BookingTx for PgBookingTx {
    async fn session_dome(&mut self, session_id: i64) -> StoreResult<Option<PlanetariumDome>> {
        // FOR SHARE keeps the session and its grid stable until commit
        let dome = sqlx::query_as::<_, PlanetariumDome>(
            r#"
            SELECT d.id, d.name, d.rows, d.seats_in_row
            FROM show_sessions s
            JOIN planetarium_domes d ON d.id = s.planetarium_dome_id
            WHERE s.id = $1
            FOR SHARE
            "#,
        )
        .bind(session_id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(dome)
    }

    async fn seat_taken(&mut self, session_id: i64, row: i32, seat: i32) -> StoreResult<bool> {
        let taken = sqlx::query_scalar::<_, bool>(
            r#"SELECT EXISTS(SELECT 1 FROM tickets WHERE show_session_id = $1 AND "row" = $2 AND seat = $3)"#,
        )
        .bind(session_id)
        .bind(row)
        .bind(seat)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(taken)
    }

    async fn lock_reservation(&mut self, id: i64) -> StoreResult<Option<Reservation>> {
        let reservation = sqlx::query_as::<_, Reservation>(
            "SELECT id, user_id, created_at FROM reservations WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn insert_reservation(&mut self, user_id: i64) -> StoreResult<Reservation> {
        let reservation = sqlx::query_as::<_, Reservation>(
            "INSERT INTO reservations (user_id) VALUES ($1) RETURNING id, user_id, created_at",
        )
        .bind(user_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(reservation)
    }

    async fn insert_ticket(
        &mut self,
        session_id: i64,
        row: i32,
        seat: i32,
        reservation_id: i64,
    ) -> StoreResult<Ticket> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets ("row", seat, show_session_id, reservation_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id, "row", seat, show_session_id, reservation_id
            "#,
        )
        .bind(row)
        .bind(seat)
        .bind(session_id)
        .bind(reservation_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(ticket)
    }

    async fn ticket_detail(&mut self, ticket_id: i64) -> StoreResult<Option<TicketDetail>> {
        let sql = format!("{TICKET_SELECT} WHERE t.id = $1");
        let row = sqlx::query_as::<_, TicketRow>(&sql)
            .bind(ticket_id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row.map(TicketDetail::from))
    }

    async fn lock_ticket(&mut self, id: i64) -> StoreResult<Option<Ticket>> {
        let ticket = sqlx::query_as::<_, Ticket>(
            r#"SELECT id, "row", seat, show_session_id, reservation_id FROM tickets WHERE id = $1 FOR UPDATE"#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(ticket)
    }

    async fn delete_ticket(&mut self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM tickets WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn count_tickets(&mut self, reservation_id: i64) -> StoreResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM tickets WHERE reservation_id = $1")
            .bind(reservation_id)
            .fetch_one(&mut *self.tx)
            .await?;
        Ok(count)
    }

    async fn delete_reservation(&mut self, id: i64) -> StoreResult<bool> {
        let result = sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
