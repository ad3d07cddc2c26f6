//! In-memory store.
//!
//! All tables live behind one async mutex. A [`BookingTx`] holds the lock
//! for its whole lifetime and works on a staged copy of the tables, so
//! transactions are serialized and an uncommitted one leaves no trace.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{BookingTx, Owner, PlanetariumStore, StoreError, StoreResult, SEAT_UNIQUE_CONSTRAINT};
use crate::models::{
    AstronomyShow, DomeInput, PlanetariumDome, Reservation, ReservationSummary, SessionInput,
    ShowInput, ShowSession, ShowSessionDetail, ShowSessionSummary, ShowTheme, ThemeInput, Ticket,
    TicketDetail, User,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    user: i64,
    theme: i64,
    show: i64,
    dome: i64,
    session: i64,
    reservation: i64,
    ticket: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct Tables {
    seq: Sequences,
    users: BTreeMap<i64, User>,
    themes: BTreeMap<i64, ShowTheme>,
    shows: BTreeMap<i64, AstronomyShow>,
    domes: BTreeMap<i64, PlanetariumDome>,
    sessions: BTreeMap<i64, ShowSession>,
    reservations: BTreeMap<i64, Reservation>,
    tickets: BTreeMap<i64, Ticket>,
}

impl Tables {
    fn theme_links(&self, theme_ids: &[i64]) -> StoreResult<Vec<i64>> {
        let links: BTreeSet<i64> = theme_ids.iter().copied().collect();
        if let Some(missing) = links.iter().find(|id| !self.themes.contains_key(id)) {
            return Err(StoreError::ForeignKeyViolation(format!(
                "astronomy_show_themes_show_theme_id_fkey ({missing})"
            )));
        }
        Ok(links.into_iter().collect())
    }

    fn check_session_refs(&self, input: &SessionInput) -> StoreResult<()> {
        if !self.shows.contains_key(&input.astronomy_show_id) {
            return Err(StoreError::ForeignKeyViolation(
                "show_sessions_astronomy_show_id_fkey".to_string(),
            ));
        }
        if !self.domes.contains_key(&input.planetarium_dome_id) {
            return Err(StoreError::ForeignKeyViolation(
                "show_sessions_planetarium_dome_id_fkey".to_string(),
            ));
        }
        Ok(())
    }

    fn session_summary(&self, id: i64) -> Option<ShowSessionSummary> {
        let session = self.sessions.get(&id)?;
        Some(ShowSessionSummary {
            id,
            astronomy_show: self.shows.get(&session.astronomy_show_id)?.title.clone(),
            planetarium_dome: self.domes.get(&session.planetarium_dome_id)?.name.clone(),
            show_time: session.show_time,
        })
    }

    fn reservation_summary(&self, id: i64) -> Option<ReservationSummary> {
        let reservation = self.reservations.get(&id)?;
        Some(ReservationSummary {
            id,
            created_at: reservation.created_at,
            user: self.users.get(&reservation.user_id)?.email.clone(),
        })
    }

    fn ticket_detail(&self, id: i64) -> Option<TicketDetail> {
        let ticket = self.tickets.get(&id)?;
        Some(TicketDetail {
            id,
            row: ticket.row,
            seat: ticket.seat,
            show_session: self.session_summary(ticket.show_session_id)?,
            reservation: self.reservation_summary(ticket.reservation_id)?,
        })
    }

    fn owned_by(&self, reservation_id: i64, owner: Owner) -> bool {
        match owner {
            None => true,
            Some(user_id) => self
                .reservations
                .get(&reservation_id)
                .is_some_and(|r| r.user_id == user_id),
        }
    }

    /// Removes sessions, their tickets and reservations left empty.
    fn delete_sessions(&mut self, session_ids: &BTreeSet<i64>) {
        let mut touched = BTreeSet::new();
        self.tickets.retain(|_, t| {
            let keep = !session_ids.contains(&t.show_session_id);
            if !keep {
                touched.insert(t.reservation_id);
            }
            keep
        });
        self.sessions.retain(|id, _| !session_ids.contains(id));
        self.prune_empty_reservations(&touched);
    }

    fn prune_empty_reservations(&mut self, ids: &BTreeSet<i64>) {
        for id in ids {
            if !self.tickets.values().any(|t| t.reservation_id == *id) {
                self.reservations.remove(id);
            }
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PlanetariumStore for MemoryStore {
    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, email: &str, password_hash: &str, is_staff: bool) -> StoreResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.email == email) {
            return Err(StoreError::UniqueViolation("users_email_key".to_string()));
        }
        let user = User {
            id: next_id(&mut tables.seq.user),
            email: email.to_string(),
            password_hash: password_hash.to_string(),
            is_staff,
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn list_themes(&self) -> StoreResult<Vec<ShowTheme>> {
        Ok(self.tables.lock().await.themes.values().cloned().collect())
    }

    async fn get_theme(&self, id: i64) -> StoreResult<Option<ShowTheme>> {
        Ok(self.tables.lock().await.themes.get(&id).cloned())
    }

    async fn create_theme(&self, input: &ThemeInput) -> StoreResult<ShowTheme> {
        let mut tables = self.tables.lock().await;
        let theme = ShowTheme {
            id: next_id(&mut tables.seq.theme),
            name: input.name.clone(),
        };
        tables.themes.insert(theme.id, theme.clone());
        Ok(theme)
    }

    async fn update_theme(&self, id: i64, input: &ThemeInput) -> StoreResult<Option<ShowTheme>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.themes.get_mut(&id).map(|theme| {
            theme.name = input.name.clone();
            theme.clone()
        }))
    }

    async fn delete_theme(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.themes.remove(&id).is_none() {
            return Ok(false);
        }
        for show in tables.shows.values_mut() {
            show.show_themes.retain(|t| *t != id);
        }
        Ok(true)
    }

    async fn list_shows(&self, theme_filter: &[i64]) -> StoreResult<Vec<AstronomyShow>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .shows
            .values()
            .filter(|show| theme_filter.is_empty() || show.has_any_theme(theme_filter))
            .cloned()
            .collect())
    }

    async fn get_show(&self, id: i64) -> StoreResult<Option<AstronomyShow>> {
        Ok(self.tables.lock().await.shows.get(&id).cloned())
    }

    async fn create_show(&self, input: &ShowInput) -> StoreResult<AstronomyShow> {
        let mut tables = self.tables.lock().await;
        let show_themes = tables.theme_links(&input.show_themes)?;
        let show = AstronomyShow {
            id: next_id(&mut tables.seq.show),
            title: input.title.clone(),
            description: input.description.clone(),
            show_themes,
        };
        tables.shows.insert(show.id, show.clone());
        Ok(show)
    }

    async fn update_show(&self, id: i64, input: &ShowInput) -> StoreResult<Option<AstronomyShow>> {
        let mut tables = self.tables.lock().await;
        if !tables.shows.contains_key(&id) {
            return Ok(None);
        }
        let show_themes = tables.theme_links(&input.show_themes)?;
        Ok(tables.shows.get_mut(&id).map(|show| {
            show.title = input.title.clone();
            show.description = input.description.clone();
            show.show_themes = show_themes;
            show.clone()
        }))
    }

    async fn delete_show(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.shows.remove(&id).is_none() {
            return Ok(false);
        }
        let sessions: BTreeSet<i64> = tables
            .sessions
            .values()
            .filter(|s| s.astronomy_show_id == id)
            .map(|s| s.id)
            .collect();
        tables.delete_sessions(&sessions);
        Ok(true)
    }

    async fn list_domes(&self) -> StoreResult<Vec<PlanetariumDome>> {
        Ok(self.tables.lock().await.domes.values().cloned().collect())
    }

    async fn get_dome(&self, id: i64) -> StoreResult<Option<PlanetariumDome>> {
        Ok(self.tables.lock().await.domes.get(&id).cloned())
    }

    async fn create_dome(&self, input: &DomeInput) -> StoreResult<PlanetariumDome> {
        let mut tables = self.tables.lock().await;
        let dome = PlanetariumDome {
            id: next_id(&mut tables.seq.dome),
            name: input.name.clone(),
            rows: input.rows,
            seats_in_row: input.seats_in_row,
        };
        tables.domes.insert(dome.id, dome.clone());
        Ok(dome)
    }

    async fn update_dome(&self, id: i64, input: &DomeInput) -> StoreResult<Option<PlanetariumDome>> {
        let mut tables = self.tables.lock().await;
        Ok(tables.domes.get_mut(&id).map(|dome| {
            dome.name = input.name.clone();
            dome.rows = input.rows;
            dome.seats_in_row = input.seats_in_row;
            dome.clone()
        }))
    }

    async fn delete_dome(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if tables.domes.remove(&id).is_none() {
            return Ok(false);
        }
        let sessions: BTreeSet<i64> = tables
            .sessions
            .values()
            .filter(|s| s.planetarium_dome_id == id)
            .map(|s| s.id)
            .collect();
        tables.delete_sessions(&sessions);
        Ok(true)
    }

    async fn list_sessions(&self) -> StoreResult<Vec<ShowSessionSummary>> {
        let tables = self.tables.lock().await;
        let mut sessions: Vec<ShowSessionSummary> = tables
            .sessions
            .keys()
            .filter_map(|id| tables.session_summary(*id))
            .collect();
        sessions.sort_by_key(|s| (s.show_time, s.id));
        Ok(sessions)
    }

    async fn get_session(&self, id: i64) -> StoreResult<Option<ShowSessionDetail>> {
        let tables = self.tables.lock().await;
        let Some(session) = tables.sessions.get(&id) else {
            return Ok(None);
        };
        let show = tables.shows.get(&session.astronomy_show_id).cloned();
        let dome = tables.domes.get(&session.planetarium_dome_id).cloned();
        Ok(show.zip(dome).map(|(astronomy_show, planetarium_dome)| ShowSessionDetail {
            id,
            astronomy_show,
            planetarium_dome,
            show_time: session.show_time,
        }))
    }

    async fn create_session(&self, input: &SessionInput) -> StoreResult<ShowSessionSummary> {
        let mut tables = self.tables.lock().await;
        tables.check_session_refs(input)?;
        let session = ShowSession {
            id: next_id(&mut tables.seq.session),
            astronomy_show_id: input.astronomy_show_id,
            planetarium_dome_id: input.planetarium_dome_id,
            show_time: input.show_time,
        };
        let id = session.id;
        tables.sessions.insert(id, session);
        tables
            .session_summary(id)
            .ok_or(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn update_session(&self, id: i64, input: &SessionInput) -> StoreResult<Option<ShowSessionSummary>> {
        let mut tables = self.tables.lock().await;
        if !tables.sessions.contains_key(&id) {
            return Ok(None);
        }
        tables.check_session_refs(input)?;
        if let Some(session) = tables.sessions.get_mut(&id) {
            session.astronomy_show_id = input.astronomy_show_id;
            session.planetarium_dome_id = input.planetarium_dome_id;
            session.show_time = input.show_time;
        }
        Ok(tables.session_summary(id))
    }

    async fn delete_session(&self, id: i64) -> StoreResult<bool> {
        let mut tables = self.tables.lock().await;
        if !tables.sessions.contains_key(&id) {
            return Ok(false);
        }
        tables.delete_sessions(&BTreeSet::from([id]));
        Ok(true)
    }

    async fn list_reservations(&self, owner: Owner) -> StoreResult<Vec<ReservationSummary>> {
        let tables = self.tables.lock().await;
        let mut reservations: Vec<ReservationSummary> = tables
            .reservations
            .keys()
            .filter(|id| tables.owned_by(**id, owner))
            .filter_map(|id| tables.reservation_summary(*id))
            .collect();
        reservations.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(reservations)
    }

    async fn get_reservation(&self, id: i64, owner: Owner) -> StoreResult<Option<ReservationSummary>> {
        let tables = self.tables.lock().await;
        if !tables.owned_by(id, owner) {
            return Ok(None);
        }
        Ok(tables.reservation_summary(id))
    }

    async fn list_tickets(&self, owner: Owner) -> StoreResult<Vec<TicketDetail>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .tickets
            .values()
            .filter(|t| tables.owned_by(t.reservation_id, owner))
            .filter_map(|t| tables.ticket_detail(t.id))
            .collect())
    }

    async fn get_ticket(&self, id: i64, owner: Owner) -> StoreResult<Option<TicketDetail>> {
        let tables = self.tables.lock().await;
        let Some(ticket) = tables.tickets.get(&id) else {
            return Ok(None);
        };
        if !tables.owned_by(ticket.reservation_id, owner) {
            return Ok(None);
        }
        Ok(tables.ticket_detail(id))
    }

    async fn begin(&self) -> StoreResult<Box<dyn BookingTx>> {
        let guard = self.tables.clone().lock_owned().await;
        let staged = (*guard).clone();
        Ok(Box::new(MemoryBookingTx { guard, staged }))
    }
}

pub struct MemoryBookingTx {
    guard: OwnedMutexGuard<Tables>,
    staged: Tables,
}

#[async_trait]
impl BookingTx for MemoryBookingTx {
    async fn session_dome(&mut self, session_id: i64) -> StoreResult<Option<PlanetariumDome>> {
        Ok(self
            .staged
            .sessions
            .get(&session_id)
            .and_then(|s| self.staged.domes.get(&s.planetarium_dome_id))
            .cloned())
    }

    async fn seat_taken(&mut self, session_id: i64, row: i32, seat: i32) -> StoreResult<bool> {
        Ok(self
            .staged
            .tickets
            .values()
            .any(|t| t.show_session_id == session_id && t.row == row && t.seat == seat))
    }

    async fn lock_reservation(&mut self, id: i64) -> StoreResult<Option<Reservation>> {
        Ok(self.staged.reservations.get(&id).cloned())
    }

    async fn insert_reservation(&mut self, user_id: i64) -> StoreResult<Reservation> {
        if !self.staged.users.contains_key(&user_id) {
            return Err(StoreError::ForeignKeyViolation("reservations_user_id_fkey".to_string()));
        }
        let reservation = Reservation {
            id: next_id(&mut self.staged.seq.reservation),
            user_id,
            created_at: Utc::now(),
        };
        self.staged.reservations.insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn insert_ticket(
        &mut self,
        session_id: i64,
        row: i32,
        seat: i32,
        reservation_id: i64,
    ) -> StoreResult<Ticket> {
        if !self.staged.sessions.contains_key(&session_id) {
            return Err(StoreError::ForeignKeyViolation("tickets_show_session_id_fkey".to_string()));
        }
        if !self.staged.reservations.contains_key(&reservation_id) {
            return Err(StoreError::ForeignKeyViolation("tickets_reservation_id_fkey".to_string()));
        }
        if self.seat_taken(session_id, row, seat).await? {
            return Err(StoreError::UniqueViolation(SEAT_UNIQUE_CONSTRAINT.to_string()));
        }
        let ticket = Ticket {
            id: next_id(&mut self.staged.seq.ticket),
            row,
            seat,
            show_session_id: session_id,
            reservation_id,
        };
        self.staged.tickets.insert(ticket.id, ticket.clone());
        Ok(ticket)
    }

    async fn ticket_detail(&mut self, ticket_id: i64) -> StoreResult<Option<TicketDetail>> {
        Ok(self.staged.ticket_detail(ticket_id))
    }

    async fn lock_ticket(&mut self, id: i64) -> StoreResult<Option<Ticket>> {
        Ok(self.staged.tickets.get(&id).cloned())
    }

    async fn delete_ticket(&mut self, id: i64) -> StoreResult<bool> {
        Ok(self.staged.tickets.remove(&id).is_some())
    }

    async fn count_tickets(&mut self, reservation_id: i64) -> StoreResult<i64> {
        let count = self
            .staged
            .tickets
            .values()
            .filter(|t| t.reservation_id == reservation_id)
            .count();
        Ok(count as i64)
    }

    async fn delete_reservation(&mut self, id: i64) -> StoreResult<bool> {
        Ok(self.staged.reservations.remove(&id).is_some())
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let MemoryBookingTx { mut guard, staged } = *self;
        *guard = staged;
        Ok(())
    }
}
