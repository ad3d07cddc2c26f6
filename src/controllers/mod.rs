pub mod domes;
pub mod reservations;
pub mod sessions;
pub mod shows;
pub mod themes;
pub mod tickets;
pub mod users;

use axum::Router;
use std::sync::Arc;

pub fn routes() -> Router<Arc<crate::AppState>> {
    Router::new()
        .merge(themes::routes())
        .merge(shows::routes())
        .merge(domes::routes())
        .merge(sessions::routes())
        .merge(reservations::routes())
        .merge(tickets::routes())
        .merge(users::routes())
}
