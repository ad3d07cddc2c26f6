pub mod dome;
pub mod reservation;
pub mod session;
pub mod show;
pub mod theme;
pub mod ticket;
pub mod user;

pub use dome::{DomeInput, PlanetariumDome};
pub use reservation::{Reservation, ReservationSummary};
pub use session::{SessionInput, ShowSession, ShowSessionDetail, ShowSessionSummary};
pub use show::{AstronomyShow, ShowInput};
pub use theme::{ShowTheme, ThemeInput};
pub use ticket::{Ticket, TicketDetail, TicketRequest, TicketRow};
pub use user::{NewUser, User};
