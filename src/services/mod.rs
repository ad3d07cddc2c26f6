pub mod accounts;
pub mod reservations;
