use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::{AstronomyShow, PlanetariumDome};

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShowSession {
    pub id: i64,
    pub astronomy_show_id: i64,
    pub planetarium_dome_id: i64,
    pub show_time: DateTime<Utc>,
}

// List representation: the show and the dome by name only
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct ShowSessionSummary {
    pub id: i64,
    pub astronomy_show: String,
    pub planetarium_dome: String,
    pub show_time: DateTime<Utc>,
}

// Retrieve representation: show and dome nested in full
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSessionDetail {
    pub id: i64,
    pub astronomy_show: AstronomyShow,
    pub planetarium_dome: PlanetariumDome,
    pub show_time: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionInput {
    #[serde(alias = "astronomy_show")]
    pub astronomy_show_id: i64,
    #[serde(alias = "planetarium_dome")]
    pub planetarium_dome_id: i64,
    pub show_time: DateTime<Utc>,
}
