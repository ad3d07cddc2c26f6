use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct AstronomyShow {
    pub id: i64,
    pub title: String,
    pub description: String,
    /// Ids of the themes linked to this show, ascending.
    pub show_themes: Vec<i64>,
}

impl AstronomyShow {
    /// True if any of the show's themes is in `theme_ids`.
    pub fn has_any_theme(&self, theme_ids: &[i64]) -> bool {
        self.show_themes.iter().any(|id| theme_ids.contains(id))
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ShowInput {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "show_theme")]
    pub show_themes: Vec<i64>,
}
