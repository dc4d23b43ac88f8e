//! Untrusted activity input and its validation.

use chrono::{NaiveDate, NaiveTime};
use sanka_store::NewActivity;
use sanka_types::Points;
use serde::{Deserialize, Serialize};

use crate::CatalogError;

/// Organizer recorded when the creator does not name one.
pub const DEFAULT_ORGANIZER: &str = "admin";

/// An activity as submitted by a creator, before validation.
///
/// Numeric fields are signed so that negative input reaches validation and is
/// reported as an invalid field rather than a parse failure.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivitySpec {
    pub name: String,
    pub cost: i64,
    /// `YYYY-MM-DD`.
    pub date: String,
    /// `HH:MM`.
    pub time: String,
    pub location: String,
    pub description: String,
    #[serde(alias = "requiredParticipants")]
    pub required_participants: i64,
    #[serde(default)]
    pub organizer: Option<String>,
}

impl ActivitySpec {
    /// Check every field and produce the record to store.
    pub fn validate(&self) -> Result<NewActivity, CatalogError> {
        let name = non_blank("name", &self.name)?;
        let cost = u64::try_from(self.cost)
            .map(Points::new)
            .map_err(|_| CatalogError::invalid("cost", "must be a non-negative integer"))?;
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| CatalogError::invalid("date", format!("expected YYYY-MM-DD: {e}")))?;
        let time = NaiveTime::parse_from_str(self.time.trim(), "%H:%M")
            .map_err(|e| CatalogError::invalid("time", format!("expected HH:MM: {e}")))?;
        let location = non_blank("location", &self.location)?;
        let description = non_blank("description", &self.description)?;
        let required_participants = u32::try_from(self.required_participants)
            .ok()
            .filter(|n| *n >= 1)
            .ok_or_else(|| CatalogError::invalid("required_participants", "must be at least 1"))?;
        let organizer = self
            .organizer
            .as_deref()
            .map(str::trim)
            .filter(|o| !o.is_empty())
            .unwrap_or(DEFAULT_ORGANIZER)
            .to_string();

        Ok(NewActivity {
            name,
            cost,
            required_participants,
            date,
            time,
            location,
            description,
            organizer,
        })
    }
}

fn non_blank(field: &'static str, value: &str) -> Result<String, CatalogError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CatalogError::invalid(field, "must not be blank"));
    }
    Ok(trimmed.to_string())
}
