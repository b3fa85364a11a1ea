use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// Art i artmastern (vetenskapligt namn, unikt bland aktiva rader)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Species {
    pub id: Option<i64>,
    pub name: String,
    pub genus: Option<String>,
    pub subfamily: Option<String>,
    pub remarks: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl Species {
    pub fn new(name: String) -> Self {
        Self {
            name,
            ..Default::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Artnamn krävs"));
        }
        Ok(())
    }
}

/// Partiell uppdatering: frånvarande fält lämnas orörda.
#[derive(Debug, Default, Clone)]
pub struct SpeciesPatch {
    pub name: Option<String>,
    pub genus: Option<String>,
    pub subfamily: Option<String>,
    pub remarks: Option<String>,
}

impl SpeciesPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.genus.is_none()
            && self.subfamily.is_none()
            && self.remarks.is_none()
    }
}

/// Förekomstfrekvens per art (aggregering över aktiva fynd)
#[derive(Debug, Clone, Serialize)]
pub struct SpeciesFrequency {
    pub species_name: String,
    pub genus: Option<String>,
    pub subfamily: Option<String>,
    /// Antal distinkta provytor där arten observerats
    pub site_count: i64,
    /// Antal fyndposter
    pub occurrence_count: i64,
    /// Summerat antal individer
    pub total_count: i64,
    pub avg_count: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_requires_name() {
        let species = Species::new(String::new());
        assert!(matches!(species.validate(), Err(AppError::Validation(_))));

        let species = Species::new("Formica japonica".into());
        assert!(species.validate().is_ok());
    }
}
