use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// Myrfynd: antal individer av en art vid ett inventeringstillfälle.
/// Högst en aktiv post per (tillfälle, art).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AntRecord {
    pub id: Option<i64>,
    pub survey_event_id: i64,
    pub species_id: i64,
    pub count: i64,
    pub remarks: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl AntRecord {
    pub fn new(survey_event_id: i64, species_id: i64, count: i64) -> Self {
        Self {
            id: None,
            survey_event_id,
            species_id,
            count,
            remarks: None,
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn validate(&self) -> AppResult<()> {
        if self.count < 0 {
            return Err(AppError::out_of_range(format!(
                "individantal {} (måste vara ≥ 0)",
                self.count
            )));
        }
        Ok(())
    }
}

/// Partiell uppdatering: frånvarande fält lämnas orörda.
#[derive(Debug, Default, Clone)]
pub struct AntRecordPatch {
    pub species_id: Option<i64>,
    pub count: Option<i64>,
    pub remarks: Option<String>,
}

impl AntRecordPatch {
    pub fn is_empty(&self) -> bool {
        self.species_id.is_none() && self.count.is_none() && self.remarks.is_none()
    }
}

/// Myrfynd med artnamn och platsinformation, för list- och exportvyer
#[derive(Debug, Clone)]
pub struct AntRecordDetail {
    pub record: AntRecord,
    pub species_name: String,
    pub survey_date: NaiveDateTime,
    pub site_name: String,
    pub parent_site_name: String,
}

/// Artantal och individsumma för en provyta
#[derive(Debug, Clone, Default, Serialize)]
pub struct SiteOccurrenceSummary {
    pub species_count: i64,
    pub total_individuals: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_count() {
        assert!(AntRecord::new(1, 1, 0).validate().is_ok());
        assert!(AntRecord::new(1, 1, 10).validate().is_ok());
        assert!(matches!(
            AntRecord::new(1, 1, -1).validate(),
            Err(AppError::ValueOutOfRange(_))
        ));
    }
}
