use serde::{Deserialize, Serialize};

use crate::models::parent_site::validate_coordinates;
use crate::utils::error::{AppError, AppResult};

/// Provyta: avgränsad yta inom en huvudlokal. Mångfaldsindex beräknas
/// per provyta.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveySite {
    pub id: Option<i64>,
    pub parent_site_id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    /// Yta i kvadratmeter, > 0 när angiven
    pub area: Option<f64>,
    pub remarks: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl SurveySite {
    pub fn new(parent_site_id: i64, name: String, latitude: f64, longitude: f64) -> Self {
        Self {
            id: None,
            parent_site_id,
            name,
            latitude,
            longitude,
            altitude: None,
            area: None,
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
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Namn på provyta krävs"));
        }
        validate_coordinates(self.latitude, self.longitude)?;

        if let Some(area) = self.area {
            if area <= 0.0 {
                return Err(AppError::out_of_range(format!(
                    "yta {} (måste vara större än 0)",
                    area
                )));
            }
        }
        Ok(())
    }
}

/// Partiell uppdatering: frånvarande fält lämnas orörda.
#[derive(Debug, Default, Clone)]
pub struct SurveySitePatch {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub area: Option<f64>,
    pub remarks: Option<String>,
}

impl SurveySitePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.altitude.is_none()
            && self.area.is_none()
            && self.remarks.is_none()
    }
}
