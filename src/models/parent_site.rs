use serde::{Deserialize, Serialize};

use crate::utils::error::{AppError, AppResult};

/// Huvudlokal: geografiskt område på toppnivå som grupperar provytor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParentSite {
    pub id: Option<i64>,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub altitude: Option<f64>,
    pub remarks: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl Default for ParentSite {
    fn default() -> Self {
        Self {
            id: None,
            name: String::new(),
            latitude: 0.0,
            longitude: 0.0,
            altitude: None,
            remarks: None,
            created_at: None,
            updated_at: None,
            deleted_at: None,
        }
    }
}

impl ParentSite {
    pub fn new(name: String, latitude: f64, longitude: f64) -> Self {
        Self {
            name,
            latitude,
            longitude,
            ..Default::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Validera innan skrivning. Samma regler som schemats CHECK-villkor,
    /// men med läsbara felmeddelanden.
    pub fn validate(&self) -> AppResult<()> {
        if self.name.trim().is_empty() {
            return Err(AppError::validation("Namn på huvudlokal krävs"));
        }
        validate_coordinates(self.latitude, self.longitude)
    }
}

/// Latitud ∈ [-90, 90], longitud ∈ [-180, 180]
pub fn validate_coordinates(latitude: f64, longitude: f64) -> AppResult<()> {
    if !(-90.0..=90.0).contains(&latitude) {
        return Err(AppError::out_of_range(format!(
            "latitud {} (tillåtet -90 till 90)",
            latitude
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(AppError::out_of_range(format!(
            "longitud {} (tillåtet -180 till 180)",
            longitude
        )));
    }
    Ok(())
}

/// Partiell uppdatering: frånvarande fält lämnas orörda.
#[derive(Debug, Default, Clone)]
pub struct ParentSitePatch {
    pub name: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub altitude: Option<f64>,
    pub remarks: Option<String>,
    /// Ersätter hela taguppsättningen när angiven
    pub environment_tags: Option<Vec<i64>>,
}

impl ParentSitePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.altitude.is_none()
            && self.remarks.is_none()
            && self.environment_tags.is_none()
    }
}

/// Miljötagg (lövskog, barrskog, gräsmark, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvironmentTag {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
}

/// Huvudlokal med antal aktiva provytor, för listvyer
#[derive(Debug, Clone)]
pub struct ParentSiteWithCount {
    pub site: ParentSite,
    pub survey_site_count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ok() {
        let site = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_validate_latitude_out_of_range() {
        let site = ParentSite::new("Fel".into(), 91.0, 135.0);
        assert!(matches!(
            site.validate(),
            Err(AppError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_validate_longitude_out_of_range() {
        let site = ParentSite::new("Fel".into(), 35.0, -181.0);
        assert!(matches!(
            site.validate(),
            Err(AppError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_validate_empty_name() {
        let site = ParentSite::new("  ".into(), 35.0, 135.0);
        assert!(matches!(site.validate(), Err(AppError::Validation(_))));
    }

    #[test]
    fn test_patch_is_empty() {
        assert!(ParentSitePatch::default().is_empty());

        let patch = ParentSitePatch {
            name: Some("Nytt namn".into()),
            ..Default::default()
        };
        assert!(!patch.is_empty());
    }
}
