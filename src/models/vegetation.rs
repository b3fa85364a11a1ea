use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{AppError, AppResult};

/// Vegetationsregistrering: högst en aktiv per inventeringstillfälle.
///
/// Textfälten är fria; alla numeriska fält valideras mot samma
/// intervall som schemats CHECK-villkor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VegetationRecord {
    pub id: Option<i64>,
    pub survey_event_id: i64,

    // Dominerande arter (fritext)
    pub dominant_tree: Option<String>,
    pub dominant_sasa: Option<String>,
    pub dominant_herb: Option<String>,
    pub litter_type: Option<String>,

    // Mätvärden, ≥ 0 när angivna
    pub basal_area: Option<f64>,
    pub avg_tree_height: Option<f64>,
    pub avg_herb_height: Option<f64>,
    pub soil_temperature: Option<f64>,

    // Täckningsgrader i procent, 0–100
    pub canopy_coverage: Option<f64>,
    pub sasa_coverage: Option<f64>,
    pub herb_coverage: Option<f64>,
    pub litter_coverage: Option<f64>,

    // Ordinalskalor 1–5
    pub light_condition: Option<i64>,
    pub soil_moisture: Option<i64>,
    pub vegetation_complexity: Option<i64>,

    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl VegetationRecord {
    pub fn new(survey_event_id: i64) -> Self {
        Self {
            survey_event_id,
            ..Default::default()
        }
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn validate(&self) -> AppResult<()> {
        check_non_negative(self.basal_area, "grundyta")?;
        check_non_negative(self.avg_tree_height, "medelträdhöjd")?;
        check_non_negative(self.avg_herb_height, "medelörthöjd")?;

        check_percentage(self.canopy_coverage, "krontäckning")?;
        check_percentage(self.sasa_coverage, "sasatäckning")?;
        check_percentage(self.herb_coverage, "örttäckning")?;
        check_percentage(self.litter_coverage, "förnatäckning")?;

        check_scale(self.light_condition, "ljusförhållande")?;
        check_scale(self.soil_moisture, "markfuktighet")?;
        check_scale(self.vegetation_complexity, "vegetationskomplexitet")?;

        Ok(())
    }
}

fn check_non_negative(value: Option<f64>, field: &str) -> AppResult<()> {
    if let Some(v) = value {
        if v < 0.0 {
            return Err(AppError::out_of_range(format!(
                "{} {} (måste vara ≥ 0)",
                field, v
            )));
        }
    }
    Ok(())
}

fn check_percentage(value: Option<f64>, field: &str) -> AppResult<()> {
    if let Some(v) = value {
        if !(0.0..=100.0).contains(&v) {
            return Err(AppError::out_of_range(format!(
                "{} {} (tillåtet 0–100 %)",
                field, v
            )));
        }
    }
    Ok(())
}

fn check_scale(value: Option<i64>, field: &str) -> AppResult<()> {
    if let Some(v) = value {
        if !(1..=5).contains(&v) {
            return Err(AppError::out_of_range(format!(
                "{} {} (tillåtet 1–5)",
                field, v
            )));
        }
    }
    Ok(())
}

/// Partiell uppdatering: frånvarande fält lämnas orörda.
#[derive(Debug, Default, Clone)]
pub struct VegetationPatch {
    pub dominant_tree: Option<String>,
    pub dominant_sasa: Option<String>,
    pub dominant_herb: Option<String>,
    pub litter_type: Option<String>,
    pub basal_area: Option<f64>,
    pub avg_tree_height: Option<f64>,
    pub avg_herb_height: Option<f64>,
    pub soil_temperature: Option<f64>,
    pub canopy_coverage: Option<f64>,
    pub sasa_coverage: Option<f64>,
    pub herb_coverage: Option<f64>,
    pub litter_coverage: Option<f64>,
    pub light_condition: Option<i64>,
    pub soil_moisture: Option<i64>,
    pub vegetation_complexity: Option<i64>,
}

impl VegetationPatch {
    pub fn is_empty(&self) -> bool {
        self.dominant_tree.is_none()
            && self.dominant_sasa.is_none()
            && self.dominant_herb.is_none()
            && self.litter_type.is_none()
            && self.basal_area.is_none()
            && self.avg_tree_height.is_none()
            && self.avg_herb_height.is_none()
            && self.soil_temperature.is_none()
            && self.canopy_coverage.is_none()
            && self.sasa_coverage.is_none()
            && self.herb_coverage.is_none()
            && self.litter_coverage.is_none()
            && self.light_condition.is_none()
            && self.soil_moisture.is_none()
            && self.vegetation_complexity.is_none()
    }
}

/// De elva numeriska miljövariablerna, som taggad enum istället för
/// strängnycklar. Kolumnnamnet används i SQL och kan därmed aldrig
/// komma från fritext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VegetationVariable {
    BasalArea,
    AvgTreeHeight,
    AvgHerbHeight,
    SoilTemperature,
    CanopyCoverage,
    SasaCoverage,
    HerbCoverage,
    LitterCoverage,
    LightCondition,
    SoilMoisture,
    VegetationComplexity,
}

impl VegetationVariable {
    pub const ALL: &'static [Self] = &[
        Self::BasalArea,
        Self::AvgTreeHeight,
        Self::AvgHerbHeight,
        Self::SoilTemperature,
        Self::CanopyCoverage,
        Self::SasaCoverage,
        Self::HerbCoverage,
        Self::LitterCoverage,
        Self::LightCondition,
        Self::SoilMoisture,
        Self::VegetationComplexity,
    ];

    pub fn column_name(&self) -> &'static str {
        match self {
            Self::BasalArea => "basal_area",
            Self::AvgTreeHeight => "avg_tree_height",
            Self::AvgHerbHeight => "avg_herb_height",
            Self::SoilTemperature => "soil_temperature",
            Self::CanopyCoverage => "canopy_coverage",
            Self::SasaCoverage => "sasa_coverage",
            Self::HerbCoverage => "herb_coverage",
            Self::LitterCoverage => "litter_coverage",
            Self::LightCondition => "light_condition",
            Self::SoilMoisture => "soil_moisture",
            Self::VegetationComplexity => "vegetation_complexity",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::BasalArea => "Grundyta",
            Self::AvgTreeHeight => "Medelträdhöjd",
            Self::AvgHerbHeight => "Medelörthöjd",
            Self::SoilTemperature => "Marktemperatur",
            Self::CanopyCoverage => "Krontäckning",
            Self::SasaCoverage => "Sasatäckning",
            Self::HerbCoverage => "Örttäckning",
            Self::LitterCoverage => "Förnatäckning",
            Self::LightCondition => "Ljusförhållande",
            Self::SoilMoisture => "Markfuktighet",
            Self::VegetationComplexity => "Vegetationskomplexitet",
        }
    }
}

impl fmt::Display for VegetationVariable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.column_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_ok_with_all_fields_absent() {
        let record = VegetationRecord::new(1);
        assert!(record.validate().is_ok());
    }

    #[test]
    fn test_validate_coverage_range() {
        let mut record = VegetationRecord::new(1);
        record.canopy_coverage = Some(100.0);
        assert!(record.validate().is_ok());

        record.canopy_coverage = Some(100.5);
        assert!(matches!(
            record.validate(),
            Err(AppError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_validate_negative_measurement() {
        let mut record = VegetationRecord::new(1);
        record.basal_area = Some(-1.0);
        assert!(matches!(
            record.validate(),
            Err(AppError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_validate_scale() {
        let mut record = VegetationRecord::new(1);
        record.light_condition = Some(5);
        assert!(record.validate().is_ok());

        record.light_condition = Some(6);
        assert!(matches!(
            record.validate(),
            Err(AppError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_variable_covers_eleven_columns() {
        assert_eq!(VegetationVariable::ALL.len(), 11);
    }
}
