use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::utils::error::{AppError, AppResult};

/// Väder vid inventeringstillfället
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    Clear,
    Cloudy,
    Rain,
    Snow,
}

impl Weather {
    pub const ALL: &'static [Self] = &[Self::Clear, Self::Cloudy, Self::Rain, Self::Snow];

    /// Värde som lagras i databasen (matchar schemats CHECK-lista)
    pub fn as_db_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::Cloudy => "cloudy",
            Self::Rain => "rain",
            Self::Snow => "snow",
        }
    }

    pub fn from_db_str(s: &str) -> Option<Self> {
        match s {
            "clear" => Some(Self::Clear),
            "cloudy" => Some(Self::Cloudy),
            "rain" => Some(Self::Rain),
            "snow" => Some(Self::Snow),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Clear => "Klart",
            Self::Cloudy => "Molnigt",
            Self::Rain => "Regn",
            Self::Snow => "Snö",
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_db_str())
    }
}

/// Inventeringstillfälle: ett daterat fältbesök på en provyta.
/// Vegetationsdata och myrfynd hängs på tillfället.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurveyEvent {
    pub id: Option<i64>,
    pub survey_site_id: i64,
    pub survey_date: NaiveDateTime,
    pub surveyor_name: Option<String>,
    pub weather: Option<Weather>,
    pub temperature: Option<f64>,
    pub remarks: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub deleted_at: Option<String>,
}

impl SurveyEvent {
    pub fn new(survey_site_id: i64, survey_date: NaiveDateTime) -> Self {
        Self {
            id: None,
            survey_site_id,
            survey_date,
            surveyor_name: None,
            weather: None,
            temperature: None,
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
        if self.survey_site_id <= 0 {
            return Err(AppError::validation("Provyta krävs för inventeringstillfälle"));
        }
        Ok(())
    }
}

/// Partiell uppdatering: frånvarande fält lämnas orörda.
#[derive(Debug, Default, Clone)]
pub struct SurveyEventPatch {
    pub survey_date: Option<NaiveDateTime>,
    pub surveyor_name: Option<String>,
    pub weather: Option<Weather>,
    pub temperature: Option<f64>,
    pub remarks: Option<String>,
}

impl SurveyEventPatch {
    pub fn is_empty(&self) -> bool {
        self.survey_date.is_none()
            && self.surveyor_name.is_none()
            && self.weather.is_none()
            && self.temperature.is_none()
            && self.remarks.is_none()
    }
}

/// Inventeringstillfälle med platsnamn, för list- och rapportvyer
#[derive(Debug, Clone)]
pub struct SurveyEventDetail {
    pub event: SurveyEvent,
    pub site_name: String,
    pub parent_site_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_weather_db_roundtrip() {
        for weather in Weather::ALL {
            let s = weather.as_db_str();
            assert_eq!(Weather::from_db_str(s), Some(*weather));
        }
        assert_eq!(Weather::from_db_str("hagel"), None);
    }
}
