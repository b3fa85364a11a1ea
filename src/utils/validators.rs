//! Formulärvalidering: sträng in, typat värde eller Validation-fel ut.
//!
//! Delas mellan kärnan och presentationslagret så att samma regler
//! gäller oavsett var ett värde skrivs in.

use chrono::{NaiveDate, NaiveDateTime};

use crate::models::Weather;
use crate::utils::error::{AppError, AppResult};

/// Obligatoriskt fält: trimmad icke-tom sträng
pub fn required(value: &str, field: &str) -> AppResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation(format!("{} krävs", field)));
    }
    Ok(trimmed.to_string())
}

/// Text med maxlängd; tom sträng blir None
pub fn optional_text(value: &str, field: &str, max_len: usize) -> AppResult<Option<String>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    if trimmed.chars().count() > max_len {
        return Err(AppError::validation(format!(
            "{} får vara högst {} tecken",
            field, max_len
        )));
    }
    Ok(Some(trimmed.to_string()))
}

pub fn latitude(value: &str) -> AppResult<f64> {
    let parsed = parse_f64(value, "Latitud")?;
    if !(-90.0..=90.0).contains(&parsed) {
        return Err(AppError::validation(format!(
            "Latitud {} utanför -90 till 90",
            parsed
        )));
    }
    Ok(parsed)
}

pub fn longitude(value: &str) -> AppResult<f64> {
    let parsed = parse_f64(value, "Longitud")?;
    if !(-180.0..=180.0).contains(&parsed) {
        return Err(AppError::validation(format!(
            "Longitud {} utanför -180 till 180",
            parsed
        )));
    }
    Ok(parsed)
}

/// Strikt positivt tal (t.ex. yta)
pub fn positive_number(value: &str, field: &str) -> AppResult<f64> {
    let parsed = parse_f64(value, field)?;
    if parsed <= 0.0 {
        return Err(AppError::validation(format!(
            "{} måste vara större än 0",
            field
        )));
    }
    Ok(parsed)
}

/// Procentvärde 0-100
pub fn percentage(value: &str, field: &str) -> AppResult<f64> {
    let parsed = parse_f64(value, field)?;
    if !(0.0..=100.0).contains(&parsed) {
        return Err(AppError::validation(format!(
            "{} måste ligga mellan 0 och 100",
            field
        )));
    }
    Ok(parsed)
}

/// Ordinalskala 1-5
pub fn scale(value: &str, field: &str) -> AppResult<i64> {
    let parsed = parse_i64(value, field)?;
    if !(1..=5).contains(&parsed) {
        return Err(AppError::validation(format!(
            "{} måste ligga mellan 1 och 5",
            field
        )));
    }
    Ok(parsed)
}

/// Icke-negativt heltal (individantal)
pub fn count(value: &str, field: &str) -> AppResult<i64> {
    let parsed = parse_i64(value, field)?;
    if parsed < 0 {
        return Err(AppError::validation(format!(
            "{} får inte vara negativt",
            field
        )));
    }
    Ok(parsed)
}

/// Datum i formatet ÅÅÅÅ-MM-DD (även / som avskiljare)
pub fn date(value: &str) -> AppResult<NaiveDate> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%d", "%Y/%m/%d"] {
        if let Ok(parsed) = NaiveDate::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    Err(AppError::validation(format!(
        "Ogiltigt datum '{}' (förväntat ÅÅÅÅ-MM-DD)",
        trimmed
    )))
}

/// Datum med valfri tidpunkt; enbart datum ger midnatt
pub fn datetime(value: &str) -> AppResult<NaiveDateTime> {
    let trimmed = value.trim();
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(parsed);
        }
    }
    if let Ok(parsed) = date(trimmed) {
        if let Some(dt) = parsed.and_hms_opt(0, 0, 0) {
            return Ok(dt);
        }
    }
    Err(AppError::validation(format!(
        "Ogiltig tidpunkt '{}' (förväntat ÅÅÅÅ-MM-DD HH:MM)",
        trimmed
    )))
}

/// Vetenskapligt artnamn: minst två ord, eller släkte + "sp."
pub fn species_name(value: &str) -> AppResult<String> {
    let name = required(value, "Artnamn")?;
    let words: Vec<&str> = name.split_whitespace().collect();
    if words.len() < 2 {
        return Err(AppError::validation(format!(
            "Artnamn '{}' ska bestå av släkte och artepitet",
            name
        )));
    }
    Ok(name)
}

pub fn weather(value: &str) -> AppResult<Option<Weather>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Weather::from_db_str(trimmed).map(Some).ok_or_else(|| {
        AppError::validation(format!("Okänt vädervärde '{}'", trimmed))
    })
}

fn parse_f64(value: &str, field: &str) -> AppResult<f64> {
    value.trim().parse().map_err(|_| {
        AppError::validation(format!("{} måste vara ett tal, fick '{}'", field, value.trim()))
    })
}

fn parse_i64(value: &str, field: &str) -> AppResult<i64> {
    value.trim().parse().map_err(|_| {
        AppError::validation(format!(
            "{} måste vara ett heltal, fick '{}'",
            field,
            value.trim()
        ))
    })
}
