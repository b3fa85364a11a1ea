use chrono::NaiveDateTime;
use serde::Serialize;
use std::collections::HashSet;

use super::round_to;
use crate::db::Database;
use crate::utils::error::AppResult;

/// Mångfaldsindex för en provyta, avrundade till tre decimaler
#[derive(Debug, Clone, Serialize)]
pub struct DiversityIndices {
    pub survey_site_id: i64,
    pub site_name: String,
    pub richness: i64,
    pub total_individuals: i64,
    /// Shannon-index, −Σ pᵢ·ln(pᵢ)
    pub shannon: f64,
    /// Simpson-index, 1 − Σ pᵢ²
    pub simpson: f64,
    /// Pielous jämnhet, H / ln(S); 0 när S ≤ 1
    pub pielou: f64,
    /// Berger-Parker-dominans, max(nᵢ) / N
    pub berger_parker: f64,
}

/// Punkt på artackumulationskurvan
#[derive(Debug, Clone, Serialize)]
pub struct AccumulationPoint {
    /// 1-baserat tillfällesindex i kronologisk ordning
    pub event_index: usize,
    pub survey_date: NaiveDateTime,
    pub cumulative_species: usize,
}

/// Shannon-index ur en multimängd av individantal
pub fn shannon(counts: &[i64]) -> f64 {
    let total: i64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;

    -counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / total;
            p * p.ln()
        })
        .sum::<f64>()
}

/// Simpson-index (1 − D)
pub fn simpson(counts: &[i64]) -> f64 {
    let total: i64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let total = total as f64;

    1.0 - counts
        .iter()
        .map(|&c| {
            let p = c as f64 / total;
            p * p
        })
        .sum::<f64>()
}

/// Pielous jämnhet; definierad som 0 när artantalet är ≤ 1
pub fn pielou(counts: &[i64]) -> f64 {
    let richness = counts.iter().filter(|&&c| c > 0).count();
    if richness <= 1 {
        return 0.0;
    }
    shannon(counts) / (richness as f64).ln()
}

/// Berger-Parker-dominans
pub fn berger_parker(counts: &[i64]) -> f64 {
    let total: i64 = counts.iter().sum();
    if total == 0 {
        return 0.0;
    }
    let max = counts.iter().copied().max().unwrap_or(0);
    max as f64 / total as f64
}

/// Beräknar mångfaldsindex och artackumulation ur aktiva fynd
pub struct DiversityAnalyzer {
    db: Database,
}

impl DiversityAnalyzer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Index för en enskild provyta; None om ytan saknar aktiva fynd
    pub fn for_site(&self, survey_site_id: i64) -> AppResult<Option<DiversityIndices>> {
        let site = match self.db.survey_sites().get_by_id(survey_site_id)? {
            Some(site) => site,
            None => return Ok(None),
        };

        let counts: Vec<i64> = self
            .db
            .ant_records()
            .species_counts_for_site(survey_site_id)?
            .into_iter()
            .map(|(_, count)| count)
            .collect();

        if counts.is_empty() {
            return Ok(None);
        }

        Ok(Some(compute_indices(survey_site_id, site.name, &counts)))
    }

    /// Index per provyta. Ytor utan aktiva fynd utelämnas.
    pub fn by_site(&self) -> AppResult<Vec<DiversityIndices>> {
        let sites = self.db.survey_sites().get_all(None)?;
        let records = self.db.ant_records();

        let mut results = Vec::new();
        for site in sites {
            let id = match site.id {
                Some(id) => id,
                None => continue,
            };

            let counts: Vec<i64> = records
                .species_counts_for_site(id)?
                .into_iter()
                .map(|(_, count)| count)
                .collect();

            if counts.is_empty() {
                continue;
            }
            results.push(compute_indices(id, site.name, &counts));
        }

        Ok(results)
    }

    /// Artackumulationskurva över alla aktiva tillfällen i kronologisk
    /// ordning. Kurvan är icke-avtagande.
    pub fn species_accumulation(&self) -> AppResult<Vec<AccumulationPoint>> {
        let rows: Vec<(i64, NaiveDateTime, Option<i64>)> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT se.id, se.survey_date, ar.species_id
                 FROM survey_events se
                 LEFT JOIN ant_records ar
                        ON ar.survey_event_id = se.id AND ar.deleted_at IS NULL
                 WHERE se.deleted_at IS NULL
                 ORDER BY se.survey_date, se.id",
            )?;

            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })?;

        let mut seen: HashSet<i64> = HashSet::new();
        let mut curve = Vec::new();
        let mut current_event: Option<(i64, NaiveDateTime)> = None;

        for (event_id, date, species_id) in rows {
            match current_event {
                Some((id, _)) if id == event_id => {}
                _ => {
                    current_event = Some((event_id, date));
                    curve.push(AccumulationPoint {
                        event_index: curve.len() + 1,
                        survey_date: date,
                        cumulative_species: seen.len(),
                    });
                }
            }

            if let Some(sid) = species_id {
                seen.insert(sid);
            }
            if let Some(last) = curve.last_mut() {
                last.cumulative_species = seen.len();
            }
        }

        Ok(curve)
    }
}

fn compute_indices(survey_site_id: i64, site_name: String, counts: &[i64]) -> DiversityIndices {
    let richness = counts.iter().filter(|&&c| c > 0).count() as i64;
    let total: i64 = counts.iter().sum();

    DiversityIndices {
        survey_site_id,
        site_name,
        richness,
        total_individuals: total,
        shannon: round_to(shannon(counts), 3),
        simpson: round_to(simpson(counts), 3),
        pielou: round_to(pielou(counts), 3),
        berger_parker: round_to(berger_parker(counts), 3),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AntRecord, ParentSite, SurveyEvent, SurveySite};
    use chrono::NaiveDate;

    #[test]
    fn test_index_formulas() {
        let counts = vec![10, 5];

        assert!((shannon(&counts) - 0.6365).abs() < 1e-3);
        assert!((simpson(&counts) - 0.4444).abs() < 1e-3);
        assert!((pielou(&counts) - 0.9183).abs() < 1e-3);
        assert!((berger_parker(&counts) - 0.6667).abs() < 1e-3);
    }

    #[test]
    fn test_single_species_edge_cases() {
        let counts = vec![42];

        // Shannon är exakt 0 vid ett enda artförekomst
        assert_eq!(shannon(&counts), 0.0);
        assert_eq!(pielou(&counts), 0.0);
        assert_eq!(berger_parker(&counts), 1.0);
        // Simpson ligger i [0, 1)
        assert_eq!(simpson(&counts), 0.0);
    }

    #[test]
    fn test_empty_counts_are_guarded() {
        let counts: Vec<i64> = vec![];
        assert_eq!(shannon(&counts), 0.0);
        assert_eq!(simpson(&counts), 0.0);
        assert_eq!(pielou(&counts), 0.0);
        assert_eq!(berger_parker(&counts), 0.0);
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn setup_site(db: &Database) -> i64 {
        let mut parent = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        let parent_id = db.parent_sites().create(&mut parent, &[]).unwrap();
        let mut site = SurveySite::new(parent_id, "Yta 1".into(), 35.0, 135.0);
        db.survey_sites().create(&mut site).unwrap()
    }

    #[test]
    fn test_end_to_end_diversity() {
        let db = Database::open_in_memory().unwrap();
        let site_id = setup_site(&db);

        let mut event = SurveyEvent::new(site_id, date(2025, 6, 1));
        let event_id = db.survey_events().create(&mut event).unwrap();

        let formica = db
            .species()
            .get_or_create("Formica japonica", None, None)
            .unwrap();
        let lasius = db
            .species()
            .get_or_create("Lasius japonicus", None, None)
            .unwrap();

        db.ant_records()
            .create(&mut AntRecord::new(event_id, formica, 10))
            .unwrap();
        db.ant_records()
            .create(&mut AntRecord::new(event_id, lasius, 5))
            .unwrap();

        let analyzer = DiversityAnalyzer::new(db);
        let indices = analyzer.for_site(site_id).unwrap().unwrap();

        assert_eq!(indices.richness, 2);
        assert_eq!(indices.total_individuals, 15);
        assert_eq!(indices.shannon, 0.637);
        assert_eq!(indices.simpson, 0.444);
        assert_eq!(indices.pielou, 0.918);
        assert_eq!(indices.berger_parker, 0.667);
    }

    #[test]
    fn test_sites_without_records_are_excluded() {
        let db = Database::open_in_memory().unwrap();
        setup_site(&db);

        let analyzer = DiversityAnalyzer::new(db);
        assert!(analyzer.by_site().unwrap().is_empty());
    }

    #[test]
    fn test_species_accumulation_is_monotonic() {
        let db = Database::open_in_memory().unwrap();
        let site_id = setup_site(&db);

        let formica = db
            .species()
            .get_or_create("Formica japonica", None, None)
            .unwrap();
        let lasius = db
            .species()
            .get_or_create("Lasius japonicus", None, None)
            .unwrap();
        let pristomyrmex = db
            .species()
            .get_or_create("Pristomyrmex punctatus", None, None)
            .unwrap();

        // Tre tillfällen: ny art, samma art igen, två nya arter
        let species_per_event: Vec<Vec<i64>> = vec![
            vec![formica],
            vec![formica],
            vec![lasius, pristomyrmex],
        ];
        for (i, species) in species_per_event.iter().enumerate() {
            let mut event = SurveyEvent::new(site_id, date(2025, 5, i as u32 + 1));
            let event_id = db.survey_events().create(&mut event).unwrap();
            for &sid in species {
                db.ant_records()
                    .create(&mut AntRecord::new(event_id, sid, 3))
                    .unwrap();
            }
        }

        let analyzer = DiversityAnalyzer::new(db);
        let curve = analyzer.species_accumulation().unwrap();

        assert_eq!(curve.len(), 3);
        let values: Vec<usize> = curve.iter().map(|p| p.cumulative_species).collect();
        assert_eq!(values, vec![1, 1, 3]);
        assert!(values.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(curve.last().unwrap().cumulative_species, 3);
    }
}
