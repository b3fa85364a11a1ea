//! Exporttjänst: pivoterar kärndata till tabellform.
//!
//! Resultatet är en generisk tabell (namngivna kolumner × strängrader)
//! som kan visas direkt i ett rutnät eller serialiseras till CSV/JSON.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde_json::{json, Value};

use crate::analysis::DiversityAnalyzer;
use crate::db::{Database, EventFilter};
use crate::utils::error::{AppError, AppResult};

/// Värdeläge för art-matrisen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    /// 1/0 för förekomst
    Presence,
    /// Summerat individantal
    Abundance,
}

impl MatrixMode {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Presence => "Förekomst",
            Self::Abundance => "Abundans",
        }
    }
}

/// Generiskt tabellresultat
#[derive(Debug, Clone)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Skriv som CSV till valfri writer
    pub fn write_csv<W: Write>(&self, writer: W) -> AppResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer
            .write_record(&self.columns)
            .map_err(|e| AppError::other(format!("CSV-skrivning misslyckades: {}", e)))?;
        for row in &self.rows {
            csv_writer
                .write_record(row)
                .map_err(|e| AppError::other(format!("CSV-skrivning misslyckades: {}", e)))?;
        }
        csv_writer
            .flush()
            .map_err(|e| AppError::other(format!("CSV-skrivning misslyckades: {}", e)))?;

        Ok(())
    }

    pub fn save_csv(&self, path: &Path) -> AppResult<()> {
        let file = File::create(path)?;
        self.write_csv(file)
    }

    /// JSON-array med ett objekt per rad, kolumnnamn som nycklar
    pub fn to_json(&self) -> Value {
        let objects: Vec<Value> = self
            .rows
            .iter()
            .map(|row| {
                let map: serde_json::Map<String, Value> = self
                    .columns
                    .iter()
                    .zip(row)
                    .map(|(col, cell)| (col.clone(), json!(cell)))
                    .collect();
                Value::Object(map)
            })
            .collect();
        Value::Array(objects)
    }

    pub fn save_json(&self, path: &Path) -> AppResult<()> {
        let content = serde_json::to_string_pretty(&self.to_json())
            .map_err(|e| AppError::other(format!("JSON-serialisering misslyckades: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

pub struct ExportService<'a> {
    db: &'a Database,
}

impl<'a> ExportService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Provyta × art-matris. Filtret begränsar vilka tillfällen som
    /// räknas in; ytor utan träffar utelämnas.
    pub fn ant_matrix(&self, mode: MatrixMode, filter: &EventFilter) -> AppResult<Table> {
        let mut cells: BTreeMap<String, BTreeMap<String, i64>> = BTreeMap::new();
        let mut species: BTreeSet<String> = BTreeSet::new();

        for detail in self.iter_filtered_records(filter)? {
            let (site_name, species_name, count) = detail;
            species.insert(species_name.clone());
            *cells
                .entry(site_name)
                .or_default()
                .entry(species_name)
                .or_insert(0) += count;
        }

        let mut columns = vec!["Provyta".to_string()];
        columns.extend(species.iter().cloned());

        let rows = cells
            .into_iter()
            .map(|(site_name, counts)| {
                let mut row = Vec::with_capacity(columns.len());
                row.push(site_name);
                for sp in &species {
                    let total = counts.get(sp).copied().unwrap_or(0);
                    let value = match mode {
                        MatrixMode::Presence => i64::from(total > 0),
                        MatrixMode::Abundance => total,
                    };
                    row.push(value.to_string());
                }
                row
            })
            .collect();

        Ok(Table { columns, rows })
    }

    fn iter_filtered_records(
        &self,
        filter: &EventFilter,
    ) -> AppResult<Vec<(String, String, i64)>> {
        let mut result = Vec::new();
        for event in self.db.survey_events().get_all(filter)? {
            let event_id = match event.event.id {
                Some(id) => id,
                None => continue,
            };
            for record in self.db.ant_records().get_by_event(event_id)? {
                result.push((
                    event.site_name.clone(),
                    record.species_name,
                    record.record.count,
                ));
            }
        }
        Ok(result)
    }

    /// En rad per tillfälle med samtliga vegetationsfält
    pub fn vegetation_matrix(&self) -> AppResult<Table> {
        let columns: Vec<String> = [
            "Huvudlokal",
            "Provyta",
            "Datum",
            "Dominerande träd",
            "Dominerande sasa",
            "Dominerande ört",
            "Förnatyp",
            "Grundyta",
            "Medelträdhöjd",
            "Medelörthöjd",
            "Marktemperatur",
            "Krontäckning",
            "Sasatäckning",
            "Örttäckning",
            "Förnatäckning",
            "Ljusförhållande",
            "Markfuktighet",
            "Vegetationskomplexitet",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut rows = Vec::new();
        for event in self.db.survey_events().get_all(&EventFilter::default())? {
            let event_id = match event.event.id {
                Some(id) => id,
                None => continue,
            };
            let veg = match self.db.vegetation().get_by_event(event_id)? {
                Some(veg) => veg,
                None => continue,
            };

            rows.push(vec![
                event.parent_site_name.clone(),
                event.site_name.clone(),
                event.event.survey_date.format("%Y-%m-%d").to_string(),
                veg.dominant_tree.unwrap_or_default(),
                veg.dominant_sasa.unwrap_or_default(),
                veg.dominant_herb.unwrap_or_default(),
                veg.litter_type.unwrap_or_default(),
                fmt_f64(veg.basal_area),
                fmt_f64(veg.avg_tree_height),
                fmt_f64(veg.avg_herb_height),
                fmt_f64(veg.soil_temperature),
                fmt_f64(veg.canopy_coverage),
                fmt_f64(veg.sasa_coverage),
                fmt_f64(veg.herb_coverage),
                fmt_f64(veg.litter_coverage),
                fmt_i64(veg.light_condition),
                fmt_i64(veg.soil_moisture),
                fmt_i64(veg.vegetation_complexity),
            ]);
        }

        Ok(Table { columns, rows })
    }

    /// Kombinerad tabell: en rad per tillfälle med fyndsummor, valfritt
    /// utökad med provytans mångfaldsindex
    pub fn combined_table(&self, include_diversity: bool) -> AppResult<Table> {
        let mut columns: Vec<String> = [
            "Huvudlokal",
            "Provyta",
            "Datum",
            "Väder",
            "Temperatur",
            "Antal arter",
            "Antal individer",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let mut diversity_by_site = BTreeMap::new();
        if include_diversity {
            columns.extend(
                ["Shannon", "Simpson", "Pielou", "Berger-Parker"]
                    .iter()
                    .map(|s| s.to_string()),
            );

            let analyzer = DiversityAnalyzer::new(self.db.clone());
            for indices in analyzer.by_site()? {
                diversity_by_site.insert(indices.survey_site_id, indices);
            }
        }

        let mut rows = Vec::new();
        for event in self.db.survey_events().get_all(&EventFilter::default())? {
            let event_id = match event.event.id {
                Some(id) => id,
                None => continue,
            };

            let records = self.db.ant_records().get_by_event(event_id)?;
            let species_count = records.len();
            let total: i64 = records.iter().map(|r| r.record.count).sum();

            let mut row = vec![
                event.parent_site_name.clone(),
                event.site_name.clone(),
                event.event.survey_date.format("%Y-%m-%d").to_string(),
                event
                    .event
                    .weather
                    .map(|w| w.label().to_string())
                    .unwrap_or_default(),
                fmt_f64(event.event.temperature),
                species_count.to_string(),
                total.to_string(),
            ];

            if include_diversity {
                match diversity_by_site.get(&event.event.survey_site_id) {
                    Some(d) => {
                        row.push(d.shannon.to_string());
                        row.push(d.simpson.to_string());
                        row.push(d.pielou.to_string());
                        row.push(d.berger_parker.to_string());
                    }
                    None => row.extend(std::iter::repeat(String::new()).take(4)),
                }
            }

            rows.push(row);
        }

        Ok(Table { columns, rows })
    }
}

fn fmt_f64(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn fmt_i64(value: Option<i64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AntRecord, ParentSite, SurveyEvent, SurveySite, VegetationRecord};
    use chrono::{NaiveDate, NaiveDateTime};

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn setup() -> Database {
        let db = Database::open_in_memory().unwrap();

        let mut parent = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        let parent_id = db.parent_sites().create(&mut parent, &[]).unwrap();

        let mut site1 = SurveySite::new(parent_id, "Yta 1".into(), 35.0, 135.0);
        let site1_id = db.survey_sites().create(&mut site1).unwrap();
        let mut site2 = SurveySite::new(parent_id, "Yta 2".into(), 35.1, 135.1);
        let site2_id = db.survey_sites().create(&mut site2).unwrap();

        let formica = db
            .species()
            .get_or_create("Formica japonica", None, None)
            .unwrap();
        let lasius = db
            .species()
            .get_or_create("Lasius japonicus", None, None)
            .unwrap();

        let mut e1 = SurveyEvent::new(site1_id, date(2024, 6, 1));
        let e1_id = db.survey_events().create(&mut e1).unwrap();
        let mut e2 = SurveyEvent::new(site2_id, date(2024, 6, 2));
        let e2_id = db.survey_events().create(&mut e2).unwrap();

        db.ant_records()
            .create(&mut AntRecord::new(e1_id, formica, 10))
            .unwrap();
        db.ant_records()
            .create(&mut AntRecord::new(e1_id, lasius, 5))
            .unwrap();
        db.ant_records()
            .create(&mut AntRecord::new(e2_id, formica, 2))
            .unwrap();

        let mut veg = VegetationRecord::new(e1_id);
        veg.canopy_coverage = Some(80.0);
        veg.dominant_tree = Some("Quercus serrata".into());
        db.vegetation().create(&mut veg).unwrap();

        db
    }

    #[test]
    fn test_abundance_matrix() {
        let db = setup();
        let table = ExportService::new(&db)
            .ant_matrix(MatrixMode::Abundance, &EventFilter::default())
            .unwrap();

        assert_eq!(
            table.columns,
            vec!["Provyta", "Formica japonica", "Lasius japonicus"]
        );
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0], vec!["Yta 1", "10", "5"]);
        assert_eq!(table.rows[1], vec!["Yta 2", "2", "0"]);
    }

    #[test]
    fn test_presence_matrix() {
        let db = setup();
        let table = ExportService::new(&db)
            .ant_matrix(MatrixMode::Presence, &EventFilter::default())
            .unwrap();

        assert_eq!(table.rows[0], vec!["Yta 1", "1", "1"]);
        assert_eq!(table.rows[1], vec!["Yta 2", "1", "0"]);
    }

    #[test]
    fn test_matrix_respects_date_filter() {
        let db = setup();
        let filter = EventFilter {
            date_to: Some(date(2024, 6, 1)),
            ..Default::default()
        };
        let table = ExportService::new(&db)
            .ant_matrix(MatrixMode::Abundance, &filter)
            .unwrap();

        // Endast Yta 1 har tillfällen inom intervallet
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][0], "Yta 1");
    }

    #[test]
    fn test_vegetation_matrix() {
        let db = setup();
        let table = ExportService::new(&db).vegetation_matrix().unwrap();

        // Endast tillfället med vegetationsdata ger en rad
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0][1], "Yta 1");
        assert_eq!(table.rows[0][3], "Quercus serrata");
    }

    #[test]
    fn test_combined_table_with_diversity() {
        let db = setup();
        let table = ExportService::new(&db).combined_table(true).unwrap();

        assert_eq!(table.rows.len(), 2);
        assert!(table.columns.contains(&"Shannon".to_string()));

        // Nyast först: Yta 2 med en art
        assert_eq!(table.rows[0][1], "Yta 2");
        assert_eq!(table.rows[0][5], "1");
        // Yta 1: två arter, 15 individer, Shannon 0.637
        assert_eq!(table.rows[1][5], "2");
        assert_eq!(table.rows[1][6], "15");
        assert_eq!(table.rows[1][7], "0.637");
    }

    #[test]
    fn test_csv_and_json_serialization() {
        let db = setup();
        let table = ExportService::new(&db)
            .ant_matrix(MatrixMode::Abundance, &EventFilter::default())
            .unwrap();

        let mut buffer = Vec::new();
        table.write_csv(&mut buffer).unwrap();
        let csv_text = String::from_utf8(buffer).unwrap();
        assert!(csv_text.starts_with("Provyta,Formica japonica,Lasius japonicus"));
        assert!(csv_text.contains("Yta 1,10,5"));

        let json = table.to_json();
        assert_eq!(json.as_array().unwrap().len(), 2);
        assert_eq!(json[0]["Provyta"], "Yta 1");
        assert_eq!(json[0]["Formica japonica"], "10");
    }
}
