use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use std::sync::{Arc, Mutex};

use crate::models::{VegetationPatch, VegetationRecord};
use crate::utils::error::{translate_constraint, translate_delete_constraint, AppResult};

const COLUMNS: &str = "id, survey_event_id, dominant_tree, dominant_sasa, dominant_herb, \
                       litter_type, basal_area, avg_tree_height, avg_herb_height, \
                       soil_temperature, canopy_coverage, sasa_coverage, herb_coverage, \
                       litter_coverage, light_condition, soil_moisture, vegetation_complexity, \
                       created_at, updated_at, deleted_at";

pub struct VegetationRepository {
    conn: Arc<Mutex<Connection>>,
}

impl VegetationRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Skapa vegetationspost. Det partiella unika indexet ger
    /// DuplicateName om tillfället redan har en aktiv post.
    pub fn create(&self, record: &mut VegetationRecord) -> AppResult<i64> {
        record.validate()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO vegetation_data
                (survey_event_id, dominant_tree, dominant_sasa, dominant_herb, litter_type,
                 basal_area, avg_tree_height, avg_herb_height, soil_temperature,
                 canopy_coverage, sasa_coverage, herb_coverage, litter_coverage,
                 light_condition, soil_moisture, vegetation_complexity)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.survey_event_id,
                record.dominant_tree,
                record.dominant_sasa,
                record.dominant_herb,
                record.litter_type,
                record.basal_area,
                record.avg_tree_height,
                record.avg_herb_height,
                record.soil_temperature,
                record.canopy_coverage,
                record.sasa_coverage,
                record.herb_coverage,
                record.litter_coverage,
                record.light_condition,
                record.soil_moisture,
                record.vegetation_complexity,
            ],
        )
        .map_err(|e| {
            translate_constraint(
                e,
                &format!("vegetationsdata för tillfälle {}", record.survey_event_id),
            )
        })?;

        let id = conn.last_insert_rowid();
        record.id = Some(id);
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> AppResult<Option<VegetationRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM vegetation_data WHERE id = ? AND deleted_at IS NULL"
        ))?;

        let record = stmt.query_row([id], row_to_record).ok();
        Ok(record)
    }

    /// Den aktiva posten för ett tillfälle, om någon finns
    pub fn get_by_event(&self, survey_event_id: i64) -> AppResult<Option<VegetationRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM vegetation_data
             WHERE survey_event_id = ? AND deleted_at IS NULL"
        ))?;

        let record = stmt.query_row([survey_event_id], row_to_record).ok();
        Ok(record)
    }

    /// Aktiva vegetationsposter, valfritt begränsade till en provyta
    pub fn get_all(&self, survey_site_id: Option<i64>) -> AppResult<Vec<VegetationRecord>> {
        let conn = self.conn.lock().unwrap();

        let (sql, params): (String, Vec<i64>) = match survey_site_id {
            Some(site_id) => (
                format!(
                    "SELECT {COLUMNS} FROM vegetation_data
                     WHERE deleted_at IS NULL AND survey_event_id IN
                           (SELECT id FROM survey_events
                            WHERE survey_site_id = ? AND deleted_at IS NULL)
                     ORDER BY id"
                ),
                vec![site_id],
            ),
            None => (
                format!(
                    "SELECT {COLUMNS} FROM vegetation_data WHERE deleted_at IS NULL ORDER BY id"
                ),
                vec![],
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(params), row_to_record)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    pub fn exists_for_event(&self, survey_event_id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM vegetation_data
             WHERE survey_event_id = ? AND deleted_at IS NULL",
            [survey_event_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    pub fn update(&self, id: i64, patch: &VegetationPatch) -> AppResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        // Samma intervallkontroller som vid skapande
        let candidate = VegetationRecord {
            basal_area: patch.basal_area,
            avg_tree_height: patch.avg_tree_height,
            avg_herb_height: patch.avg_herb_height,
            canopy_coverage: patch.canopy_coverage,
            sasa_coverage: patch.sasa_coverage,
            herb_coverage: patch.herb_coverage,
            litter_coverage: patch.litter_coverage,
            light_condition: patch.light_condition,
            soil_moisture: patch.soil_moisture,
            vegetation_complexity: patch.vegetation_complexity,
            ..Default::default()
        };
        candidate.validate()?;

        let conn = self.conn.lock().unwrap();

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        macro_rules! set_text {
            ($field:ident, $col:literal) => {
                if let Some(v) = &patch.$field {
                    sets.push(concat!($col, " = ?"));
                    values.push(Box::new(v.clone()));
                }
            };
        }
        macro_rules! set_num {
            ($field:ident, $col:literal) => {
                if let Some(v) = patch.$field {
                    sets.push(concat!($col, " = ?"));
                    values.push(Box::new(v));
                }
            };
        }

        set_text!(dominant_tree, "dominant_tree");
        set_text!(dominant_sasa, "dominant_sasa");
        set_text!(dominant_herb, "dominant_herb");
        set_text!(litter_type, "litter_type");
        set_num!(basal_area, "basal_area");
        set_num!(avg_tree_height, "avg_tree_height");
        set_num!(avg_herb_height, "avg_herb_height");
        set_num!(soil_temperature, "soil_temperature");
        set_num!(canopy_coverage, "canopy_coverage");
        set_num!(sasa_coverage, "sasa_coverage");
        set_num!(herb_coverage, "herb_coverage");
        set_num!(litter_coverage, "litter_coverage");
        set_num!(light_condition, "light_condition");
        set_num!(soil_moisture, "soil_moisture");
        set_num!(vegetation_complexity, "vegetation_complexity");

        sets.push("updated_at = datetime('now')");

        let sql = format!(
            "UPDATE vegetation_data SET {} WHERE id = ? AND deleted_at IS NULL",
            sets.join(", ")
        );
        values.push(Box::new(id));

        let rows = conn
            .execute(
                &sql,
                params_from_iter(values.iter().map(|v| v.as_ref() as &dyn ToSql)),
            )
            .map_err(|e| translate_constraint(e, &format!("vegetationsdata {}", id)))?;

        Ok(rows > 0)
    }

    pub fn soft_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE vegetation_data SET deleted_at = datetime('now')
             WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;
        Ok(rows > 0)
    }

    pub fn hard_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute("DELETE FROM vegetation_data WHERE id = ?", [id])
            .map_err(|e| translate_delete_constraint(e, &format!("vegetationsdata {}", id)))?;
        Ok(rows > 0)
    }
}

fn row_to_record(row: &Row) -> rusqlite::Result<VegetationRecord> {
    Ok(VegetationRecord {
        id: row.get(0)?,
        survey_event_id: row.get(1)?,
        dominant_tree: row.get(2)?,
        dominant_sasa: row.get(3)?,
        dominant_herb: row.get(4)?,
        litter_type: row.get(5)?,
        basal_area: row.get(6)?,
        avg_tree_height: row.get(7)?,
        avg_herb_height: row.get(8)?,
        soil_temperature: row.get(9)?,
        canopy_coverage: row.get(10)?,
        sasa_coverage: row.get(11)?,
        herb_coverage: row.get(12)?,
        litter_coverage: row.get(13)?,
        light_condition: row.get(14)?,
        soil_moisture: row.get(15)?,
        vegetation_complexity: row.get(16)?,
        created_at: row.get(17)?,
        updated_at: row.get(18)?,
        deleted_at: row.get(19)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ParentSite, SurveyEvent, SurveySite};
    use crate::utils::error::AppError;
    use chrono::NaiveDate;

    fn setup_event(db: &Database) -> i64 {
        let mut parent = ParentSite::new("Huvudlokal".into(), 35.0, 135.0);
        let parent_id = db.parent_sites().create(&mut parent, &[]).unwrap();
        let mut site = SurveySite::new(parent_id, "Yta 1".into(), 35.0, 135.0);
        let site_id = db.survey_sites().create(&mut site).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut event = SurveyEvent::new(site_id, date);
        db.survey_events().create(&mut event).unwrap()
    }

    #[test]
    fn test_one_active_record_per_event() {
        let db = Database::open_in_memory().unwrap();
        let event_id = setup_event(&db);
        let repo = db.vegetation();

        let mut first = VegetationRecord::new(event_id);
        first.canopy_coverage = Some(75.0);
        let first_id = repo.create(&mut first).unwrap();

        let mut second = VegetationRecord::new(event_id);
        assert!(matches!(
            repo.create(&mut second),
            Err(AppError::DuplicateName(_))
        ));

        // Efter mjukradering släpper indexet igenom en ny post
        repo.soft_delete(first_id).unwrap();
        assert!(repo.create(&mut second).is_ok());
    }

    #[test]
    fn test_roundtrip_all_fields() {
        let db = Database::open_in_memory().unwrap();
        let event_id = setup_event(&db);
        let repo = db.vegetation();

        let mut record = VegetationRecord::new(event_id);
        record.dominant_tree = Some("Quercus serrata".into());
        record.basal_area = Some(32.5);
        record.soil_temperature = Some(-2.0);
        record.canopy_coverage = Some(85.0);
        record.light_condition = Some(3);
        let id = repo.create(&mut record).unwrap();

        let found = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(found.dominant_tree, Some("Quercus serrata".into()));
        assert_eq!(found.basal_area, Some(32.5));
        // Marktemperatur får vara negativ
        assert_eq!(found.soil_temperature, Some(-2.0));
        assert_eq!(found.light_condition, Some(3));
    }

    #[test]
    fn test_update_rejects_bad_scale() {
        let db = Database::open_in_memory().unwrap();
        let event_id = setup_event(&db);
        let repo = db.vegetation();

        let mut record = VegetationRecord::new(event_id);
        let id = repo.create(&mut record).unwrap();

        let patch = VegetationPatch {
            soil_moisture: Some(7),
            ..Default::default()
        };
        assert!(matches!(
            repo.update(id, &patch),
            Err(AppError::ValueOutOfRange(_))
        ));

        let ok = VegetationPatch {
            soil_moisture: Some(4),
            herb_coverage: Some(40.0),
            ..Default::default()
        };
        assert!(repo.update(id, &ok).unwrap());

        let found = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(found.soil_moisture, Some(4));
        assert_eq!(found.herb_coverage, Some(40.0));
    }

    #[test]
    fn test_exists_for_event() {
        let db = Database::open_in_memory().unwrap();
        let event_id = setup_event(&db);
        let repo = db.vegetation();

        assert!(!repo.exists_for_event(event_id).unwrap());
        let mut record = VegetationRecord::new(event_id);
        repo.create(&mut record).unwrap();
        assert!(repo.exists_for_event(event_id).unwrap());
    }
}
