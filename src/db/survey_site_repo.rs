use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use std::sync::{Arc, Mutex};

use crate::models::{validate_coordinates, SurveySite, SurveySitePatch};
use crate::utils::error::{translate_constraint, translate_delete_constraint, AppError, AppResult};

const COLUMNS: &str = "id, parent_site_id, name, latitude, longitude, altitude, area, remarks, \
                       created_at, updated_at, deleted_at";

pub struct SurveySiteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SurveySiteRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn create(&self, site: &mut SurveySite) -> AppResult<i64> {
        site.validate()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO survey_sites
                (parent_site_id, name, latitude, longitude, altitude, area, remarks)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                site.parent_site_id,
                site.name,
                site.latitude,
                site.longitude,
                site.altitude,
                site.area,
                site.remarks,
            ],
        )
        .map_err(|e| translate_constraint(e, &format!("provyta '{}'", site.name)))?;

        let id = conn.last_insert_rowid();
        site.id = Some(id);
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> AppResult<Option<SurveySite>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM survey_sites WHERE id = ? AND deleted_at IS NULL"
        ))?;

        let site = stmt.query_row([id], row_to_site).ok();
        Ok(site)
    }

    /// Aktiva provytor, valfritt begränsat till en huvudlokal
    pub fn get_all(&self, parent_site_id: Option<i64>) -> AppResult<Vec<SurveySite>> {
        let conn = self.conn.lock().unwrap();

        let (sql, params): (String, Vec<i64>) = match parent_site_id {
            Some(pid) => (
                format!(
                    "SELECT {COLUMNS} FROM survey_sites
                     WHERE deleted_at IS NULL AND parent_site_id = ?
                     ORDER BY name"
                ),
                vec![pid],
            ),
            None => (
                format!(
                    "SELECT {COLUMNS} FROM survey_sites WHERE deleted_at IS NULL ORDER BY name"
                ),
                vec![],
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let sites = stmt
            .query_map(params_from_iter(params), row_to_site)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(sites)
    }

    pub fn update(&self, id: i64, patch: &SurveySitePatch) -> AppResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Namn på provyta krävs"));
            }
        }
        validate_coordinates(
            patch.latitude.unwrap_or(0.0),
            patch.longitude.unwrap_or(0.0),
        )?;
        if let Some(area) = patch.area {
            if area <= 0.0 {
                return Err(AppError::out_of_range(format!(
                    "yta {} (måste vara större än 0)",
                    area
                )));
            }
        }

        let conn = self.conn.lock().unwrap();

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(name) = &patch.name {
            sets.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(latitude) = patch.latitude {
            sets.push("latitude = ?");
            values.push(Box::new(latitude));
        }
        if let Some(longitude) = patch.longitude {
            sets.push("longitude = ?");
            values.push(Box::new(longitude));
        }
        if let Some(altitude) = patch.altitude {
            sets.push("altitude = ?");
            values.push(Box::new(altitude));
        }
        if let Some(area) = patch.area {
            sets.push("area = ?");
            values.push(Box::new(area));
        }
        if let Some(remarks) = &patch.remarks {
            sets.push("remarks = ?");
            values.push(Box::new(remarks.clone()));
        }
        sets.push("updated_at = datetime('now')");

        let sql = format!(
            "UPDATE survey_sites SET {} WHERE id = ? AND deleted_at IS NULL",
            sets.join(", ")
        );
        values.push(Box::new(id));

        let rows = conn
            .execute(
                &sql,
                params_from_iter(values.iter().map(|v| v.as_ref() as &dyn ToSql)),
            )
            .map_err(|e| translate_constraint(e, &format!("provyta {}", id)))?;

        Ok(rows > 0)
    }

    /// Mjukradera provytan och kaskadera till dess tillfällen med
    /// tillhörande vegetation och fynd. Allt i en transaktion.
    pub fn soft_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "UPDATE vegetation_data SET deleted_at = datetime('now')
             WHERE deleted_at IS NULL AND survey_event_id IN
                   (SELECT id FROM survey_events WHERE survey_site_id = ?)",
            [id],
        )?;
        tx.execute(
            "UPDATE ant_records SET deleted_at = datetime('now')
             WHERE deleted_at IS NULL AND survey_event_id IN
                   (SELECT id FROM survey_events WHERE survey_site_id = ?)",
            [id],
        )?;
        tx.execute(
            "UPDATE survey_events SET deleted_at = datetime('now')
             WHERE deleted_at IS NULL AND survey_site_id = ?",
            [id],
        )?;

        let rows = tx.execute(
            "UPDATE survey_sites SET deleted_at = datetime('now')
             WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;

        tx.commit()?;
        Ok(rows > 0)
    }

    /// Fysisk radering; schemats CASCADE tar barnraderna
    pub fn hard_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute("DELETE FROM survey_sites WHERE id = ?", [id])
            .map_err(|e| translate_delete_constraint(e, &format!("provyta {}", id)))?;

        Ok(rows > 0)
    }

    pub fn search(&self, keyword: &str) -> AppResult<Vec<SurveySite>> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("%{}%", keyword);

        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM survey_sites
             WHERE deleted_at IS NULL AND (name LIKE ?1 OR remarks LIKE ?1)
             ORDER BY name"
        ))?;

        let sites = stmt
            .query_map([&pattern], row_to_site)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(sites)
    }

    pub fn count_by_parent(&self, parent_site_id: i64) -> AppResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM survey_sites
             WHERE parent_site_id = ? AND deleted_at IS NULL",
            [parent_site_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_site(row: &Row) -> rusqlite::Result<SurveySite> {
    Ok(SurveySite {
        id: row.get(0)?,
        parent_site_id: row.get(1)?,
        name: row.get(2)?,
        latitude: row.get(3)?,
        longitude: row.get(4)?,
        altitude: row.get(5)?,
        area: row.get(6)?,
        remarks: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
        deleted_at: row.get(10)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{AntRecord, ParentSite, Species, SurveyEvent};
    use chrono::NaiveDate;

    fn setup_parent(db: &Database) -> i64 {
        let mut parent = ParentSite::new("Huvudlokal".into(), 35.0, 135.0);
        db.parent_sites().create(&mut parent, &[]).unwrap()
    }

    #[test]
    fn test_create_requires_existing_parent() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.survey_sites();

        let mut site = SurveySite::new(999, "Yta 1".into(), 35.0, 135.0);
        assert!(matches!(
            repo.create(&mut site),
            Err(AppError::ReferenceNotFound(_))
        ));
    }

    #[test]
    fn test_duplicate_name_scoped_to_parent() {
        let db = Database::open_in_memory().unwrap();
        let parent_a = setup_parent(&db);
        let mut other = ParentSite::new("Annan lokal".into(), 36.0, 136.0);
        let parent_b = db.parent_sites().create(&mut other, &[]).unwrap();

        let repo = db.survey_sites();
        let mut a = SurveySite::new(parent_a, "Yta 1".into(), 35.0, 135.0);
        repo.create(&mut a).unwrap();

        // Samma namn under samma huvudlokal avvisas
        let mut dup = SurveySite::new(parent_a, "Yta 1".into(), 35.1, 135.1);
        assert!(matches!(
            repo.create(&mut dup),
            Err(AppError::DuplicateName(_))
        ));

        // Men under en annan huvudlokal går det bra
        let mut b = SurveySite::new(parent_b, "Yta 1".into(), 36.0, 136.0);
        assert!(repo.create(&mut b).is_ok());
    }

    #[test]
    fn test_parent_soft_delete_blocked_while_site_active() {
        let db = Database::open_in_memory().unwrap();
        let parent_id = setup_parent(&db);

        let mut site = SurveySite::new(parent_id, "Yta 1".into(), 35.0, 135.0);
        let site_id = db.survey_sites().create(&mut site).unwrap();

        assert!(matches!(
            db.parent_sites().soft_delete(parent_id),
            Err(AppError::DependentRecordsExist(_))
        ));

        // Efter att provytan raderats går huvudlokalen att radera
        db.survey_sites().soft_delete(site_id).unwrap();
        assert!(db.parent_sites().soft_delete(parent_id).unwrap());
    }

    #[test]
    fn test_soft_delete_cascades_to_events_and_records() {
        let db = Database::open_in_memory().unwrap();
        let parent_id = setup_parent(&db);

        let mut site = SurveySite::new(parent_id, "Yta 1".into(), 35.0, 135.0);
        let site_id = db.survey_sites().create(&mut site).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 5, 10)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut event = SurveyEvent::new(site_id, date);
        let event_id = db.survey_events().create(&mut event).unwrap();

        let mut species = Species::new("Formica japonica".into());
        let species_id = db.species().create(&mut species).unwrap();
        let mut record = AntRecord::new(event_id, species_id, 12);
        db.ant_records().create(&mut record).unwrap();

        assert!(db.survey_sites().soft_delete(site_id).unwrap());

        assert!(db.survey_events().get_by_id(event_id).unwrap().is_none());
        assert!(db.ant_records().get_by_event(event_id).unwrap().is_empty());
    }

    #[test]
    fn test_update_and_area_validation() {
        let db = Database::open_in_memory().unwrap();
        let parent_id = setup_parent(&db);

        let mut site = SurveySite::new(parent_id, "Yta 1".into(), 35.0, 135.0);
        let id = db.survey_sites().create(&mut site).unwrap();

        let patch = SurveySitePatch {
            area: Some(100.0),
            ..Default::default()
        };
        assert!(db.survey_sites().update(id, &patch).unwrap());

        let bad = SurveySitePatch {
            area: Some(-5.0),
            ..Default::default()
        };
        assert!(matches!(
            db.survey_sites().update(id, &bad),
            Err(AppError::ValueOutOfRange(_))
        ));

        assert!(!db
            .survey_sites()
            .update(id, &SurveySitePatch::default())
            .unwrap());
    }
}
