use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use std::sync::{Arc, Mutex};

use crate::models::{
    AntRecord, AntRecordDetail, AntRecordPatch, SiteOccurrenceSummary, SpeciesFrequency,
};
use crate::utils::error::{translate_constraint, translate_delete_constraint, AppResult};

const DETAIL_SELECT: &str = "SELECT ar.id, ar.survey_event_id, ar.species_id, ar.count,
                    ar.remarks, ar.created_at, ar.updated_at, ar.deleted_at,
                    sm.name, se.survey_date, ss.name, ps.name
             FROM ant_records ar
             JOIN species_master sm ON ar.species_id = sm.id
             JOIN survey_events se ON ar.survey_event_id = se.id
             JOIN survey_sites ss ON se.survey_site_id = ss.id
             JOIN parent_sites ps ON ss.parent_site_id = ps.id
             WHERE ar.deleted_at IS NULL";

pub struct AntRecordRepository {
    conn: Arc<Mutex<Connection>>,
}

impl AntRecordRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Skapa fynd. Det partiella unika indexet ger DuplicateName om
    /// tillfället redan har ett aktivt fynd för arten.
    pub fn create(&self, record: &mut AntRecord) -> AppResult<i64> {
        record.validate()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO ant_records (survey_event_id, species_id, count, remarks)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                record.survey_event_id,
                record.species_id,
                record.count,
                record.remarks,
            ],
        )
        .map_err(|e| {
            translate_constraint(
                e,
                &format!(
                    "fynd av art {} vid tillfälle {}",
                    record.species_id, record.survey_event_id
                ),
            )
        })?;

        let id = conn.last_insert_rowid();
        record.id = Some(id);
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> AppResult<Option<AntRecordDetail>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!("{DETAIL_SELECT} AND ar.id = ?"))?;

        let record = stmt.query_row([id], row_to_detail).ok();
        Ok(record)
    }

    /// Aktiva fynd för ett tillfälle, sorterade på artnamn
    pub fn get_by_event(&self, survey_event_id: i64) -> AppResult<Vec<AntRecordDetail>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{DETAIL_SELECT} AND ar.survey_event_id = ? ORDER BY sm.name"
        ))?;

        let records = stmt
            .query_map([survey_event_id], row_to_detail)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    /// Aktiva fynd av en art, nyast först
    pub fn get_by_species(&self, species_id: i64) -> AppResult<Vec<AntRecordDetail>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "{DETAIL_SELECT} AND ar.species_id = ? ORDER BY se.survey_date DESC"
        ))?;

        let records = stmt
            .query_map([species_id], row_to_detail)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    /// Alla aktiva fynd, valfritt begränsade till en provyta
    pub fn get_all(&self, survey_site_id: Option<i64>) -> AppResult<Vec<AntRecordDetail>> {
        let conn = self.conn.lock().unwrap();

        let (sql, params): (String, Vec<i64>) = match survey_site_id {
            Some(site_id) => (
                format!("{DETAIL_SELECT} AND ss.id = ? ORDER BY se.survey_date DESC, sm.name"),
                vec![site_id],
            ),
            None => (
                format!("{DETAIL_SELECT} ORDER BY se.survey_date DESC, sm.name"),
                vec![],
            ),
        };

        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params_from_iter(params), row_to_detail)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(records)
    }

    pub fn update(&self, id: i64, patch: &AntRecordPatch) -> AppResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        if let Some(count) = patch.count {
            AntRecord::new(0, 0, count).validate()?;
        }

        let conn = self.conn.lock().unwrap();

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(species_id) = patch.species_id {
            sets.push("species_id = ?");
            values.push(Box::new(species_id));
        }
        if let Some(count) = patch.count {
            sets.push("count = ?");
            values.push(Box::new(count));
        }
        if let Some(remarks) = &patch.remarks {
            sets.push("remarks = ?");
            values.push(Box::new(remarks.clone()));
        }
        sets.push("updated_at = datetime('now')");

        let sql = format!(
            "UPDATE ant_records SET {} WHERE id = ? AND deleted_at IS NULL",
            sets.join(", ")
        );
        values.push(Box::new(id));

        let rows = conn
            .execute(
                &sql,
                params_from_iter(values.iter().map(|v| v.as_ref() as &dyn ToSql)),
            )
            .map_err(|e| translate_constraint(e, &format!("fynd {}", id)))?;

        Ok(rows > 0)
    }

    pub fn soft_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn.execute(
            "UPDATE ant_records SET deleted_at = datetime('now')
             WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;
        Ok(rows > 0)
    }

    pub fn hard_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute("DELETE FROM ant_records WHERE id = ?", [id])
            .map_err(|e| translate_delete_constraint(e, &format!("fynd {}", id)))?;
        Ok(rows > 0)
    }

    pub fn count_by_event(&self, survey_event_id: i64) -> AppResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM ant_records
             WHERE survey_event_id = ? AND deleted_at IS NULL",
            [survey_event_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Individantal per art för en provyta, summerat över alla aktiva
    /// tillfällen. Underlag för mångfaldsindex.
    pub fn species_counts_for_site(&self, survey_site_id: i64) -> AppResult<Vec<(String, i64)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT sm.name, SUM(ar.count)
             FROM ant_records ar
             JOIN species_master sm ON ar.species_id = sm.id
             JOIN survey_events se ON ar.survey_event_id = se.id
             WHERE ar.deleted_at IS NULL
               AND se.deleted_at IS NULL
               AND se.survey_site_id = ?
             GROUP BY sm.name
             ORDER BY sm.name",
            )?;

        let counts = stmt
            .query_map([survey_site_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .filter_map(|r| r.ok())
            .collect();

        Ok(counts)
    }

    /// Förekomstfrekvens per art över hela datamängden
    pub fn species_frequency(&self) -> AppResult<Vec<SpeciesFrequency>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT sm.name, sm.genus, sm.subfamily,
                    COUNT(DISTINCT se.survey_site_id),
                    COUNT(ar.id),
                    COALESCE(SUM(ar.count), 0),
                    COALESCE(AVG(ar.count), 0.0)
             FROM ant_records ar
             JOIN species_master sm ON ar.species_id = sm.id
             JOIN survey_events se ON ar.survey_event_id = se.id
             WHERE ar.deleted_at IS NULL AND se.deleted_at IS NULL
             GROUP BY sm.id
             ORDER BY COALESCE(SUM(ar.count), 0) DESC, sm.name",
        )?;

        let frequencies = stmt
            .query_map([], |row| {
                Ok(SpeciesFrequency {
                    species_name: row.get(0)?,
                    genus: row.get(1)?,
                    subfamily: row.get(2)?,
                    site_count: row.get(3)?,
                    occurrence_count: row.get(4)?,
                    total_count: row.get(5)?,
                    avg_count: row.get(6)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(frequencies)
    }

    /// Artantal och individsumma för en provyta
    pub fn site_summary(&self, survey_site_id: i64) -> AppResult<SiteOccurrenceSummary> {
        let conn = self.conn.lock().unwrap();
        let summary = conn.query_row(
            "SELECT COUNT(DISTINCT ar.species_id), COALESCE(SUM(ar.count), 0)
             FROM ant_records ar
             JOIN survey_events se ON ar.survey_event_id = se.id
             WHERE ar.deleted_at IS NULL
               AND se.deleted_at IS NULL
               AND se.survey_site_id = ?",
            [survey_site_id],
            |row| {
                Ok(SiteOccurrenceSummary {
                    species_count: row.get(0)?,
                    total_individuals: row.get(1)?,
                })
            },
        )?;

        Ok(summary)
    }
}

fn row_to_detail(row: &Row) -> rusqlite::Result<AntRecordDetail> {
    Ok(AntRecordDetail {
        record: AntRecord {
            id: row.get(0)?,
            survey_event_id: row.get(1)?,
            species_id: row.get(2)?,
            count: row.get(3)?,
            remarks: row.get(4)?,
            created_at: row.get(5)?,
            updated_at: row.get(6)?,
            deleted_at: row.get(7)?,
        },
        species_name: row.get(8)?,
        survey_date: row.get(9)?,
        site_name: row.get(10)?,
        parent_site_name: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ParentSite, Species, SurveyEvent, SurveySite};
    use crate::utils::error::AppError;
    use chrono::NaiveDate;

    struct Fixture {
        db: Database,
        event_id: i64,
        site_id: i64,
    }

    fn setup() -> Fixture {
        let db = Database::open_in_memory().unwrap();

        let mut parent = ParentSite::new("Huvudlokal".into(), 35.0, 135.0);
        let parent_id = db.parent_sites().create(&mut parent, &[]).unwrap();
        let mut site = SurveySite::new(parent_id, "Yta 1".into(), 35.0, 135.0);
        let site_id = db.survey_sites().create(&mut site).unwrap();

        let date = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(9, 0, 0)
            .unwrap();
        let mut event = SurveyEvent::new(site_id, date);
        let event_id = db.survey_events().create(&mut event).unwrap();

        Fixture { db, event_id, site_id }
    }

    fn add_species(db: &Database, name: &str) -> i64 {
        db.species().get_or_create(name, None, None).unwrap()
    }

    #[test]
    fn test_create_and_detail() {
        let fx = setup();
        let species_id = add_species(&fx.db, "Formica japonica");

        let mut record = AntRecord::new(fx.event_id, species_id, 12);
        let id = fx.db.ant_records().create(&mut record).unwrap();

        let detail = fx.db.ant_records().get_by_id(id).unwrap().unwrap();
        assert_eq!(detail.species_name, "Formica japonica");
        assert_eq!(detail.site_name, "Yta 1");
        assert_eq!(detail.record.count, 12);
    }

    #[test]
    fn test_duplicate_species_per_event_rejected() {
        let fx = setup();
        let species_id = add_species(&fx.db, "Formica japonica");

        let mut first = AntRecord::new(fx.event_id, species_id, 5);
        let first_id = fx.db.ant_records().create(&mut first).unwrap();

        let mut dup = AntRecord::new(fx.event_id, species_id, 3);
        assert!(matches!(
            fx.db.ant_records().create(&mut dup),
            Err(AppError::DuplicateName(_))
        ));

        // Efter mjukradering går det att registrera arten på nytt
        fx.db.ant_records().soft_delete(first_id).unwrap();
        assert!(fx.db.ant_records().create(&mut dup).is_ok());
    }

    #[test]
    fn test_unknown_species_rejected() {
        let fx = setup();
        let mut record = AntRecord::new(fx.event_id, 999, 5);
        assert!(matches!(
            fx.db.ant_records().create(&mut record),
            Err(AppError::ReferenceNotFound(_))
        ));
    }

    #[test]
    fn test_species_soft_delete_blocked_by_active_record() {
        let fx = setup();
        let species_id = add_species(&fx.db, "Formica japonica");

        let mut record = AntRecord::new(fx.event_id, species_id, 5);
        let record_id = fx.db.ant_records().create(&mut record).unwrap();

        assert!(matches!(
            fx.db.species().soft_delete(species_id),
            Err(AppError::DependentRecordsExist(_))
        ));

        fx.db.ant_records().soft_delete(record_id).unwrap();
        assert!(fx.db.species().soft_delete(species_id).unwrap());
    }

    #[test]
    fn test_species_counts_for_site() {
        let fx = setup();
        let a = add_species(&fx.db, "Formica japonica");
        let b = add_species(&fx.db, "Tetramorium tsushimae");

        fx.db
            .ant_records()
            .create(&mut AntRecord::new(fx.event_id, a, 10))
            .unwrap();
        fx.db
            .ant_records()
            .create(&mut AntRecord::new(fx.event_id, b, 5))
            .unwrap();

        let counts = fx.db.ant_records().species_counts_for_site(fx.site_id).unwrap();
        assert_eq!(counts.len(), 2);
        assert!(counts.contains(&("Formica japonica".into(), 10)));
        assert!(counts.contains(&("Tetramorium tsushimae".into(), 5)));

        let summary = fx.db.ant_records().site_summary(fx.site_id).unwrap();
        assert_eq!(summary.species_count, 2);
        assert_eq!(summary.total_individuals, 15);
    }

    #[test]
    fn test_species_frequency_ignores_deleted() {
        let fx = setup();
        let a = add_species(&fx.db, "Formica japonica");

        let mut record = AntRecord::new(fx.event_id, a, 7);
        let record_id = fx.db.ant_records().create(&mut record).unwrap();

        let freq = fx.db.ant_records().species_frequency().unwrap();
        assert_eq!(freq.len(), 1);
        assert_eq!(freq[0].total_count, 7);
        assert_eq!(freq[0].site_count, 1);

        fx.db.ant_records().soft_delete(record_id).unwrap();
        assert!(fx.db.ant_records().species_frequency().unwrap().is_empty());
    }

    #[test]
    fn test_update_count() {
        let fx = setup();
        let species_id = add_species(&fx.db, "Formica japonica");

        let mut record = AntRecord::new(fx.event_id, species_id, 5);
        let id = fx.db.ant_records().create(&mut record).unwrap();

        let patch = AntRecordPatch {
            count: Some(9),
            ..Default::default()
        };
        assert!(fx.db.ant_records().update(id, &patch).unwrap());

        let found = fx.db.ant_records().get_by_id(id).unwrap().unwrap();
        assert_eq!(found.record.count, 9);

        let bad = AntRecordPatch {
            count: Some(-1),
            ..Default::default()
        };
        assert!(matches!(
            fx.db.ant_records().update(id, &bad),
            Err(AppError::ValueOutOfRange(_))
        ));
    }
}
