use chrono::NaiveDateTime;
use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use std::sync::{Arc, Mutex};

use crate::models::{SurveyEvent, SurveyEventDetail, SurveyEventPatch, Weather};
use crate::utils::error::{translate_constraint, translate_delete_constraint, AppResult};

const COLUMNS: &str = "id, survey_site_id, survey_date, surveyor_name, weather, temperature, \
                       remarks, created_at, updated_at, deleted_at";

/// Filter för tillfälleslistor; utelämnade fält begränsar inte
#[derive(Debug, Default, Clone)]
pub struct EventFilter {
    pub survey_site_id: Option<i64>,
    pub date_from: Option<NaiveDateTime>,
    pub date_to: Option<NaiveDateTime>,
}

pub struct SurveyEventRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SurveyEventRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn create(&self, event: &mut SurveyEvent) -> AppResult<i64> {
        event.validate()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO survey_events
                (survey_site_id, survey_date, surveyor_name, weather, temperature, remarks)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.survey_site_id,
                event.survey_date,
                event.surveyor_name,
                event.weather.map(|w| w.as_db_str()),
                event.temperature,
                event.remarks,
            ],
        )
        .map_err(|e| {
            translate_constraint(e, &format!("tillfälle på provyta {}", event.survey_site_id))
        })?;

        let id = conn.last_insert_rowid();
        event.id = Some(id);
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> AppResult<Option<SurveyEvent>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM survey_events WHERE id = ? AND deleted_at IS NULL"
        ))?;

        let event = stmt.query_row([id], row_to_event).ok();
        Ok(event)
    }

    /// Tillfällen med plats- och lokalnamn, filtrerade och nyast först
    pub fn get_all(&self, filter: &EventFilter) -> AppResult<Vec<SurveyEventDetail>> {
        let conn = self.conn.lock().unwrap();

        let mut sql = String::from(
            "SELECT se.id, se.survey_site_id, se.survey_date, se.surveyor_name, se.weather,
                    se.temperature, se.remarks, se.created_at, se.updated_at, se.deleted_at,
                    ss.name, ps.name
             FROM survey_events se
             JOIN survey_sites ss ON se.survey_site_id = ss.id
             JOIN parent_sites ps ON ss.parent_site_id = ps.id
             WHERE se.deleted_at IS NULL",
        );
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(site_id) = filter.survey_site_id {
            sql.push_str(" AND se.survey_site_id = ?");
            values.push(Box::new(site_id));
        }
        if let Some(from) = filter.date_from {
            sql.push_str(" AND se.survey_date >= ?");
            values.push(Box::new(from));
        }
        if let Some(to) = filter.date_to {
            sql.push_str(" AND se.survey_date <= ?");
            values.push(Box::new(to));
        }
        sql.push_str(" ORDER BY se.survey_date DESC");

        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(
                params_from_iter(values.iter().map(|v| v.as_ref() as &dyn ToSql)),
                row_to_detail,
            )?
            .filter_map(|r| r.ok())
            .collect();

        Ok(events)
    }

    /// De senaste tillfällena, för startvyn
    pub fn get_recent(&self, limit: i64) -> AppResult<Vec<SurveyEventDetail>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT se.id, se.survey_site_id, se.survey_date, se.surveyor_name, se.weather,
                    se.temperature, se.remarks, se.created_at, se.updated_at, se.deleted_at,
                    ss.name, ps.name
             FROM survey_events se
             JOIN survey_sites ss ON se.survey_site_id = ss.id
             JOIN parent_sites ps ON ss.parent_site_id = ps.id
             WHERE se.deleted_at IS NULL
             ORDER BY se.survey_date DESC
             LIMIT ?",
        )?;

        let events = stmt
            .query_map([limit], row_to_detail)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(events)
    }

    pub fn update(&self, id: i64, patch: &SurveyEventPatch) -> AppResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        let conn = self.conn.lock().unwrap();

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(date) = patch.survey_date {
            sets.push("survey_date = ?");
            values.push(Box::new(date));
        }
        if let Some(name) = &patch.surveyor_name {
            sets.push("surveyor_name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(weather) = patch.weather {
            sets.push("weather = ?");
            values.push(Box::new(weather.as_db_str()));
        }
        if let Some(temperature) = patch.temperature {
            sets.push("temperature = ?");
            values.push(Box::new(temperature));
        }
        if let Some(remarks) = &patch.remarks {
            sets.push("remarks = ?");
            values.push(Box::new(remarks.clone()));
        }
        sets.push("updated_at = datetime('now')");

        let sql = format!(
            "UPDATE survey_events SET {} WHERE id = ? AND deleted_at IS NULL",
            sets.join(", ")
        );
        values.push(Box::new(id));

        let rows = conn
            .execute(
                &sql,
                params_from_iter(values.iter().map(|v| v.as_ref() as &dyn ToSql)),
            )
            .map_err(|e| translate_constraint(e, &format!("tillfälle {}", id)))?;

        Ok(rows > 0)
    }

    /// Mjukradera tillfället och kaskadera till vegetation och fynd
    pub fn soft_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "UPDATE vegetation_data SET deleted_at = datetime('now')
             WHERE deleted_at IS NULL AND survey_event_id = ?",
            [id],
        )?;
        tx.execute(
            "UPDATE ant_records SET deleted_at = datetime('now')
             WHERE deleted_at IS NULL AND survey_event_id = ?",
            [id],
        )?;

        let rows = tx.execute(
            "UPDATE survey_events SET deleted_at = datetime('now')
             WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;

        tx.commit()?;
        Ok(rows > 0)
    }

    pub fn hard_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute("DELETE FROM survey_events WHERE id = ?", [id])
            .map_err(|e| translate_delete_constraint(e, &format!("tillfälle {}", id)))?;

        Ok(rows > 0)
    }

    pub fn count_by_site(&self, survey_site_id: i64) -> AppResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM survey_events
             WHERE survey_site_id = ? AND deleted_at IS NULL",
            [survey_site_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_event(row: &Row) -> rusqlite::Result<SurveyEvent> {
    let weather: Option<String> = row.get(4)?;

    Ok(SurveyEvent {
        id: row.get(0)?,
        survey_site_id: row.get(1)?,
        survey_date: row.get(2)?,
        surveyor_name: row.get(3)?,
        weather: weather.as_deref().and_then(Weather::from_db_str),
        temperature: row.get(5)?,
        remarks: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
        deleted_at: row.get(9)?,
    })
}

fn row_to_detail(row: &Row) -> rusqlite::Result<SurveyEventDetail> {
    Ok(SurveyEventDetail {
        event: row_to_event(row)?,
        site_name: row.get(10)?,
        parent_site_name: row.get(11)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use crate::models::{ParentSite, SurveySite, VegetationRecord};
    use chrono::NaiveDate;

    fn setup_site(db: &Database) -> i64 {
        let mut parent = ParentSite::new("Huvudlokal".into(), 35.0, 135.0);
        let parent_id = db.parent_sites().create(&mut parent, &[]).unwrap();
        let mut site = SurveySite::new(parent_id, "Yta 1".into(), 35.0, 135.0);
        db.survey_sites().create(&mut site).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_create_and_detail_names() {
        let db = Database::open_in_memory().unwrap();
        let site_id = setup_site(&db);

        let mut event = SurveyEvent::new(site_id, date(2024, 6, 1));
        event.weather = Some(Weather::Clear);
        event.temperature = Some(22.5);
        event.surveyor_name = Some("Johan".into());
        db.survey_events().create(&mut event).unwrap();

        let all = db.survey_events().get_all(&EventFilter::default()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].site_name, "Yta 1");
        assert_eq!(all[0].parent_site_name, "Huvudlokal");
        assert_eq!(all[0].event.weather, Some(Weather::Clear));
    }

    #[test]
    fn test_date_filter() {
        let db = Database::open_in_memory().unwrap();
        let site_id = setup_site(&db);

        for (m, d) in [(4, 1), (6, 15), (9, 30)] {
            let mut event = SurveyEvent::new(site_id, date(2024, m, d));
            db.survey_events().create(&mut event).unwrap();
        }

        let filter = EventFilter {
            date_from: Some(date(2024, 5, 1)),
            date_to: Some(date(2024, 7, 1)),
            ..Default::default()
        };
        let hits = db.survey_events().get_all(&filter).unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].event.survey_date, date(2024, 6, 15));
    }

    #[test]
    fn test_soft_delete_cascades_to_children() {
        let db = Database::open_in_memory().unwrap();
        let site_id = setup_site(&db);

        let mut event = SurveyEvent::new(site_id, date(2024, 6, 1));
        let event_id = db.survey_events().create(&mut event).unwrap();

        let mut veg = VegetationRecord::new(event_id);
        veg.canopy_coverage = Some(80.0);
        db.vegetation().create(&mut veg).unwrap();

        assert!(db.survey_events().soft_delete(event_id).unwrap());
        assert!(db.survey_events().get_by_id(event_id).unwrap().is_none());
        assert!(db.vegetation().get_by_event(event_id).unwrap().is_none());

        // Andra raderingen är en no-op
        assert!(!db.survey_events().soft_delete(event_id).unwrap());
    }

    #[test]
    fn test_update_weather_and_ordering() {
        let db = Database::open_in_memory().unwrap();
        let site_id = setup_site(&db);

        let mut first = SurveyEvent::new(site_id, date(2024, 4, 1));
        let first_id = db.survey_events().create(&mut first).unwrap();
        let mut second = SurveyEvent::new(site_id, date(2024, 8, 1));
        db.survey_events().create(&mut second).unwrap();

        let patch = SurveyEventPatch {
            weather: Some(Weather::Rain),
            temperature: Some(14.0),
            ..Default::default()
        };
        assert!(db.survey_events().update(first_id, &patch).unwrap());

        let all = db.survey_events().get_all(&EventFilter::default()).unwrap();
        // Nyast först
        assert_eq!(all[0].event.survey_date, date(2024, 8, 1));
        assert_eq!(all[1].event.weather, Some(Weather::Rain));
    }
}
