use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use std::sync::{Arc, Mutex};

use crate::models::{EnvironmentTag, ParentSite, ParentSitePatch, ParentSiteWithCount};
use crate::utils::error::{
    translate_constraint, AppError, AppResult,
};

const COLUMNS: &str = "id, name, latitude, longitude, altitude, remarks, \
                       created_at, updated_at, deleted_at";

pub struct ParentSiteRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ParentSiteRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    /// Skapa ny huvudlokal, med valfria miljötaggkopplingar.
    /// Hela skrivningen sker i en transaktion.
    pub fn create(&self, site: &mut ParentSite, environment_tags: &[i64]) -> AppResult<i64> {
        site.validate()?;

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        tx.execute(
            "INSERT INTO parent_sites (name, latitude, longitude, altitude, remarks)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                site.name,
                site.latitude,
                site.longitude,
                site.altitude,
                site.remarks,
            ],
        )
        .map_err(|e| translate_constraint(e, &format!("huvudlokal '{}'", site.name)))?;

        let id = tx.last_insert_rowid();

        for tag_id in environment_tags {
            tx.execute(
                "INSERT INTO parent_site_environments (parent_site_id, environment_tag_id)
                 VALUES (?1, ?2)",
                params![id, tag_id],
            )
            .map_err(|e| translate_constraint(e, &format!("miljötagg {}", tag_id)))?;
        }

        tx.commit()?;
        site.id = Some(id);

        Ok(id)
    }

    /// Hämta aktiv huvudlokal via ID
    pub fn get_by_id(&self, id: i64) -> AppResult<Option<ParentSite>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM parent_sites WHERE id = ? AND deleted_at IS NULL"
        ))?;

        let site = stmt.query_row([id], row_to_site).ok();
        Ok(site)
    }

    /// Hämta alla huvudlokaler, normalt endast aktiva
    pub fn get_all(&self, include_deleted: bool) -> AppResult<Vec<ParentSite>> {
        let conn = self.conn.lock().unwrap();

        let sql = if include_deleted {
            format!("SELECT {COLUMNS} FROM parent_sites ORDER BY name")
        } else {
            format!(
                "SELECT {COLUMNS} FROM parent_sites WHERE deleted_at IS NULL ORDER BY name"
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let sites = stmt
            .query_map([], row_to_site)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(sites)
    }

    /// Hämta huvudlokal via ID, även mjukraderad
    pub fn get_by_id_any(&self, id: i64) -> AppResult<Option<ParentSite>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare(&format!("SELECT {COLUMNS} FROM parent_sites WHERE id = ?"))?;

        let site = stmt.query_row([id], row_to_site).ok();
        Ok(site)
    }

    /// Partiell uppdatering: endast angivna fält ändras.
    /// Tom patch är en no-op och returnerar false.
    pub fn update(&self, id: i64, patch: &ParentSitePatch) -> AppResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Namn på huvudlokal krävs"));
            }
        }
        crate::models::validate_coordinates(
            patch.latitude.unwrap_or(0.0),
            patch.longitude.unwrap_or(0.0),
        )?;

        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

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
        if let Some(remarks) = &patch.remarks {
            sets.push("remarks = ?");
            values.push(Box::new(remarks.clone()));
        }

        let mut changed = false;

        if !sets.is_empty() {
            sets.push("updated_at = datetime('now')");
            let sql = format!(
                "UPDATE parent_sites SET {} WHERE id = ? AND deleted_at IS NULL",
                sets.join(", ")
            );
            values.push(Box::new(id));

            let rows = tx
                .execute(
                    &sql,
                    params_from_iter(values.iter().map(|v| v.as_ref() as &dyn ToSql)),
                )
                .map_err(|e| translate_constraint(e, &format!("huvudlokal {}", id)))?;
            changed = rows > 0;
        }

        // Taguppsättningen ersätts i sin helhet när den är angiven
        if let Some(tags) = &patch.environment_tags {
            tx.execute(
                "DELETE FROM parent_site_environments WHERE parent_site_id = ?",
                [id],
            )?;
            for tag_id in tags {
                tx.execute(
                    "INSERT INTO parent_site_environments (parent_site_id, environment_tag_id)
                     VALUES (?1, ?2)",
                    params![id, tag_id],
                )
                .map_err(|e| translate_constraint(e, &format!("miljötagg {}", tag_id)))?;
            }
            changed = true;
        }

        tx.commit()?;
        Ok(changed)
    }

    /// Mjukradera. Blockeras medan aktiva provytor finns kvar.
    /// Redan raderad rad är en no-op och returnerar false.
    pub fn soft_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        let active_children: i64 = tx.query_row(
            "SELECT COUNT(*) FROM survey_sites
             WHERE parent_site_id = ? AND deleted_at IS NULL",
            [id],
            |row| row.get(0),
        )?;

        if active_children > 0 {
            return Err(AppError::dependents(format!(
                "huvudlokal {} har {} aktiva provytor",
                id, active_children
            )));
        }

        let rows = tx.execute(
            "UPDATE parent_sites SET deleted_at = datetime('now')
             WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;

        tx.commit()?;
        Ok(rows > 0)
    }

    /// Fysisk radering. Schemats RESTRICT blockerar om provytor
    /// fortfarande refererar till lokalen.
    pub fn hard_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute("DELETE FROM parent_sites WHERE id = ?", [id])
            .map_err(|e| {
                crate::utils::error::translate_delete_constraint(
                    e,
                    &format!("huvudlokal {}", id),
                )
            })?;

        Ok(rows > 0)
    }

    /// Sök bland aktiva huvudlokaler (namn och anmärkningar)
    pub fn search(&self, keyword: &str) -> AppResult<Vec<ParentSite>> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("%{}%", keyword);

        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM parent_sites
             WHERE deleted_at IS NULL AND (name LIKE ?1 OR remarks LIKE ?1)
             ORDER BY name"
        ))?;

        let sites = stmt
            .query_map([&pattern], row_to_site)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(sites)
    }

    /// Miljötaggar kopplade till en huvudlokal
    pub fn get_environment_tags(&self, id: i64) -> AppResult<Vec<EnvironmentTag>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT et.id, et.name, et.description
             FROM environment_tags et
             JOIN parent_site_environments pse ON et.id = pse.environment_tag_id
             WHERE pse.parent_site_id = ?
             ORDER BY et.name",
        )?;

        let tags = stmt
            .query_map([id], row_to_tag)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(tags)
    }

    /// Alla miljötaggar i uppslagstabellen
    pub fn all_environment_tags(&self) -> AppResult<Vec<EnvironmentTag>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT id, name, description FROM environment_tags ORDER BY name")?;

        let tags = stmt
            .query_map([], row_to_tag)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(tags)
    }

    /// Aktiva huvudlokaler med antal aktiva provytor, för listvyn
    pub fn get_with_site_count(&self) -> AppResult<Vec<ParentSiteWithCount>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT ps.id, ps.name, ps.latitude, ps.longitude, ps.altitude, ps.remarks,
                    ps.created_at, ps.updated_at, ps.deleted_at,
                    COUNT(ss.id) as site_count
             FROM parent_sites ps
             LEFT JOIN survey_sites ss
                    ON ps.id = ss.parent_site_id AND ss.deleted_at IS NULL
             WHERE ps.deleted_at IS NULL
             GROUP BY ps.id
             ORDER BY ps.name",
        )?;

        let sites = stmt
            .query_map([], |row| {
                Ok(ParentSiteWithCount {
                    site: row_to_site(row)?,
                    survey_site_count: row.get(9)?,
                })
            })?
            .filter_map(|r| r.ok())
            .collect();

        Ok(sites)
    }

    /// Räkna aktiva huvudlokaler
    pub fn count(&self) -> AppResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM parent_sites WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_site(row: &Row) -> rusqlite::Result<ParentSite> {
    Ok(ParentSite {
        id: row.get(0)?,
        name: row.get(1)?,
        latitude: row.get(2)?,
        longitude: row.get(3)?,
        altitude: row.get(4)?,
        remarks: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
        deleted_at: row.get(8)?,
    })
}

fn row_to_tag(row: &Row) -> rusqlite::Result<EnvironmentTag> {
    Ok(EnvironmentTag {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    fn setup_db() -> Database {
        Database::open_in_memory().unwrap()
    }

    #[test]
    fn test_create_and_roundtrip() {
        let db = setup_db();
        let repo = db.parent_sites();

        let mut site = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        site.altitude = Some(420.0);
        site.remarks = Some("Gammal bokskog".into());

        let id = repo.create(&mut site, &[]).unwrap();
        assert!(id > 0);

        let found = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(found.name, "Skogen A");
        assert_eq!(found.latitude, 35.0);
        assert_eq!(found.longitude, 135.0);
        assert_eq!(found.altitude, Some(420.0));
        assert_eq!(found.remarks, Some("Gammal bokskog".into()));
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let db = setup_db();
        let repo = db.parent_sites();

        let mut a = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        repo.create(&mut a, &[]).unwrap();

        let mut b = ParentSite::new("Skogen A".into(), 36.0, 136.0);
        assert!(matches!(
            repo.create(&mut b, &[]),
            Err(AppError::DuplicateName(_))
        ));
    }

    #[test]
    fn test_soft_deleted_name_can_be_reused() {
        let db = setup_db();
        let repo = db.parent_sites();

        let mut a = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        let id = repo.create(&mut a, &[]).unwrap();
        assert!(repo.soft_delete(id).unwrap());

        // Unikheten gäller endast aktiva rader
        let mut b = ParentSite::new("Skogen A".into(), 36.0, 136.0);
        assert!(repo.create(&mut b, &[]).is_ok());
    }

    #[test]
    fn test_soft_delete_is_idempotent() {
        let db = setup_db();
        let repo = db.parent_sites();

        let mut site = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        let id = repo.create(&mut site, &[]).unwrap();

        assert!(repo.soft_delete(id).unwrap());
        // Andra raderingen påverkar noll rader
        assert!(!repo.soft_delete(id).unwrap());
    }

    #[test]
    fn test_soft_delete_hides_from_normal_queries() {
        let db = setup_db();
        let repo = db.parent_sites();

        let mut site = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        let id = repo.create(&mut site, &[]).unwrap();
        repo.soft_delete(id).unwrap();

        assert!(repo.get_by_id(id).unwrap().is_none());

        // Men finns kvar med raderingsstämpel
        let any = repo.get_by_id_any(id).unwrap().unwrap();
        assert!(any.deleted_at.is_some());

        let all = repo.get_all(true).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(repo.get_all(false).unwrap().len(), 0);
    }

    #[test]
    fn test_update_partial() {
        let db = setup_db();
        let repo = db.parent_sites();

        let mut site = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        let id = repo.create(&mut site, &[]).unwrap();

        let patch = ParentSitePatch {
            altitude: Some(512.0),
            ..Default::default()
        };
        assert!(repo.update(id, &patch).unwrap());

        let found = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(found.altitude, Some(512.0));
        // Oberörda fält kvarstår
        assert_eq!(found.name, "Skogen A");

        // Tom patch är en no-op
        assert!(!repo.update(id, &ParentSitePatch::default()).unwrap());
    }

    #[test]
    fn test_update_rejects_out_of_range() {
        let db = setup_db();
        let repo = db.parent_sites();

        let mut site = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        let id = repo.create(&mut site, &[]).unwrap();

        let patch = ParentSitePatch {
            latitude: Some(95.0),
            ..Default::default()
        };
        assert!(matches!(
            repo.update(id, &patch),
            Err(AppError::ValueOutOfRange(_))
        ));
    }

    #[test]
    fn test_environment_tags() {
        let db = setup_db();
        let repo = db.parent_sites();

        let tags = repo.all_environment_tags().unwrap();
        assert!(!tags.is_empty());

        let mut site = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        let id = repo
            .create(&mut site, &[tags[0].id, tags[1].id])
            .unwrap();

        let linked = repo.get_environment_tags(id).unwrap();
        assert_eq!(linked.len(), 2);
    }

    #[test]
    fn test_search() {
        let db = setup_db();
        let repo = db.parent_sites();

        let mut a = ParentSite::new("Skogen A".into(), 35.0, 135.0);
        a.remarks = Some("granplantering".into());
        repo.create(&mut a, &[]).unwrap();
        let mut b = ParentSite::new("Ängen B".into(), 36.0, 136.0);
        repo.create(&mut b, &[]).unwrap();

        assert_eq!(repo.search("Skogen").unwrap().len(), 1);
        assert_eq!(repo.search("gran").unwrap().len(), 1);
        assert_eq!(repo.search("mosse").unwrap().len(), 0);
    }
}
