use rusqlite::{params, params_from_iter, Connection, Row, ToSql};
use std::sync::{Arc, Mutex};

use crate::models::{Species, SpeciesPatch};
use crate::utils::error::{translate_constraint, translate_delete_constraint, AppError, AppResult};

const COLUMNS: &str = "id, name, genus, subfamily, remarks, created_at, updated_at, deleted_at";

pub struct SpeciesRepository {
    conn: Arc<Mutex<Connection>>,
}

impl SpeciesRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    pub fn create(&self, species: &mut Species) -> AppResult<i64> {
        species.validate()?;

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO species_master (name, genus, subfamily, remarks)
             VALUES (?1, ?2, ?3, ?4)",
            params![species.name, species.genus, species.subfamily, species.remarks],
        )
        .map_err(|e| translate_constraint(e, &format!("art '{}'", species.name)))?;

        let id = conn.last_insert_rowid();
        species.id = Some(id);
        Ok(id)
    }

    pub fn get_by_id(&self, id: i64) -> AppResult<Option<Species>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM species_master WHERE id = ? AND deleted_at IS NULL"
        ))?;

        let species = stmt.query_row([id], row_to_species).ok();
        Ok(species)
    }

    /// Hämta aktiv art via exakt namn
    pub fn get_by_name(&self, name: &str) -> AppResult<Option<Species>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM species_master WHERE name = ? AND deleted_at IS NULL"
        ))?;

        let species = stmt.query_row([name], row_to_species).ok();
        Ok(species)
    }

    pub fn get_all(&self, include_deleted: bool) -> AppResult<Vec<Species>> {
        let conn = self.conn.lock().unwrap();

        let sql = if include_deleted {
            format!("SELECT {COLUMNS} FROM species_master ORDER BY name")
        } else {
            format!(
                "SELECT {COLUMNS} FROM species_master WHERE deleted_at IS NULL ORDER BY name"
            )
        };

        let mut stmt = conn.prepare(&sql)?;
        let species = stmt
            .query_map([], row_to_species)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(species)
    }

    /// Hämta befintlig art via namn, eller skapa en ny.
    /// Används av sampeldata och import.
    pub fn get_or_create(
        &self,
        name: &str,
        genus: Option<&str>,
        subfamily: Option<&str>,
    ) -> AppResult<i64> {
        if let Some(existing) = self.get_by_name(name)? {
            // id är alltid satt för rader lästa ur databasen
            return existing
                .id
                .ok_or_else(|| AppError::other("art utan id"));
        }

        let mut species = Species::new(name.to_string());
        species.genus = genus.map(str::to_string);
        species.subfamily = subfamily.map(str::to_string);
        self.create(&mut species)
    }

    pub fn update(&self, id: i64, patch: &SpeciesPatch) -> AppResult<bool> {
        if patch.is_empty() {
            return Ok(false);
        }

        if let Some(name) = &patch.name {
            if name.trim().is_empty() {
                return Err(AppError::validation("Artnamn krävs"));
            }
        }

        let conn = self.conn.lock().unwrap();

        let mut sets: Vec<&str> = Vec::new();
        let mut values: Vec<Box<dyn ToSql>> = Vec::new();

        if let Some(name) = &patch.name {
            sets.push("name = ?");
            values.push(Box::new(name.clone()));
        }
        if let Some(genus) = &patch.genus {
            sets.push("genus = ?");
            values.push(Box::new(genus.clone()));
        }
        if let Some(subfamily) = &patch.subfamily {
            sets.push("subfamily = ?");
            values.push(Box::new(subfamily.clone()));
        }
        if let Some(remarks) = &patch.remarks {
            sets.push("remarks = ?");
            values.push(Box::new(remarks.clone()));
        }
        sets.push("updated_at = datetime('now')");

        let sql = format!(
            "UPDATE species_master SET {} WHERE id = ? AND deleted_at IS NULL",
            sets.join(", ")
        );
        values.push(Box::new(id));

        let rows = conn
            .execute(
                &sql,
                params_from_iter(values.iter().map(|v| v.as_ref() as &dyn ToSql)),
            )
            .map_err(|e| translate_constraint(e, &format!("art {}", id)))?;

        Ok(rows > 0)
    }

    /// Mjukradera. Blockeras medan aktiva fynd refererar till arten.
    pub fn soft_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let tx = conn.unchecked_transaction()?;

        let active_records: i64 = tx.query_row(
            "SELECT COUNT(*) FROM ant_records
             WHERE species_id = ? AND deleted_at IS NULL",
            [id],
            |row| row.get(0),
        )?;

        if active_records > 0 {
            return Err(AppError::dependents(format!(
                "art {} har {} aktiva fynd",
                id, active_records
            )));
        }

        let rows = tx.execute(
            "UPDATE species_master SET deleted_at = datetime('now')
             WHERE id = ? AND deleted_at IS NULL",
            [id],
        )?;

        tx.commit()?;
        Ok(rows > 0)
    }

    /// Fysisk radering; schemats RESTRICT blockerar om fynd finns kvar
    pub fn hard_delete(&self, id: i64) -> AppResult<bool> {
        let conn = self.conn.lock().unwrap();
        let rows = conn
            .execute("DELETE FROM species_master WHERE id = ?", [id])
            .map_err(|e| translate_delete_constraint(e, &format!("art {}", id)))?;

        Ok(rows > 0)
    }

    /// Sök bland aktiva arter (namn, släkte, underfamilj)
    pub fn search(&self, keyword: &str) -> AppResult<Vec<Species>> {
        let conn = self.conn.lock().unwrap();
        let pattern = format!("%{}%", keyword);

        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM species_master
             WHERE deleted_at IS NULL
               AND (name LIKE ?1 OR genus LIKE ?1 OR subfamily LIKE ?1)
             ORDER BY name"
        ))?;

        let species = stmt
            .query_map([&pattern], row_to_species)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(species)
    }

    pub fn get_by_subfamily(&self, subfamily: &str) -> AppResult<Vec<Species>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM species_master
             WHERE deleted_at IS NULL AND subfamily = ?
             ORDER BY name"
        ))?;

        let species = stmt
            .query_map([subfamily], row_to_species)?
            .filter_map(|r| r.ok())
            .collect();

        Ok(species)
    }

    pub fn count(&self) -> AppResult<i64> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM species_master WHERE deleted_at IS NULL",
            [],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}

fn row_to_species(row: &Row) -> rusqlite::Result<Species> {
    Ok(Species {
        id: row.get(0)?,
        name: row.get(1)?,
        genus: row.get(2)?,
        subfamily: row.get(3)?,
        remarks: row.get(4)?,
        created_at: row.get(5)?,
        updated_at: row.get(6)?,
        deleted_at: row.get(7)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;

    #[test]
    fn test_unique_name_among_active() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.species();

        let mut a = Species::new("Formica japonica".into());
        let id = repo.create(&mut a).unwrap();

        let mut dup = Species::new("Formica japonica".into());
        assert!(matches!(
            repo.create(&mut dup),
            Err(AppError::DuplicateName(_))
        ));

        repo.soft_delete(id).unwrap();
        assert!(repo.create(&mut dup).is_ok());
    }

    #[test]
    fn test_get_or_create() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.species();

        let id1 = repo
            .get_or_create("Camponotus japonicus", Some("Camponotus"), Some("Formicinae"))
            .unwrap();
        let id2 = repo
            .get_or_create("Camponotus japonicus", None, None)
            .unwrap();
        assert_eq!(id1, id2);
        assert_eq!(repo.count().unwrap(), 1);

        let found = repo.get_by_id(id1).unwrap().unwrap();
        assert_eq!(found.genus, Some("Camponotus".into()));
    }

    #[test]
    fn test_search_matches_genus_and_subfamily() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.species();

        let mut a = Species::new("Formica japonica".into());
        a.genus = Some("Formica".into());
        a.subfamily = Some("Formicinae".into());
        repo.create(&mut a).unwrap();

        let mut b = Species::new("Tetramorium tsushimae".into());
        b.genus = Some("Tetramorium".into());
        b.subfamily = Some("Myrmicinae".into());
        repo.create(&mut b).unwrap();

        assert_eq!(repo.search("Formica").unwrap().len(), 1);
        assert_eq!(repo.search("Myrmicinae").unwrap().len(), 1);
        assert_eq!(repo.get_by_subfamily("Formicinae").unwrap().len(), 1);
    }

    #[test]
    fn test_update_partial() {
        let db = Database::open_in_memory().unwrap();
        let repo = db.species();

        let mut species = Species::new("Formica japonica".into());
        let id = repo.create(&mut species).unwrap();

        let patch = SpeciesPatch {
            subfamily: Some("Formicinae".into()),
            ..Default::default()
        };
        assert!(repo.update(id, &patch).unwrap());

        let found = repo.get_by_id(id).unwrap().unwrap();
        assert_eq!(found.subfamily, Some("Formicinae".into()));
        assert_eq!(found.name, "Formica japonica");

        assert!(!repo.update(id, &SpeciesPatch::default()).unwrap());
    }
}
