pub mod schema;
pub mod migrations;
pub mod parent_site_repo;
pub mod survey_site_repo;
pub mod survey_event_repo;
pub mod vegetation_repo;
pub mod species_repo;
pub mod ant_record_repo;

use rusqlite::Connection;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::utils::error::AppResult;

pub use ant_record_repo::AntRecordRepository;
pub use parent_site_repo::ParentSiteRepository;
pub use species_repo::SpeciesRepository;
pub use survey_event_repo::{EventFilter, SurveyEventRepository};
pub use survey_site_repo::SurveySiteRepository;
pub use vegetation_repo::VegetationRepository;

/// Huvuddatabas-wrapper med thread-safe access
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Öppna eller skapa databas
    pub fn open(path: &Path) -> AppResult<Self> {
        // Skapa katalog om den inte finns
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;

        // Konfigurera SQLite
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Öppna in-memory databas (för tester)
    pub fn open_in_memory() -> AppResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;

        let db = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        db.migrate()?;
        Ok(db)
    }

    /// Kör databasmigrationer
    pub fn migrate(&self) -> AppResult<()> {
        let conn = self.conn.lock().unwrap();
        migrations::run_migrations(&conn)
    }

    /// Hämta repository för huvudlokaler
    pub fn parent_sites(&self) -> ParentSiteRepository {
        ParentSiteRepository::new(Arc::clone(&self.conn))
    }

    /// Hämta repository för provytor
    pub fn survey_sites(&self) -> SurveySiteRepository {
        SurveySiteRepository::new(Arc::clone(&self.conn))
    }

    /// Hämta repository för inventeringstillfällen
    pub fn survey_events(&self) -> SurveyEventRepository {
        SurveyEventRepository::new(Arc::clone(&self.conn))
    }

    /// Hämta repository för vegetationsdata
    pub fn vegetation(&self) -> VegetationRepository {
        VegetationRepository::new(Arc::clone(&self.conn))
    }

    /// Hämta repository för artmastern
    pub fn species(&self) -> SpeciesRepository {
        SpeciesRepository::new(Arc::clone(&self.conn))
    }

    /// Hämta repository för myrfynd
    pub fn ant_records(&self) -> AntRecordRepository {
        AntRecordRepository::new(Arc::clone(&self.conn))
    }

    /// Direkt tillgång till connection (för avancerade operationer)
    pub fn with_connection<F, T>(&self, f: F) -> AppResult<T>
    where
        F: FnOnce(&Connection) -> AppResult<T>,
    {
        let conn = self.conn.lock().unwrap();
        f(&conn)
    }
}

impl Clone for Database {
    fn clone(&self) -> Self {
        Self {
            conn: Arc::clone(&self.conn),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ParentSite;

    #[test]
    fn test_open_creates_file_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("myrdata.db");

        {
            let db = Database::open(&path).unwrap();
            db.migrate().unwrap();

            let mut site = ParentSite::new("Skogen A".into(), 35.0, 135.0);
            db.parent_sites().create(&mut site, &[]).unwrap();
        }

        // Återöppning läser samma data
        let db = Database::open(&path).unwrap();
        db.migrate().unwrap();
        let sites = db.parent_sites().get_all(false).unwrap();
        assert_eq!(sites.len(), 1);
        assert_eq!(sites[0].name, "Skogen A");
    }
}
