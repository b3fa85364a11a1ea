use rusqlite::Connection;
use tracing::info;

use super::schema::{APP_VERSION, CREATE_TABLES, DEFAULT_ENVIRONMENT_TAGS, SCHEMA_VERSION};
use crate::utils::error::AppResult;

/// Kör alla nödvändiga migrationer
pub fn run_migrations(conn: &Connection) -> AppResult<()> {
    let current_version = get_current_version(conn)?;

    if current_version == 0 {
        // Ny databas - skapa allt
        info!("Skapar ny databas med schema version {}", SCHEMA_VERSION);
        initial_setup(conn)?;
    } else if current_version < SCHEMA_VERSION {
        migrate_from(conn, current_version)?;
    } else {
        info!("Databas är uppdaterad (version {})", current_version);
    }

    Ok(())
}

fn get_current_version(conn: &Connection) -> AppResult<i32> {
    // Kontrollera om schema_migrations-tabellen finns
    let table_exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_migrations')",
        [],
        |row| row.get(0),
    )?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> = conn
        .query_row("SELECT MAX(version) FROM schema_migrations", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Skapa tabeller, index och grunddata i en enda transaktion.
/// Misslyckas något rullas allt tillbaka - inget halvfärdigt schema.
fn initial_setup(conn: &Connection) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;

    tx.execute_batch(CREATE_TABLES)?;
    seed_environment_tags(&tx)?;
    seed_app_version(&tx)?;

    tx.execute(
        "INSERT INTO schema_migrations (version) VALUES (?)",
        [SCHEMA_VERSION],
    )?;

    tx.commit()?;

    info!("Initial setup klar");
    Ok(())
}

/// Läs in fasta miljötaggar, endast om tabellen är tom
fn seed_environment_tags(conn: &Connection) -> AppResult<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM environment_tags", [], |row| {
        row.get(0)
    })?;

    if count > 0 {
        return Ok(());
    }

    let mut stmt =
        conn.prepare("INSERT INTO environment_tags (name, description) VALUES (?, ?)")?;

    for (name, description) in DEFAULT_ENVIRONMENT_TAGS {
        stmt.execute([*name, *description])?;
    }

    info!("Lade till {} miljötaggar", DEFAULT_ENVIRONMENT_TAGS.len());
    Ok(())
}

/// Skriv versionsmarkören, endast om tabellen är tom
fn seed_app_version(conn: &Connection) -> AppResult<()> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM app_version", [], |row| row.get(0))?;

    if count == 0 {
        conn.execute("INSERT INTO app_version (version) VALUES (?)", [APP_VERSION])?;
    }

    Ok(())
}

fn migrate_from(conn: &Connection, from_version: i32) -> AppResult<()> {
    // Kör migrationer stegvis; version 1 är basschemat
    for version in (from_version + 1)..=SCHEMA_VERSION {
        conn.execute(
            "INSERT INTO schema_migrations (version) VALUES (?)",
            [version],
        )?;

        info!("Migrerade till version {}", version);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    #[test]
    fn test_initial_migration() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        // Verifiera att tabeller skapades
        let tables: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect();

        assert!(tables.contains(&"parent_sites".to_string()));
        assert!(tables.contains(&"survey_sites".to_string()));
        assert!(tables.contains(&"survey_events".to_string()));
        assert!(tables.contains(&"vegetation_data".to_string()));
        assert!(tables.contains(&"species_master".to_string()));
        assert!(tables.contains(&"ant_records".to_string()));
        assert!(tables.contains(&"environment_tags".to_string()));
        assert!(tables.contains(&"app_version".to_string()));
    }

    #[test]
    fn test_idempotent_migration() {
        let conn = Connection::open_in_memory().unwrap();

        // Kör migrationer två gånger - grunddata får inte dubbleras
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let version = get_current_version(&conn).unwrap();
        assert_eq!(version, SCHEMA_VERSION);

        let tag_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM environment_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tag_count, DEFAULT_ENVIRONMENT_TAGS.len() as i64);

        let version_count: i64 = conn
            .query_row("SELECT COUNT(*) FROM app_version", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version_count, 1);
    }
}
