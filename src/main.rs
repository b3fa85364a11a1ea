//! Myrdata Desktop - Entry Point
//!
//! Öppnar databasen, kör migrationer och rapporterar datamängdens
//! status. Presentationslagret kopplas på ovanpå kärnbiblioteket.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use myrdata::models::AppSettings;
use myrdata::services::{IntegrityChecker, SampleDataConfig, SampleDataGenerator};
use myrdata::Database;

fn main() -> Result<()> {
    // Initiera logging
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_target(false)
        .init();

    info!("Startar Myrdata Desktop v{}", env!("CARGO_PKG_VERSION"));

    let settings = AppSettings::load();

    if settings.auto_backup {
        backup_database(&settings)?;
    }

    let db = Database::open(&settings.database_path)
        .with_context(|| format!("Kunde inte öppna {}", settings.database_path.display()))?;
    db.migrate().context("Databasmigrering misslyckades")?;

    let checker = IntegrityChecker::new(&db);
    let is_empty = checker
        .statistics()?
        .iter()
        .all(|s| s.active == 0 && s.deleted == 0);

    if is_empty && settings.generate_sample_data {
        info!("Tom databas - genererar sampeldata");
        SampleDataGenerator::new(&db).generate(&SampleDataConfig::default())?;
    }

    for stat in checker.statistics()? {
        info!(
            "{}: {} aktiva, {} raderade",
            stat.table, stat.active, stat.deleted
        );
    }

    Ok(())
}

/// Kopiera databasfilen till backupkatalogen med tidsstämplat namn
fn backup_database(settings: &AppSettings) -> Result<()> {
    if !Path::new(&settings.database_path).exists() {
        return Ok(());
    }

    std::fs::create_dir_all(&settings.backup_directory)?;

    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    let target = settings
        .backup_directory
        .join(format!("myrdata_{}.db", timestamp));

    std::fs::copy(&settings.database_path, &target)
        .with_context(|| format!("Kunde inte skriva backup till {}", target.display()))?;
    info!("Backup skriven till {}", target.display());

    Ok(())
}
