/// SQL-schema för Myrdata Desktop
///
/// Relationspolicy, en konsekvent regel per relation:
///   - master-tabeller skyddas med RESTRICT (huvudlokal ← provyta,
///     art ← myrfynd, miljötagg ← koppling)
///   - ägda barn kaskaderas (provyta → tillfälle → vegetation/fynd)
///
/// Unikhet är avgränsad till aktiva rader via partiella index
/// (WHERE deleted_at IS NULL), så att ett mjukraderat namn kan
/// återanvändas.

pub const SCHEMA_VERSION: i32 = 1;

pub const APP_VERSION: &str = "1.0.0";

pub const CREATE_TABLES: &str = r#"
-- Huvudlokaler
CREATE TABLE IF NOT EXISTS parent_sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
    longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
    altitude REAL,
    remarks TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_parent_sites_name_active
    ON parent_sites(name) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_parent_sites_deleted ON parent_sites(deleted_at);

-- Provytor
CREATE TABLE IF NOT EXISTS survey_sites (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_site_id INTEGER NOT NULL,
    name TEXT NOT NULL,
    latitude REAL NOT NULL CHECK (latitude BETWEEN -90 AND 90),
    longitude REAL NOT NULL CHECK (longitude BETWEEN -180 AND 180),
    altitude REAL,
    area REAL CHECK (area > 0),
    remarks TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT,
    FOREIGN KEY (parent_site_id) REFERENCES parent_sites(id) ON DELETE RESTRICT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_survey_sites_parent_name_active
    ON survey_sites(parent_site_id, name) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_survey_sites_parent ON survey_sites(parent_site_id);
CREATE INDEX IF NOT EXISTS idx_survey_sites_deleted ON survey_sites(deleted_at);

-- Inventeringstillfällen
CREATE TABLE IF NOT EXISTS survey_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    survey_site_id INTEGER NOT NULL,
    survey_date TEXT NOT NULL,
    surveyor_name TEXT,
    weather TEXT CHECK (weather IN ('clear', 'cloudy', 'rain', 'snow')),
    temperature REAL,
    remarks TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT,
    FOREIGN KEY (survey_site_id) REFERENCES survey_sites(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_survey_events_site ON survey_events(survey_site_id);
CREATE INDEX IF NOT EXISTS idx_survey_events_date ON survey_events(survey_date);
CREATE INDEX IF NOT EXISTS idx_survey_events_deleted ON survey_events(deleted_at);

-- Vegetationsdata, högst en aktiv post per tillfälle
CREATE TABLE IF NOT EXISTS vegetation_data (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    survey_event_id INTEGER NOT NULL,
    dominant_tree TEXT,
    dominant_sasa TEXT,
    dominant_herb TEXT,
    litter_type TEXT,
    basal_area REAL CHECK (basal_area >= 0),
    avg_tree_height REAL CHECK (avg_tree_height >= 0),
    avg_herb_height REAL CHECK (avg_herb_height >= 0),
    soil_temperature REAL,
    canopy_coverage REAL CHECK (canopy_coverage BETWEEN 0 AND 100),
    sasa_coverage REAL CHECK (sasa_coverage BETWEEN 0 AND 100),
    herb_coverage REAL CHECK (herb_coverage BETWEEN 0 AND 100),
    litter_coverage REAL CHECK (litter_coverage BETWEEN 0 AND 100),
    light_condition INTEGER CHECK (light_condition BETWEEN 1 AND 5),
    soil_moisture INTEGER CHECK (soil_moisture BETWEEN 1 AND 5),
    vegetation_complexity INTEGER CHECK (vegetation_complexity BETWEEN 1 AND 5),
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT,
    FOREIGN KEY (survey_event_id) REFERENCES survey_events(id) ON DELETE CASCADE
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_vegetation_event_active
    ON vegetation_data(survey_event_id) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_vegetation_event ON vegetation_data(survey_event_id);

-- Artmaster
CREATE TABLE IF NOT EXISTS species_master (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL,
    genus TEXT,
    subfamily TEXT,
    remarks TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_species_name_active
    ON species_master(name) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_species_deleted ON species_master(deleted_at);

-- Myrfynd
CREATE TABLE IF NOT EXISTS ant_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    survey_event_id INTEGER NOT NULL,
    species_id INTEGER NOT NULL,
    count INTEGER NOT NULL CHECK (count >= 0),
    remarks TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at TEXT NOT NULL DEFAULT (datetime('now')),
    deleted_at TEXT,
    FOREIGN KEY (survey_event_id) REFERENCES survey_events(id) ON DELETE CASCADE,
    FOREIGN KEY (species_id) REFERENCES species_master(id) ON DELETE RESTRICT
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_ant_records_event_species_active
    ON ant_records(survey_event_id, species_id) WHERE deleted_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_ant_records_event ON ant_records(survey_event_id);
CREATE INDEX IF NOT EXISTS idx_ant_records_species ON ant_records(species_id);

-- Miljötaggar
CREATE TABLE IF NOT EXISTS environment_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Koppling huvudlokal-miljötagg
CREATE TABLE IF NOT EXISTS parent_site_environments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    parent_site_id INTEGER NOT NULL,
    environment_tag_id INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now')),
    FOREIGN KEY (parent_site_id) REFERENCES parent_sites(id) ON DELETE CASCADE,
    FOREIGN KEY (environment_tag_id) REFERENCES environment_tags(id) ON DELETE RESTRICT,
    UNIQUE (parent_site_id, environment_tag_id)
);

-- Versionsmarkör
CREATE TABLE IF NOT EXISTS app_version (
    version TEXT PRIMARY KEY,
    released_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Migrationshistorik
CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

/// Fasta miljötaggar som läses in vid första start
pub const DEFAULT_ENVIRONMENT_TAGS: &[(&str, &str)] = &[
    ("Lövfällande lövskog", "Skog dominerad av bok, ek och andra lövfällande trädslag"),
    ("Städsegrön lövskog", "Skog dominerad av städsegröna lövträd"),
    ("Barrskog", "Planterad eller naturlig skog av gran, tall eller lärk"),
    ("Blandskog", "Skog med blandning av löv- och barrträd"),
    ("Gräsmark", "Öppen mark dominerad av örter och gräs"),
    ("Sasafält", "Miljö med tät växtlighet av sasa-bambu"),
    ("Odlingsmark", "Risfält, åkermark och fruktodlingar"),
    ("Stadsmiljö", "Bostadsområden, parker och annan anlagd miljö"),
    ("Flodbädd", "Grus- och gräsmarker längs vattendrag"),
];
