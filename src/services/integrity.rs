//! Integritetsgranskning av databasen.
//!
//! Granskningen är strikt läsande och producerar en platt lista av
//! fynd. Åtgärder tillämpas separat via `fix`, ett fynd i taget och
//! var och en i sin egen transaktion.

use serde::Serialize;

use crate::db::Database;
use crate::utils::error::AppResult;

/// Typ av integritetsfynd
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FindingKind {
    OrphanedRecord,
    Duplicate,
    InvalidValue,
    MissingData,
    SuspiciousValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    High,
    Medium,
    Low,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Self::High => "Hög",
            Self::Medium => "Medel",
            Self::Low => "Låg",
        }
    }
}

/// Ett enskilt fynd från granskningen. Aldrig ett fel - alltid data.
#[derive(Debug, Clone, Serialize)]
pub struct IntegrityFinding {
    pub kind: FindingKind,
    pub severity: Severity,
    pub table: &'static str,
    pub record_id: Option<i64>,
    pub message: String,
    /// true när `fix` har en säker automatisk åtgärd
    pub fixable: bool,
}

/// Rimlig koordinatregion för studieområdet; träffar utanför flaggas
/// som misstänkta men aldrig som fel
#[derive(Debug, Clone, Copy)]
pub struct PlausibleRegion {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl Default for PlausibleRegion {
    /// Japan med omnejd
    fn default() -> Self {
        Self {
            lat_min: 24.0,
            lat_max: 46.0,
            lon_min: 123.0,
            lon_max: 146.0,
        }
    }
}

impl PlausibleRegion {
    pub fn contains(&self, latitude: f64, longitude: f64) -> bool {
        (self.lat_min..=self.lat_max).contains(&latitude)
            && (self.lon_min..=self.lon_max).contains(&longitude)
    }
}

/// Radantal per entitetstabell, för adminpanel och tester
#[derive(Debug, Clone, Serialize)]
pub struct TableStatistics {
    pub table: &'static str,
    pub active: i64,
    pub deleted: i64,
}

/// Entitetstabeller med mjukradering
const SOFT_DELETE_TABLES: &[&str] = &[
    "parent_sites",
    "survey_sites",
    "survey_events",
    "vegetation_data",
    "species_master",
    "ant_records",
];

pub struct IntegrityChecker<'a> {
    db: &'a Database,
    region: PlausibleRegion,
}

impl<'a> IntegrityChecker<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self {
            db,
            region: PlausibleRegion::default(),
        }
    }

    pub fn with_region(db: &'a Database, region: PlausibleRegion) -> Self {
        Self { db, region }
    }

    /// Kör samtliga kontroller. Varje kontroll är oberoende och
    /// adderar sina fynd till listan.
    pub fn check_all(&self) -> AppResult<Vec<IntegrityFinding>> {
        let mut findings = Vec::new();

        self.check_orphans(&mut findings)?;
        self.check_duplicates(&mut findings)?;
        self.check_invalid_values(&mut findings)?;
        self.check_missing_data(&mut findings)?;
        self.check_suspicious_coordinates(&mut findings)?;

        Ok(findings)
    }

    /// Aktiva barn vars förälder saknas eller är mjukraderad.
    /// Åtgärdas aldrig automatiskt - pekar på djupare korruption.
    fn check_orphans(&self, findings: &mut Vec<IntegrityFinding>) -> AppResult<()> {
        let orphan_queries: &[(&'static str, &str, &str)] = &[
            (
                "survey_sites",
                "SELECT ss.id FROM survey_sites ss
                 LEFT JOIN parent_sites ps
                        ON ss.parent_site_id = ps.id AND ps.deleted_at IS NULL
                 WHERE ss.deleted_at IS NULL AND ps.id IS NULL",
                "provyta {} saknar aktiv huvudlokal",
            ),
            (
                "survey_events",
                "SELECT se.id FROM survey_events se
                 LEFT JOIN survey_sites ss
                        ON se.survey_site_id = ss.id AND ss.deleted_at IS NULL
                 WHERE se.deleted_at IS NULL AND ss.id IS NULL",
                "inventeringstillfälle {} saknar aktiv provyta",
            ),
            (
                "ant_records",
                "SELECT ar.id FROM ant_records ar
                 LEFT JOIN species_master sm
                        ON ar.species_id = sm.id AND sm.deleted_at IS NULL
                 WHERE ar.deleted_at IS NULL AND sm.id IS NULL",
                "fynd {} refererar till en art som saknas",
            ),
        ];

        for (table, sql, template) in orphan_queries {
            let ids: Vec<i64> = self.db.with_connection(|conn| {
                let mut stmt = conn.prepare(sql)?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .filter_map(|r| r.ok())
                    .collect();
                Ok(ids)
            })?;

            for id in ids {
                findings.push(IntegrityFinding {
                    kind: FindingKind::OrphanedRecord,
                    severity: Severity::High,
                    table,
                    record_id: Some(id),
                    message: template.replace("{}", &id.to_string()),
                    fixable: false,
                });
            }
        }

        Ok(())
    }

    fn check_duplicates(&self, findings: &mut Vec<IntegrityFinding>) -> AppResult<()> {
        // Huvudlokalnamn som förekommer flera gånger bland aktiva rader.
        // Vilket namn som ska behållas är ett mänskligt beslut.
        let names: Vec<(String, i64)> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, COUNT(*) FROM parent_sites
                 WHERE deleted_at IS NULL
                 GROUP BY name HAVING COUNT(*) > 1",
            )?;
            let names = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(names)
        })?;

        for (name, count) in names {
            findings.push(IntegrityFinding {
                kind: FindingKind::Duplicate,
                severity: Severity::Medium,
                table: "parent_sites",
                record_id: None,
                message: format!("huvudlokalnamnet '{}' förekommer {} gånger", name, count),
                fixable: false,
            });
        }

        // Dubbla aktiva fynd för samma (tillfälle, art). Säker åtgärd:
        // behåll lägsta id, radera resten.
        let dups: Vec<(i64, i64, i64, i64)> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT survey_event_id, species_id, MIN(id), COUNT(*)
                 FROM ant_records
                 WHERE deleted_at IS NULL
                 GROUP BY survey_event_id, species_id
                 HAVING COUNT(*) > 1",
            )?;
            let dups = stmt
                .query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .filter_map(|r| r.ok())
                .collect();
            Ok(dups)
        })?;

        for (event_id, species_id, keep_id, count) in dups {
            findings.push(IntegrityFinding {
                kind: FindingKind::Duplicate,
                severity: Severity::High,
                table: "ant_records",
                record_id: Some(keep_id),
                message: format!(
                    "{} aktiva fynd för art {} vid tillfälle {}; id {} behålls",
                    count, species_id, event_id, keep_id
                ),
                fixable: true,
            });
        }

        Ok(())
    }

    fn check_invalid_values(&self, findings: &mut Vec<IntegrityFinding>) -> AppResult<()> {
        // Koordinater utanför giltigt globalt intervall
        let bad_coords: Vec<(i64, f64, f64)> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, latitude, longitude FROM parent_sites
                 WHERE deleted_at IS NULL
                   AND (latitude NOT BETWEEN -90 AND 90
                        OR longitude NOT BETWEEN -180 AND 180)",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })?;

        for (id, lat, lon) in bad_coords {
            findings.push(IntegrityFinding {
                kind: FindingKind::InvalidValue,
                severity: Severity::High,
                table: "parent_sites",
                record_id: Some(id),
                message: format!("huvudlokal {} har ogiltiga koordinater ({}, {})", id, lat, lon),
                fixable: false,
            });
        }

        // Negativa individantal kan klampas till noll
        let negative_counts: Vec<(i64, i64)> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, count FROM ant_records
                 WHERE deleted_at IS NULL AND count < 0",
            )?;
            let rows = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })?;

        for (id, count) in negative_counts {
            findings.push(IntegrityFinding {
                kind: FindingKind::InvalidValue,
                severity: Severity::High,
                table: "ant_records",
                record_id: Some(id),
                message: format!("fynd {} har negativt individantal {}", id, count),
                fixable: true,
            });
        }

        // Täckningsgrader utanför 0-100 procent
        let bad_coverage: Vec<i64> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id FROM vegetation_data
                 WHERE deleted_at IS NULL
                   AND (canopy_coverage NOT BETWEEN 0 AND 100
                        OR sasa_coverage NOT BETWEEN 0 AND 100
                        OR herb_coverage NOT BETWEEN 0 AND 100
                        OR litter_coverage NOT BETWEEN 0 AND 100)",
            )?;
            let rows = stmt
                .query_map([], |row| row.get(0))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(rows)
        })?;

        for id in bad_coverage {
            findings.push(IntegrityFinding {
                kind: FindingKind::InvalidValue,
                severity: Severity::Medium,
                table: "vegetation_data",
                record_id: Some(id),
                message: format!(
                    "vegetationsdata {} har täckningsgrad utanför 0-100 %",
                    id
                ),
                fixable: true,
            });
        }

        Ok(())
    }

    /// Saknade data är information, aldrig fel: ett tillfälle utan
    /// fynd kan vara ett legitimt fältresultat.
    fn check_missing_data(&self, findings: &mut Vec<IntegrityFinding>) -> AppResult<()> {
        let missing_queries: &[(&str, &str)] = &[
            (
                "SELECT se.id FROM survey_events se
                 WHERE se.deleted_at IS NULL
                   AND NOT EXISTS (SELECT 1 FROM vegetation_data vd
                                   WHERE vd.survey_event_id = se.id
                                     AND vd.deleted_at IS NULL)",
                "inventeringstillfälle {} saknar vegetationsdata",
            ),
            (
                "SELECT se.id FROM survey_events se
                 WHERE se.deleted_at IS NULL
                   AND NOT EXISTS (SELECT 1 FROM ant_records ar
                                   WHERE ar.survey_event_id = se.id
                                     AND ar.deleted_at IS NULL)",
                "inventeringstillfälle {} saknar myrfynd",
            ),
        ];

        for (sql, template) in missing_queries {
            let ids: Vec<i64> = self.db.with_connection(|conn| {
                let mut stmt = conn.prepare(sql)?;
                let ids = stmt
                    .query_map([], |row| row.get(0))?
                    .filter_map(|r| r.ok())
                    .collect();
                Ok(ids)
            })?;

            for id in ids {
                findings.push(IntegrityFinding {
                    kind: FindingKind::MissingData,
                    severity: Severity::Low,
                    table: "survey_events",
                    record_id: Some(id),
                    message: template.replace("{}", &id.to_string()),
                    fixable: false,
                });
            }
        }

        Ok(())
    }

    fn check_suspicious_coordinates(
        &self,
        findings: &mut Vec<IntegrityFinding>,
    ) -> AppResult<()> {
        let sites: Vec<(i64, String, f64, f64)> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, latitude, longitude FROM parent_sites
                 WHERE deleted_at IS NULL",
            )?;
            let sites = stmt
                .query_map([], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
                })?
                .filter_map(|r| r.ok())
                .collect();
            Ok(sites)
        })?;

        for (id, name, lat, lon) in sites {
            // Globalt ogiltiga koordinater rapporteras redan som fel
            if !(-90.0..=90.0).contains(&lat) || !(-180.0..=180.0).contains(&lon) {
                continue;
            }
            if !self.region.contains(lat, lon) {
                findings.push(IntegrityFinding {
                    kind: FindingKind::SuspiciousValue,
                    severity: Severity::Low,
                    table: "parent_sites",
                    record_id: Some(id),
                    message: format!(
                        "huvudlokal '{}' ligger utanför studieområdet ({}, {})",
                        name, lat, lon
                    ),
                    fixable: false,
                });
            }
        }

        Ok(())
    }

    /// Tillämpa åtgärden för ett enskilt fynd. Returnerar false för
    /// fynd utan automatisk åtgärd.
    pub fn fix(&self, finding: &IntegrityFinding) -> AppResult<bool> {
        if !finding.fixable {
            return Ok(false);
        }

        match (finding.kind, finding.table, finding.record_id) {
            // Behåll raden med lägst id, mjukradera övriga i paret
            (FindingKind::Duplicate, "ant_records", Some(keep_id)) => {
                self.db.with_connection(|conn| {
                    let tx = conn.unchecked_transaction()?;
                    let rows = tx.execute(
                        "UPDATE ant_records SET deleted_at = datetime('now')
                         WHERE deleted_at IS NULL AND id != ?1
                           AND (survey_event_id, species_id) IN
                               (SELECT survey_event_id, species_id
                                FROM ant_records WHERE id = ?1)",
                        [keep_id],
                    )?;
                    tx.commit()?;
                    Ok(rows > 0)
                })
            }
            (FindingKind::InvalidValue, "ant_records", Some(id)) => {
                self.db.with_connection(|conn| {
                    let tx = conn.unchecked_transaction()?;
                    let rows = tx.execute(
                        "UPDATE ant_records
                         SET count = 0, updated_at = datetime('now')
                         WHERE id = ? AND count < 0",
                        [id],
                    )?;
                    tx.commit()?;
                    Ok(rows > 0)
                })
            }
            (FindingKind::InvalidValue, "vegetation_data", Some(id)) => {
                self.db.with_connection(|conn| {
                    let tx = conn.unchecked_transaction()?;
                    let rows = tx.execute(
                        "UPDATE vegetation_data SET
                             canopy_coverage = MAX(0, MIN(100, canopy_coverage)),
                             sasa_coverage = MAX(0, MIN(100, sasa_coverage)),
                             herb_coverage = MAX(0, MIN(100, herb_coverage)),
                             litter_coverage = MAX(0, MIN(100, litter_coverage)),
                             updated_at = datetime('now')
                         WHERE id = ?",
                        [id],
                    )?;
                    tx.commit()?;
                    Ok(rows > 0)
                })
            }
            _ => Ok(false),
        }
    }

    /// Aktiva och mjukraderade rader per entitetstabell
    pub fn statistics(&self) -> AppResult<Vec<TableStatistics>> {
        let mut stats = Vec::with_capacity(SOFT_DELETE_TABLES.len());

        for table in SOFT_DELETE_TABLES {
            let (active, deleted) = self.db.with_connection(|conn| {
                // Tabellnamnen kommer ur den fasta listan ovan
                let sql = format!(
                    "SELECT COUNT(*) FILTER (WHERE deleted_at IS NULL),
                            COUNT(*) FILTER (WHERE deleted_at IS NOT NULL)
                     FROM {table}"
                );
                let counts =
                    conn.query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))?;
                Ok(counts)
            })?;

            stats.push(TableStatistics {
                table,
                active,
                deleted,
            });
        }

        Ok(stats)
    }
}
