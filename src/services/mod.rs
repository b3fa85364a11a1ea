//! Tjänster för Myrdata Desktop
//!
//! Innehåller granskning, export och datageneration som inte hör
//! hemma i databas- eller analyslagret.

pub mod export;
pub mod integrity;
pub mod sample_data;

pub use export::{ExportService, MatrixMode, Table};
pub use integrity::{
    FindingKind, IntegrityChecker, IntegrityFinding, PlausibleRegion, Severity, TableStatistics,
};
pub use sample_data::{SampleDataConfig, SampleDataGenerator, SampleDataSummary};
