//! Myrdata Desktop - Datahanteringssystem för myrinventeringar
//!
//! Kärnbibliotek med databaslager, ekologisk statistik, rumslig analys
//! och integritetsgranskning. Presentationslagret ligger utanför.

pub mod analysis;
pub mod db;
pub mod models;
pub mod services;
pub mod utils;

// Re-exports
pub use db::Database;
pub use models::*;
pub use utils::{AppError, AppResult};
