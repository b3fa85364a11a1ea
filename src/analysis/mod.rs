pub mod clustering;
pub mod correlation;
pub mod diversity;
pub mod spatial;
mod special;

pub use clustering::{hierarchical, kmeans, KMeansResult, Linkage, Merge};
pub use correlation::{
    CorrelationMethod, CorrelationResult, VariableSummary, VegetationAnalyzer,
};
pub use diversity::{AccumulationPoint, DiversityAnalyzer, DiversityIndices};
pub use spatial::{haversine_km, DistanceMatrix, SiteKind, SitePoint, SpatialAnalyzer};

/// Avrunda till givet antal decimaler
pub(crate) fn round_to(value: f64, decimals: u32) -> f64 {
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}
