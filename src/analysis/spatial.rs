use serde::Serialize;

use crate::db::Database;
use crate::utils::error::AppResult;

/// Jordradie i kilometer
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Storcirkelavstånd i kilometer enligt haversineformeln
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    if lat1 == lat2 && lon1 == lon2 {
        return 0.0;
    }

    let d_lat = (lat2 - lat1).to_radians();
    let d_lon = (lon2 - lon1).to_radians();

    let a = (d_lat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (d_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_KM * c
}

/// Vilken platsmängd en rumslig analys ska gälla
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SiteKind {
    Survey,
    Parent,
}

/// Plats med koordinater, underlag för avståndsmatris och klustring
#[derive(Debug, Clone, Serialize)]
pub struct SitePoint {
    pub id: i64,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Symmetrisk avståndsmatris med namnetiketter, diagonalen noll
#[derive(Debug, Clone, Serialize)]
pub struct DistanceMatrix {
    pub labels: Vec<String>,
    /// distances[i][j] = avstånd i km mellan plats i och j
    pub distances: Vec<Vec<f64>>,
}

impl DistanceMatrix {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }
}

/// Rumsliga beräkningar över platskoordinater
pub struct SpatialAnalyzer {
    db: Database,
}

impl SpatialAnalyzer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Aktiva platser av vald sort, med koordinater
    pub fn site_points(&self, kind: SiteKind) -> AppResult<Vec<SitePoint>> {
        match kind {
            SiteKind::Survey => {
                let sites = self.db.survey_sites().get_all(None)?;
                Ok(sites
                    .into_iter()
                    .filter_map(|s| {
                        s.id.map(|id| SitePoint {
                            id,
                            name: s.name,
                            latitude: s.latitude,
                            longitude: s.longitude,
                        })
                    })
                    .collect())
            }
            SiteKind::Parent => {
                let sites = self.db.parent_sites().get_all(false)?;
                Ok(sites
                    .into_iter()
                    .filter_map(|s| {
                        s.id.map(|id| SitePoint {
                            id,
                            name: s.name,
                            latitude: s.latitude,
                            longitude: s.longitude,
                        })
                    })
                    .collect())
            }
        }
    }

    /// Fullständig parvis avståndsmatris för vald platsmängd
    pub fn distance_matrix(&self, kind: SiteKind) -> AppResult<DistanceMatrix> {
        let points = self.site_points(kind)?;
        Ok(build_distance_matrix(&points))
    }
}

pub fn build_distance_matrix(points: &[SitePoint]) -> DistanceMatrix {
    let n = points.len();
    let mut distances = vec![vec![0.0; n]; n];

    for i in 0..n {
        for j in (i + 1)..n {
            let d = haversine_km(
                points[i].latitude,
                points[i].longitude,
                points[j].latitude,
                points[j].longitude,
            );
            distances[i][j] = d;
            distances[j][i] = d;
        }
    }

    DistanceMatrix {
        labels: points.iter().map(|p| p.name.clone()).collect(),
        distances,
    }
}
