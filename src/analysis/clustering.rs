use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::SeedableRng;
use serde::Serialize;

use crate::utils::error::{AppError, AppResult};

/// Fast frö: klustringen ska ge samma resultat vid varje körning
const KMEANS_SEED: u64 = 42;
const KMEANS_MAX_ITER: usize = 100;

/// Resultat av k-medelklustring över platskoordinater
#[derive(Debug, Clone, Serialize)]
pub struct KMeansResult {
    /// Klusterindex per punkt, i samma ordning som indata
    pub assignments: Vec<usize>,
    pub centroids: Vec<(f64, f64)>,
    /// Summan av kvadrerade avstånd till tilldelad centroid
    pub inertia: f64,
}

/// K-medelklustring (Lloyds algoritm) på råa koordinater.
/// Deterministisk tack vare fast frö.
pub fn kmeans(points: &[(f64, f64)], k: usize) -> AppResult<KMeansResult> {
    if k == 0 {
        return Err(AppError::validation("Antal kluster måste vara minst 1"));
    }
    if points.len() < k {
        return Err(AppError::insufficient(format!(
            "klustring med k={} kräver minst {} platser, fick {}",
            k,
            k,
            points.len()
        )));
    }

    // Distinkta startcentroider, slumpade med fast frö
    let mut rng = StdRng::seed_from_u64(KMEANS_SEED);
    let mut centroids: Vec<(f64, f64)> = sample(&mut rng, points.len(), k)
        .into_iter()
        .map(|i| points[i])
        .collect();

    let mut assignments = vec![0usize; points.len()];

    for _ in 0..KMEANS_MAX_ITER {
        let mut changed = false;

        for (i, point) in points.iter().enumerate() {
            let nearest = nearest_centroid(point, &centroids);
            if assignments[i] != nearest {
                assignments[i] = nearest;
                changed = true;
            }
        }

        // Uppdatera centroider; tomma kluster behåller sin position
        let mut sums = vec![(0.0, 0.0, 0usize); k];
        for (i, point) in points.iter().enumerate() {
            let cluster = assignments[i];
            sums[cluster].0 += point.0;
            sums[cluster].1 += point.1;
            sums[cluster].2 += 1;
        }
        for (cluster, &(sum_lat, sum_lon, count)) in sums.iter().enumerate() {
            if count > 0 {
                centroids[cluster] = (sum_lat / count as f64, sum_lon / count as f64);
            }
        }

        if !changed {
            break;
        }
    }

    let inertia = points
        .iter()
        .zip(&assignments)
        .map(|(point, &cluster)| squared_distance(point, &centroids[cluster]))
        .sum();

    Ok(KMeansResult {
        assignments,
        centroids,
        inertia,
    })
}

fn nearest_centroid(point: &(f64, f64), centroids: &[(f64, f64)]) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (i, centroid) in centroids.iter().enumerate() {
        let d = squared_distance(point, centroid);
        if d < best_dist {
            best_dist = d;
            best = i;
        }
    }
    best
}

fn squared_distance(a: &(f64, f64), b: &(f64, f64)) -> f64 {
    let dx = a.0 - b.0;
    let dy = a.1 - b.1;
    dx * dx + dy * dy
}

/// Länkningsmetod för hierarkisk klustring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Linkage {
    Ward,
    Single,
    Complete,
    Average,
}

impl Linkage {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Ward => "Ward",
            Self::Single => "Enkel",
            Self::Complete => "Komplett",
            Self::Average => "Medel",
        }
    }
}

/// En sammanslagning i länkningsträdet. Kluster 0..n-1 är de
/// ursprungliga punkterna; sammanslagning nummer s bildar kluster n+s.
#[derive(Debug, Clone, Serialize)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    /// Avståndet vid vilket klustren slogs samman
    pub height: f64,
    /// Antal punkter i det nya klustret
    pub size: usize,
}

/// Agglomerativ hierarkisk klustring via Lance-Williams-uppdatering
/// av avståndsmatrisen. Returnerar n-1 sammanslagningar i ordning.
pub fn hierarchical(distances: &[Vec<f64>], linkage: Linkage) -> AppResult<Vec<Merge>> {
    let n = distances.len();
    if n < 2 {
        return Err(AppError::insufficient(format!(
            "hierarkisk klustring kräver minst 2 platser, fick {}",
            n
        )));
    }

    // Ward räknar internt på kvadrerade avstånd
    let mut dist = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..n {
            dist[i][j] = match linkage {
                Linkage::Ward => distances[i][j] * distances[i][j],
                _ => distances[i][j],
            };
        }
    }

    // active[i] = aktuellt klusternummer för rad i, None när uppslukat
    let mut cluster_id: Vec<Option<usize>> = (0..n).map(Some).collect();
    let mut sizes = vec![1usize; n];
    let mut merges = Vec::with_capacity(n - 1);

    for step in 0..(n - 1) {
        // Hitta närmaste aktiva par
        let mut best = (0, 0);
        let mut best_dist = f64::INFINITY;
        for i in 0..n {
            if cluster_id[i].is_none() {
                continue;
            }
            for j in (i + 1)..n {
                if cluster_id[j].is_none() {
                    continue;
                }
                if dist[i][j] < best_dist {
                    best_dist = dist[i][j];
                    best = (i, j);
                }
            }
        }

        let (i, j) = best;
        let (ni, nj) = (sizes[i] as f64, sizes[j] as f64);

        let height = match linkage {
            Linkage::Ward => best_dist.sqrt(),
            _ => best_dist,
        };
        merges.push(Merge {
            left: cluster_id[i].unwrap_or(i),
            right: cluster_id[j].unwrap_or(j),
            height,
            size: sizes[i] + sizes[j],
        });

        // Lance-Williams: nytt avstånd från det sammanslagna klustret
        // (lagrat på rad i) till varje kvarvarande kluster k
        for k in 0..n {
            if k == i || k == j || cluster_id[k].is_none() {
                continue;
            }
            let dik = dist[i][k];
            let djk = dist[j][k];
            let nk = sizes[k] as f64;

            dist[i][k] = match linkage {
                Linkage::Single => dik.min(djk),
                Linkage::Complete => dik.max(djk),
                Linkage::Average => (ni * dik + nj * djk) / (ni + nj),
                Linkage::Ward => {
                    ((ni + nk) * dik + (nj + nk) * djk - nk * best_dist) / (ni + nj + nk)
                }
            };
            dist[k][i] = dist[i][k];
        }

        sizes[i] += sizes[j];
        cluster_id[i] = Some(n + step);
        cluster_id[j] = None;
    }

    Ok(merges)
}
