use serde::Serialize;

use super::{round_to, special};
use crate::db::Database;
use crate::models::VegetationVariable;
use crate::utils::error::{AppError, AppResult};

/// Minsta antal kompletta par för korrelationsanalys
const MIN_PAIRS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CorrelationMethod {
    Pearson,
    Spearman,
}

impl CorrelationMethod {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Pearson => "Pearson",
            Self::Spearman => "Spearman",
        }
    }
}

/// Korrelationsresultat; paren returneras för plotting
#[derive(Debug, Clone, Serialize)]
pub struct CorrelationResult {
    pub method: CorrelationMethod,
    /// Korrelationskoefficient, avrundad till fyra decimaler
    pub coefficient: f64,
    /// Tvåsidigt p-värde, avrundat till fyra decimaler
    pub p_value: f64,
    pub n: usize,
    pub pairs: Vec<(f64, f64)>,
}

/// Beskrivande statistik för en miljövariabel, två decimaler
#[derive(Debug, Clone, Serialize)]
pub struct VariableSummary {
    pub variable: VegetationVariable,
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub q25: f64,
    pub median: f64,
    pub q75: f64,
    pub max: f64,
}

/// Korrelation och beskrivande statistik över vegetationsdata
pub struct VegetationAnalyzer {
    db: Database,
}

impl VegetationAnalyzer {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Parvis korrelation mellan två miljövariabler. Rader där någon av
    /// variablerna saknas filtreras bort; minst tre kompletta par krävs.
    pub fn correlation(
        &self,
        x: VegetationVariable,
        y: VegetationVariable,
        method: CorrelationMethod,
    ) -> AppResult<CorrelationResult> {
        // Kolumnnamnen kommer ur enumen, aldrig ur fritext
        let sql = format!(
            "SELECT {x}, {y} FROM vegetation_data
             WHERE deleted_at IS NULL AND {x} IS NOT NULL AND {y} IS NOT NULL",
            x = x.column_name(),
            y = y.column_name(),
        );

        let pairs: Vec<(f64, f64)> = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql)?;
            let pairs = stmt
                .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                .filter_map(|r| r.ok())
                .collect();
            Ok(pairs)
        })?;

        correlate(&pairs, method)
    }

    /// Beskrivande statistik per miljövariabel. Variabler helt utan
    /// värden utelämnas.
    pub fn summary_statistics(&self) -> AppResult<Vec<VariableSummary>> {
        let mut summaries = Vec::new();

        for &variable in VegetationVariable::ALL {
            let sql = format!(
                "SELECT {col} FROM vegetation_data
                 WHERE deleted_at IS NULL AND {col} IS NOT NULL",
                col = variable.column_name(),
            );

            let mut values: Vec<f64> = self.db.with_connection(|conn| {
                let mut stmt = conn.prepare(&sql)?;
                let values = stmt
                    .query_map([], |row| row.get(0))?
                    .filter_map(|r| r.ok())
                    .collect();
                Ok(values)
            })?;

            if values.is_empty() {
                continue;
            }
            values.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

            summaries.push(summarize(variable, &values));
        }

        Ok(summaries)
    }
}

/// Korrelation över färdiga par
pub fn correlate(pairs: &[(f64, f64)], method: CorrelationMethod) -> AppResult<CorrelationResult> {
    if pairs.len() < MIN_PAIRS {
        return Err(AppError::insufficient(format!(
            "korrelation kräver minst {} kompletta par, fick {}",
            MIN_PAIRS,
            pairs.len()
        )));
    }

    let coefficient = match method {
        CorrelationMethod::Pearson => {
            let x: Vec<f64> = pairs.iter().map(|p| p.0).collect();
            let y: Vec<f64> = pairs.iter().map(|p| p.1).collect();
            pearson(&x, &y)
        }
        CorrelationMethod::Spearman => {
            let x = ranks(&pairs.iter().map(|p| p.0).collect::<Vec<_>>());
            let y = ranks(&pairs.iter().map(|p| p.1).collect::<Vec<_>>());
            pearson(&x, &y)
        }
    };

    let n = pairs.len();
    let p_value = two_sided_p(coefficient, n);

    Ok(CorrelationResult {
        method,
        coefficient: round_to(coefficient, 4),
        p_value: round_to(p_value, 4),
        n,
        pairs: pairs.to_vec(),
    })
}

fn pearson(x: &[f64], y: &[f64]) -> f64 {
    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        let dx = xi - mean_x;
        let dy = yi - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 {
        // Konstant variabel: korrelationen är odefinierad, rapporteras som 0
        return 0.0;
    }
    cov / denom
}

/// Ranger med medelvärde vid lika värden
fn ranks(values: &[f64]) -> Vec<f64> {
    let mut indexed: Vec<(usize, f64)> =
        values.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    let mut result = vec![0.0; values.len()];
    let mut i = 0;
    while i < indexed.len() {
        let mut j = i;
        while j + 1 < indexed.len() && indexed[j + 1].1 == indexed[i].1 {
            j += 1;
        }
        // Rang 1-baserad; lika värden får medelrangen
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for k in i..=j {
            result[indexed[k].0] = avg_rank;
        }
        i = j + 1;
    }

    result
}

/// Tvåsidigt p-värde via t-transformering av koefficienten
fn two_sided_p(r: f64, n: usize) -> f64 {
    if r.abs() >= 1.0 {
        return 0.0;
    }
    let df = (n - 2) as f64;
    let t = r * (df / (1.0 - r * r)).sqrt();
    special::student_t_two_sided_p(t, df)
}

fn summarize(variable: VegetationVariable, sorted: &[f64]) -> VariableSummary {
    let n = sorted.len();
    let mean = sorted.iter().sum::<f64>() / n as f64;

    let std_dev = if n > 1 {
        let ss: f64 = sorted.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (n as f64 - 1.0)).sqrt()
    } else {
        0.0
    };

    VariableSummary {
        variable,
        count: n,
        mean: round_to(mean, 2),
        std_dev: round_to(std_dev, 2),
        min: round_to(sorted[0], 2),
        q25: round_to(quantile(sorted, 0.25), 2),
        median: round_to(quantile(sorted, 0.5), 2),
        q75: round_to(quantile(sorted, 0.75), 2),
        max: round_to(sorted[n - 1], 2),
    }
}

/// Kvantil med linjär interpolation, som numpy:s default
fn quantile(sorted: &[f64], q: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }
    let pos = q * (sorted.len() - 1) as f64;
    let lower = pos.floor() as usize;
    let upper = pos.ceil() as usize;
    let frac = pos - lower as f64;
    sorted[lower] + (sorted[upper] - sorted[lower]) * frac
}
