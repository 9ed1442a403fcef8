//! Feature scaling and Lloyd's K-means with random initialisation.

use rand::rngs::StdRng;
use rand::seq::index;
use rand::SeedableRng;
use tracing::debug;

use crate::error::{AnalysisError, Result};

pub type Point = [f64; 3];

fn squared_distance(a: &Point, b: &Point) -> f64 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

/// Zero mean, unit variance per feature (population variance)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StandardScaler {
    pub mean: Point,
    pub scale: Point,
}

impl StandardScaler {
    /// Fit to `data`. A constant feature keeps a scale of 1.
    pub fn fit(data: &[Point]) -> Result<Self> {
        if data.is_empty() {
            return Err(AnalysisError::InsufficientData(
                "cannot scale an empty data set".to_string(),
            ));
        }
        let n = data.len() as f64;
        let mut mean = [0.0; 3];
        let mut scale = [1.0; 3];
        for feature in 0..3 {
            let m = data.iter().map(|p| p[feature]).sum::<f64>() / n;
            let var = data.iter().map(|p| (p[feature] - m).powi(2)).sum::<f64>() / n;
            mean[feature] = m;
            if var > 0.0 {
                scale[feature] = var.sqrt();
            }
        }
        Ok(StandardScaler { mean, scale })
    }

    pub fn transform(&self, data: &[Point]) -> Vec<Point> {
        data.iter()
            .map(|p| {
                let mut scaled = [0.0; 3];
                for feature in 0..3 {
                    scaled[feature] = (p[feature] - self.mean[feature]) / self.scale[feature];
                }
                scaled
            })
            .collect()
    }

    pub fn fit_transform(data: &[Point]) -> Result<Vec<Point>> {
        Ok(Self::fit(data)?.transform(data))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KMeansParams {
    pub k: usize,
    pub seed: u64,
    pub n_init: usize,
    pub max_iter: usize,
    /// Relative to the mean feature variance
    pub tolerance: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KMeansFit {
    pub centroids: Vec<Point>,
    /// Cluster index per input point
    pub labels: Vec<usize>,
    /// Sum of squared distances to the assigned centroid
    pub inertia: f64,
    pub iterations: usize,
}

/// Fit K-means `n_init` times from random starting points and keep the
/// lowest-inertia run.
///
/// Every call seeds its own generator, so repeated calls with the same
/// data and parameters give identical results.
pub fn kmeans(data: &[Point], params: &KMeansParams) -> Result<KMeansFit> {
    if params.k == 0 || data.len() < params.k {
        return Err(AnalysisError::InsufficientData(format!(
            "K-means with {} clusters needs at least {} points, have {}",
            params.k,
            params.k,
            data.len()
        )));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let tolerance = params.tolerance * mean_variance(data);

    let mut best: Option<KMeansFit> = None;
    for run in 0..params.n_init.max(1) {
        let initial: Vec<Point> = index::sample(&mut rng, data.len(), params.k)
            .into_iter()
            .map(|i| data[i])
            .collect();
        let fit = lloyd(data, initial, params.max_iter, tolerance);
        debug!(
            "K-means k={} run {}: inertia {:.4} after {} iterations",
            params.k, run, fit.inertia, fit.iterations
        );
        if best.as_ref().map_or(true, |b| fit.inertia < b.inertia) {
            best = Some(fit);
        }
    }

    best.ok_or_else(|| AnalysisError::InsufficientData("K-means produced no fit".to_string()))
}

fn mean_variance(data: &[Point]) -> f64 {
    let n = data.len() as f64;
    (0..3)
        .map(|feature| {
            let m = data.iter().map(|p| p[feature]).sum::<f64>() / n;
            data.iter().map(|p| (p[feature] - m).powi(2)).sum::<f64>() / n
        })
        .sum::<f64>()
        / 3.0
}

fn assign(data: &[Point], centroids: &[Point], labels: &mut [usize]) -> f64 {
    let mut inertia = 0.0;
    for (point, label) in data.iter().zip(labels.iter_mut()) {
        let mut nearest = 0;
        let mut nearest_distance = f64::INFINITY;
        for (c, centroid) in centroids.iter().enumerate() {
            let d = squared_distance(point, centroid);
            if d < nearest_distance {
                nearest = c;
                nearest_distance = d;
            }
        }
        *label = nearest;
        inertia += nearest_distance;
    }
    inertia
}

fn lloyd(data: &[Point], mut centroids: Vec<Point>, max_iter: usize, tolerance: f64) -> KMeansFit {
    let k = centroids.len();
    let mut labels = vec![0; data.len()];
    let mut iterations = 0;

    for _ in 0..max_iter.max(1) {
        iterations += 1;
        let previous_labels = labels.clone();
        assign(data, &centroids, &mut labels);

        let mut sums = vec![[0.0; 3]; k];
        let mut counts = vec![0usize; k];
        for (point, &label) in data.iter().zip(&labels) {
            counts[label] += 1;
            for feature in 0..3 {
                sums[label][feature] += point[feature];
            }
        }

        // an empty cluster takes the point farthest from its centroid
        for c in 0..k {
            if counts[c] > 0 {
                continue;
            }
            let far = data
                .iter()
                .enumerate()
                .filter(|(i, _)| counts[labels[*i]] > 1)
                .map(|(i, p)| (i, squared_distance(p, &centroids[labels[i]])))
                .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)));
            if let Some((i, _)) = far {
                let old = labels[i];
                counts[old] -= 1;
                for feature in 0..3 {
                    sums[old][feature] -= data[i][feature];
                }
                labels[i] = c;
                counts[c] = 1;
                sums[c] = data[i];
            }
        }

        let mut shift = 0.0;
        for c in 0..k {
            if counts[c] == 0 {
                continue;
            }
            let mut updated = [0.0; 3];
            for feature in 0..3 {
                updated[feature] = sums[c][feature] / counts[c] as f64;
            }
            shift += squared_distance(&centroids[c], &updated);
            centroids[c] = updated;
        }

        if labels == previous_labels || shift <= tolerance {
            break;
        }
    }

    let inertia = assign(data, &centroids, &mut labels);
    KMeansFit {
        centroids,
        labels,
        inertia,
        iterations,
    }
}
