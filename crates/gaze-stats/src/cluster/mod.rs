//! Grouping of screen targets by accuracy, precision and invalid readings.
//!
//! For every screen position the (accuracy, precision, invalid) triples of
//! the targets are standardised and clustered with K-means for a range of
//! cluster counts. The count at the knee of the inertia curve is refitted,
//! clusters are ranked by the mean distance of their members from the origin
//! in the unscaled feature space, and the closest cluster is reported as the
//! best subset of targets.
//!
//! # Example
//!
//! ```
//! use gaze_stats::cluster::TargetClusterer;
//! use gaze_stats::config::ClusterConfig;
//!
//! let features: Vec<[f64; 3]> = (0..12)
//!     .map(|i| if i < 6 { [0.5, 0.1, 0.0] } else { [3.0 + i as f64, 1.0, 20.0] })
//!     .collect();
//! let ids: Vec<u32> = (0..12).collect();
//!
//! let result = TargetClusterer::new(ClusterConfig::default())
//!     .cluster("Top", &ids, &features)
//!     .unwrap();
//! assert_eq!(result.best_targets(), vec![0, 1, 2, 3, 4, 5]);
//! ```

pub mod kmeans;
pub mod knee;

use std::fs::File;
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::ClusterConfig;
use crate::error::{AnalysisError, Result};
use crate::target_table::TargetTable;

pub use kmeans::{kmeans, KMeansFit, KMeansParams, Point, StandardScaler};
pub use knee::find_knee;

/// Clustering of the targets at one screen position
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PositionClusters {
    pub position: String,
    pub target_ids: Vec<u32>,
    /// Unscaled (accuracy, precision, invalid) per target
    pub features: Vec<Point>,
    /// Inertia for every cluster count tried
    pub inertia: Vec<(usize, f64)>,
    /// Selected cluster count
    pub k: usize,
    /// Cluster rank per target; 0 is the cluster closest to the origin
    pub ranks: Vec<usize>,
}

impl PositionClusters {
    /// Targets in the cluster closest to the origin
    pub fn best_targets(&self) -> Vec<u32> {
        self.target_ids
            .iter()
            .zip(&self.ranks)
            .filter(|(_, &rank)| rank == 0)
            .map(|(&id, _)| id)
            .collect()
    }
}

pub struct TargetClusterer {
    config: ClusterConfig,
}

impl TargetClusterer {
    pub fn new(config: ClusterConfig) -> Self {
        Self { config }
    }

    fn params(&self, k: usize) -> KMeansParams {
        KMeansParams {
            k,
            seed: self.config.seed,
            n_init: self.config.n_init,
            max_iter: self.config.max_iter,
            tolerance: self.config.tolerance,
        }
    }

    /// Cluster one position's targets.
    ///
    /// # Errors
    ///
    /// [`AnalysisError::InsufficientData`] when there are fewer targets than
    /// the smallest cluster count.
    pub fn cluster(&self, position: &str, target_ids: &[u32], features: &[Point]) -> Result<PositionClusters> {
        if target_ids.len() != features.len() {
            return Err(AnalysisError::InsufficientData(format!(
                "{} target ids for {} feature rows",
                target_ids.len(),
                features.len()
            )));
        }
        let k_min = self.config.k_min.max(1);
        let k_max = self.config.k_max.min(features.len());
        if k_max < k_min {
            return Err(AnalysisError::InsufficientData(format!(
                "{}: {} targets cannot form {} clusters",
                position,
                features.len(),
                k_min
            )));
        }

        let scaled = StandardScaler::fit_transform(features)?;
        let mut inertia = Vec::new();
        for k in k_min..=k_max {
            inertia.push((k, kmeans(&scaled, &self.params(k))?.inertia));
        }

        let (ks, values): (Vec<f64>, Vec<f64>) = inertia.iter().map(|&(k, v)| (k as f64, v)).unzip();
        let k = match find_knee(&ks, &values) {
            Some(knee) => knee as usize,
            None => {
                warn!("{}: no knee in the inertia curve, using {} clusters", position, k_min);
                k_min
            }
        };
        info!("{}: {} clusters", position, k);

        let fit = kmeans(&scaled, &self.params(k))?;
        let ranks = rank_clusters(features, &fit.labels, k);

        Ok(PositionClusters {
            position: position.to_string(),
            target_ids: target_ids.to_vec(),
            features: features.to_vec(),
            inertia,
            k,
            ranks,
        })
    }

    /// Cluster every position of a target table
    pub fn cluster_table(&self, table: &TargetTable) -> Result<Vec<PositionClusters>> {
        let ids: Vec<u32> = table.rows.iter().map(|r| r.target).collect();
        table
            .positions
            .iter()
            .enumerate()
            .map(|(index, position)| {
                let features: Vec<Point> = table
                    .rows
                    .iter()
                    .filter_map(|row| row.measures.get(index))
                    .map(|m| m.features())
                    .collect();
                self.cluster(position, &ids, &features)
            })
            .collect()
    }
}

/// Rank per target of its cluster, ordered by the cluster's mean distance
/// from the origin. Ties keep cluster order.
fn rank_clusters(features: &[Point], labels: &[usize], k: usize) -> Vec<usize> {
    let mut sums = vec![0.0; k];
    let mut counts = vec![0usize; k];
    for (point, &label) in features.iter().zip(labels) {
        sums[label] += point.iter().map(|v| v * v).sum::<f64>().sqrt();
        counts[label] += 1;
    }
    let means: Vec<f64> = sums
        .iter()
        .zip(&counts)
        .map(|(s, &c)| if c > 0 { s / c as f64 } else { f64::INFINITY })
        .collect();

    let mut order: Vec<usize> = (0..k).collect();
    order.sort_by(|&a, &b| means[a].total_cmp(&means[b]));
    let mut rank_of = vec![0; k];
    for (rank, &cluster) in order.iter().enumerate() {
        rank_of[cluster] = rank;
    }
    labels.iter().map(|&label| rank_of[label]).collect()
}

/// Write `position,id,id,...` per position, listing the best cluster
pub fn write_best_clusters<W: Write>(writer: W, clusters: &[PositionClusters]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_writer(writer);
    for position in clusters {
        let mut record = vec![position.position.clone()];
        record.extend(position.best_targets().iter().map(|id| id.to_string()));
        writer.write_record(&record)?;
    }
    writer
        .flush()
        .map_err(|e| AnalysisError::io("<cluster output>", e))?;
    Ok(())
}

pub fn write_best_clusters_to_file<P: AsRef<Path>>(path: P, clusters: &[PositionClusters]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| AnalysisError::io(path, e))?;
    write_best_clusters(file, clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_rank_clusters() {
        let features = [[5.0, 0.0, 0.0], [1.0, 0.0, 0.0], [3.0, 0.0, 0.0], [1.0, 0.0, 0.0]];
        let labels = [0, 1, 2, 1];
        assert_eq!(rank_clusters(&features, &labels, 3), vec![2, 0, 1, 0]);
    }

    #[test]
    fn test_write_best_clusters() {
        let clusters = vec![
            PositionClusters {
                position: "Top".to_string(),
                target_ids: vec![0, 1, 2],
                features: vec![[0.0; 3]; 3],
                inertia: Vec::new(),
                k: 2,
                ranks: vec![0, 1, 0],
            },
            PositionClusters {
                position: "Bottom".to_string(),
                target_ids: vec![0, 1, 2],
                features: vec![[0.0; 3]; 3],
                inertia: Vec::new(),
                k: 2,
                ranks: vec![1, 1, 0],
            },
        ];
        let mut out = Vec::new();
        write_best_clusters(&mut out, &clusters).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Top,0,2\nBottom,2\n");
    }

    #[test]
    fn test_too_few_targets() {
        let clusterer = TargetClusterer::new(ClusterConfig::default());
        let result = clusterer.cluster("Top", &[0], &[[1.0, 1.0, 1.0]]);
        assert!(matches!(result, Err(AnalysisError::InsufficientData(_))));
    }

    #[test]
    fn test_inertia_per_cluster_count() {
        let features: Vec<Point> = (0..20)
            .map(|i| [(i % 4) as f64, (i / 4) as f64 * 0.5, (i % 3) as f64])
            .collect();
        let ids: Vec<u32> = (100..120).collect();
        let result = TargetClusterer::new(ClusterConfig::default())
            .cluster("near_chinrest", &ids, &features)
            .unwrap();
        let ks: Vec<usize> = result.inertia.iter().map(|(k, _)| *k).collect();
        assert_eq!(ks, (2..=10).collect::<Vec<_>>());
        assert!((2..=10).contains(&result.k));
        assert!(result.best_targets().iter().all(|id| (100..120).contains(id)));
        assert_eq!(result.ranks.len(), 20);
    }
}
