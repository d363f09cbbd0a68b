//! Same-owner spatial density check
//!
//! An owner registering many plots in one small area is a pattern of
//! subdividing a single holding to multiply credits. The candidate's centroid
//! is clustered with the owner's prior plot centroids using DBSCAN over
//! (lat, lon) in degrees.

use std::sync::Arc;

use shared::{CorpusEntry, DensityCheckResult, LonLat, METERS_PER_DEGREE};

/// DBSCAN cluster labels; `None` marks noise
///
/// A point's neighbourhood includes the point itself, so `min_samples`
/// counts it.
pub fn dbscan(points: &[LonLat], eps: f64, min_samples: usize) -> Vec<Option<usize>> {
    let neighbours = |i: usize| -> Vec<usize> {
        points
            .iter()
            .enumerate()
            .filter(|(_, p)| (p.lon - points[i].lon).hypot(p.lat - points[i].lat) <= eps)
            .map(|(j, _)| j)
            .collect()
    };

    let mut labels: Vec<Option<usize>> = vec![None; points.len()];
    let mut visited = vec![false; points.len()];
    let mut cluster = 0;

    for i in 0..points.len() {
        if visited[i] {
            continue;
        }
        visited[i] = true;

        let seeds = neighbours(i);
        if seeds.len() < min_samples {
            continue;
        }

        labels[i] = Some(cluster);
        let mut queue = seeds;
        while let Some(j) = queue.pop() {
            if labels[j].is_none() {
                labels[j] = Some(cluster);
            }
            if visited[j] {
                continue;
            }
            visited[j] = true;

            let expansion = neighbours(j);
            if expansion.len() >= min_samples {
                queue.extend(expansion);
            }
        }
        cluster += 1;
    }

    labels
}

#[derive(Debug, Clone)]
pub struct SpatialDensityDetector {
    eps_deg: f64,
    min_samples: usize,
    min_history: usize,
    max_cluster: usize,
}

impl SpatialDensityDetector {
    pub fn new(eps_deg: f64, min_samples: usize, min_history: usize, max_cluster: usize) -> Self {
        Self {
            eps_deg,
            min_samples,
            min_history,
            max_cluster,
        }
    }

    pub fn evaluate(
        &self,
        centroid: LonLat,
        owner_id: &str,
        corpus: &[Arc<CorpusEntry>],
    ) -> DensityCheckResult {
        let mut points: Vec<LonLat> = corpus
            .iter()
            .filter(|entry| entry.owner_id == owner_id)
            .map(|entry| entry.features.centroid)
            .collect();
        let owner_plot_count = points.len();

        if owner_plot_count < self.min_history {
            return DensityCheckResult {
                owner_plot_count,
                ..DensityCheckResult::default()
            };
        }

        points.push(centroid);
        let labels = dbscan(&points, self.eps_deg, self.min_samples);
        let cluster_size = match labels.last().copied().flatten() {
            Some(label) => labels.iter().filter(|l| **l == Some(label)).count(),
            None => 0,
        };

        let is_suspicious = cluster_size > self.max_cluster;
        let radius_km = self.eps_deg * METERS_PER_DEGREE / 1000.0;
        DensityCheckResult {
            is_suspicious,
            owner_plot_count,
            cluster_size,
            active: true,
            reason: is_suspicious
                .then(|| format!("{} plots within {:.0}km radius", cluster_size, radius_km)),
        }
    }
}
