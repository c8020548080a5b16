//! Proximity Clustering
//!
//! Groups the points of one sweep into clusters with a greedy single-linkage
//! pass. A point joins the first cluster (in creation order) that has any
//! member (in insertion order) strictly closer than the threshold; otherwise
//! it starts a new cluster.
//!
//! The result depends on input order: this is first-match chaining, not
//! nearest-cluster assignment. Clusters can become long and thin since a
//! point only has to be near one member, not near the centroid.
//!
//! The pass compares every point against every member placed so far, so it
//! is O(n²) in the number of points per sweep. That is fine for the tens of
//! returns a sweep of people on a floor produces; sweeps with thousands of
//! returns would need a spatial index that keeps the same first-match order.

use nalgebra::Vector2;

use crate::geometry::Point2D;
use crate::settings::DEFAULT_CLUSTER_THRESHOLD_M;

/// A group of points believed to come from one object
#[derive(Debug, Clone, PartialEq)]
pub struct Cluster {
    points: Vec<Point2D>,
}

impl Cluster {
    fn seed(point: Point2D) -> Self {
        Cluster {
            points: vec![point],
        }
    }

    /// Member points in insertion order
    pub fn points(&self) -> &[Point2D] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Always false; a cluster is created with its first point
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Arithmetic mean of the member coordinates, per axis
    pub fn centroid(&self) -> Point2D {
        let sum = self
            .points
            .iter()
            .fold(Vector2::zeros(), |acc, p| acc + p.as_point().coords);
        let mean = sum / self.points.len() as f64;
        Point2D::new(mean.x, mean.y)
    }

    fn accepts(&self, candidate: &Point2D, threshold: f64) -> bool {
        self.points
            .iter()
            .any(|member| member.distance_to(candidate) < threshold)
    }
}

/// First-match proximity clusterer with a fixed threshold in meters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProximityClusterer {
    threshold: f64,
}

impl Default for ProximityClusterer {
    fn default() -> Self {
        ProximityClusterer::new(DEFAULT_CLUSTER_THRESHOLD_M)
    }
}

impl ProximityClusterer {
    pub fn new(threshold: f64) -> Self {
        ProximityClusterer { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Partition `points` into clusters.
    ///
    /// Every input point ends up in exactly one cluster, so the number of
    /// clusters is between 1 and `points.len()` for non-empty input.
    pub fn cluster(&self, points: &[Point2D]) -> Vec<Cluster> {
        let mut clusters: Vec<Cluster> = Vec::new();

        for point in points {
            match clusters
                .iter_mut()
                .find(|c| c.accepts(point, self.threshold))
            {
                Some(cluster) => cluster.points.push(*point),
                None => clusters.push(Cluster::seed(*point)),
            }
        }

        clusters
    }

    /// Cluster and return only the centroids, in cluster creation order
    pub fn centroids(&self, points: &[Point2D]) -> Vec<Point2D> {
        self.cluster(points).iter().map(Cluster::centroid).collect()
    }
}
