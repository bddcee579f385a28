//! Noise-tolerant trajectory downsampling.
//!
//! A trace is walked once, front to back. Consecutive samples close to the
//! open cluster's centroid are absorbed into it. A sample that lands far
//! away does not close the cluster on its own: the next `window_size`
//! samples are checked against the same centroid, and the cluster is only
//! closed when at least `split_threshold` of them are far too. Otherwise
//! the jump is treated as GPS noise and absorbed.
//!
//! Each closed cluster is replaced by the member closest to its centroid,
//! so the output is always a subsequence of the input.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::geo::Located;
use crate::Error;

pub const DEFAULT_MIN_DIST: f64 = 20.0;
pub const DEFAULT_WINDOW_SIZE: usize = 5;
pub const DEFAULT_SPLIT_THRESHOLD: f64 = 0.2;

/// Tuning knobs of [`downsample`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Params {
    /// Distance in meters under which a sample joins the open cluster.
    /// Zero disables merging.
    pub min_dist: f64,
    /// Number of samples, starting at a far one, examined before splitting.
    pub window_size: usize,
    /// Fraction of the lookahead window that must also be far to split.
    pub split_threshold: f64,
}

impl Default for Params {
    fn default() -> Self {
        Params {
            min_dist: DEFAULT_MIN_DIST,
            window_size: DEFAULT_WINDOW_SIZE,
            split_threshold: DEFAULT_SPLIT_THRESHOLD,
        }
    }
}

impl Params {
    pub fn new(min_dist: f64, window_size: usize, split_threshold: f64) -> Self {
        Params {
            min_dist,
            window_size,
            split_threshold,
        }
    }

    /// Reject parameters outside their documented ranges. [`downsample`]
    /// never calls this; it is for callers taking parameters from users.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.min_dist.is_finite() || self.min_dist < 0.0 {
            return Err(Error::BadParam {
                name: "minDist",
                value: self.min_dist.to_string(),
            });
        }
        if self.window_size == 0 {
            return Err(Error::BadParam {
                name: "windowSize",
                value: self.window_size.to_string(),
            });
        }
        if !(0.0..=1.0).contains(&self.split_threshold) {
            return Err(Error::BadParam {
                name: "splitThreshold",
                value: self.split_threshold.to_string(),
            });
        }
        Ok(())
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "Params{{MinDist: {}m, Window: {}, Split: {}}}",
            self.min_dist, self.window_size, self.split_threshold
        )
    }
}

// Cluster is the single open accumulator. The running sums give the
// centroid used for per-point decisions in O(1).
struct Cluster<'a, T> {
    members: Vec<&'a T>,
    sum_lat: f64,
    sum_lng: f64,
}

impl<'a, T: Located> Cluster<'a, T> {
    fn open(first: &'a T) -> Self {
        Cluster {
            members: vec![first],
            sum_lat: first.latitude(),
            sum_lng: first.longitude(),
        }
    }

    fn absorb(&mut self, p: &'a T) {
        self.members.push(p);
        self.sum_lat += p.latitude();
        self.sum_lng += p.longitude();
    }

    fn running_centroid(&self) -> (f64, f64) {
        let n = self.members.len() as f64;
        (self.sum_lat / n, self.sum_lng / n)
    }

    // The centroid is recomputed from the members here rather than taken
    // from the running sums; this is the authoritative one.
    fn representative(&self) -> &'a T {
        let n = self.members.len() as f64;
        let (lat, lng) = self
            .members
            .iter()
            .fold((0.0, 0.0), |(lat, lng), p| (lat + p.latitude(), lng + p.longitude()));
        let (lat, lng) = (lat / n, lng / n);

        let mut best = self.members[0];
        let mut best_dist = best.distance_to(lat, lng);
        for &p in &self.members[1..] {
            let d = p.distance_to(lat, lng);
            // Strict comparison keeps the first member on ties.
            if d < best_dist {
                best = p;
                best_dist = d;
            }
        }
        best
    }
}

/// Collapse an ordered trace into one representative per cluster.
///
/// The input must already be in chronological order; it is neither checked
/// nor reordered. Every returned element is a clone of an input element and
/// the output keeps input order. An empty trace yields an empty result and
/// any non-empty trace yields at least one representative.
pub fn downsample<T: Located + Clone>(samples: &[T], params: &Params) -> Vec<T> {
    let Some(first) = samples.first() else {
        return Vec::new();
    };

    let mut representatives = Vec::new();
    let mut cluster = Cluster::open(first);
    let mut noise = 0usize;

    for (i, p) in samples.iter().enumerate().skip(1) {
        let (lat, lng) = cluster.running_centroid();
        let d = p.distance_to(lat, lng);

        if d < params.min_dist {
            cluster.absorb(p);
            continue;
        }

        let end = i.saturating_add(params.window_size).min(samples.len());
        let window = &samples[i..end];
        let far = window
            .iter()
            .filter(|q| q.distance_to(lat, lng) >= params.min_dist)
            .count();
        // An empty window has nothing to refute the split with.
        let split = window.is_empty()
            || far as f64 / window.len() as f64 >= params.split_threshold;

        if split {
            trace!(index = i, distance = d, far, window = window.len(), "split");
            representatives.push(cluster.representative().clone());
            cluster = Cluster::open(p);
        } else {
            trace!(index = i, distance = d, far, window = window.len(), "noise");
            noise += 1;
            cluster.absorb(p);
        }
    }
    representatives.push(cluster.representative().clone());

    debug!(
        input = samples.len(),
        output = representatives.len(),
        noise,
        %params,
        "downsampled trace"
    );

    representatives
}
