//! Height-based reconciliation of semantic classes.
//!
//! Every labelled point is routed in one pass by its class policy:
//!
//! | class      | keep          | reassign to terrain | reject               |
//! |------------|---------------|---------------------|----------------------|
//! | terrain    | (-0.2, 0.2)   |                     | <= -0.1 or > 0.1     |
//! | stem       | > 0.05        | [-0.05, 0.05]       | <= 0.05              |
//! | vegetation | > 0.05        | [-0.05, 0.05]       | <= 0.05              |
//! | cwd        | (0.05, 3)     | [-0.05, 0.05]       | <= 0.05 or >= 10     |
//!
//! Keep and reassign decide where a point goes, in that order. Heights that
//! match neither are dropped from the cleaned cloud; those outside every
//! reject window as well are excluded rather than rejected (a CWD point at
//! 5 m, for example).
//!
//! The reject windows are checked on their own, so the rejected sets are a
//! report and not a partition: a terrain point at 0.15 is kept and also
//! counted as rejected, as is a stem point at 0.02 that is reassigned.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use pcd_core::pointcloud::{
    label::ClassLabel,
    point::{Point, PointCloud},
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Bound {
    Unbounded,
    Open(f64),
    Closed(f64),
}

/// An interval of heights above the terrain.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub lower: Bound,
    pub upper: Bound,
}

impl Window {
    /// `(lower, upper)`
    pub const fn open(lower: f64, upper: f64) -> Self {
        Self {
            lower: Bound::Open(lower),
            upper: Bound::Open(upper),
        }
    }

    /// `[lower, upper]`
    pub const fn closed(lower: f64, upper: f64) -> Self {
        Self {
            lower: Bound::Closed(lower),
            upper: Bound::Closed(upper),
        }
    }

    /// `> lower`
    pub const fn above(lower: f64) -> Self {
        Self {
            lower: Bound::Open(lower),
            upper: Bound::Unbounded,
        }
    }

    /// `>= lower`
    pub const fn at_least(lower: f64) -> Self {
        Self {
            lower: Bound::Closed(lower),
            upper: Bound::Unbounded,
        }
    }

    /// `<= upper`
    pub const fn at_most(upper: f64) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Closed(upper),
        }
    }

    pub fn contains(&self, height: f64) -> bool {
        let above_lower = match self.lower {
            Bound::Unbounded => true,
            Bound::Open(lower) => height > lower,
            Bound::Closed(lower) => height >= lower,
        };
        let below_upper = match self.upper {
            Bound::Unbounded => true,
            Bound::Open(upper) => height < upper,
            Bound::Closed(upper) => height <= upper,
        };
        above_lower && below_upper
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Stays in its own class.
    Keep,
    /// Relabelled as terrain.
    Reassign,
    /// Only in a reject window; left out of the cleaned cloud.
    Reject,
    /// Outside every window; left out of the cleaned cloud.
    Exclude,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassPolicy {
    pub keep: Window,
    pub reassign: Option<Window>,
    pub reject: Vec<Window>,
}

impl ClassPolicy {
    pub fn classify(&self, height: f64) -> Disposition {
        if self.keep.contains(height) {
            Disposition::Keep
        } else if self.reassign.is_some_and(|w| w.contains(height)) {
            Disposition::Reassign
        } else if self.rejects(height) {
            Disposition::Reject
        } else {
            Disposition::Exclude
        }
    }

    /// Whether `height` is in a reject window, whatever [`Self::classify`] says.
    pub fn rejects(&self, height: f64) -> bool {
        self.reject.iter().any(|w| w.contains(height))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconcileThresholds {
    pub terrain: ClassPolicy,
    pub stem: ClassPolicy,
    pub vegetation: ClassPolicy,
    pub cwd: ClassPolicy,
}

impl Default for ReconcileThresholds {
    fn default() -> Self {
        let near_ground = Window::closed(-0.05, 0.05);
        let above_ground = ClassPolicy {
            keep: Window::above(0.05),
            reassign: Some(near_ground),
            reject: vec![Window::at_most(0.05)],
        };

        Self {
            terrain: ClassPolicy {
                keep: Window::open(-0.2, 0.2),
                reassign: None,
                reject: vec![Window::at_most(-0.1), Window::above(0.1)],
            },
            stem: above_ground.clone(),
            vegetation: above_ground,
            cwd: ClassPolicy {
                keep: Window::open(0.05, 3.0),
                reassign: Some(near_ground),
                reject: vec![Window::at_most(0.05), Window::at_least(10.0)],
            },
        }
    }
}

impl ReconcileThresholds {
    /// `None` for noise, which no policy covers.
    pub fn policy(&self, label: ClassLabel) -> Option<&ClassPolicy> {
        match label {
            ClassLabel::Terrain => Some(&self.terrain),
            ClassLabel::Stem => Some(&self.stem),
            ClassLabel::Vegetation => Some(&self.vegetation),
            ClassLabel::Cwd => Some(&self.cwd),
            ClassLabel::Noise => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Reconciliation {
    /// Kept terrain followed by points reassigned from stem, vegetation and CWD.
    pub terrain: PointCloud,
    pub stem: PointCloud,
    pub vegetation: PointCloud,
    pub cwd: PointCloud,
    pub rejected: BTreeMap<ClassLabel, PointCloud>,
    pub excluded: BTreeMap<ClassLabel, PointCloud>,
}

impl Reconciliation {
    pub fn rejected_count(&self) -> usize {
        self.rejected.values().map(PointCloud::len).sum()
    }

    /// Terrain, vegetation, CWD and stem, in that order.
    pub fn into_cleaned(self) -> PointCloud {
        PointCloud::concat([self.terrain, self.vegetation, self.cwd, self.stem])
    }
}

#[derive(Default)]
struct Buckets {
    kept: Vec<Point>,
    reassigned: Vec<Point>,
    rejected: Vec<Point>,
    excluded: Vec<Point>,
}

/// Routes every point of `cloud` by its class policy and height above the
/// terrain. Heights must already be normalized.
pub fn reconcile(cloud: PointCloud, thresholds: &ReconcileThresholds) -> Reconciliation {
    log::info!("start reconciling {} points...", cloud.len());

    let template = cloud.empty_like();
    let mut buckets: BTreeMap<ClassLabel, Buckets> = BTreeMap::new();

    for point in cloud.points {
        let policy = thresholds.policy(point.label);
        let height = point.height_above_dtm;
        let disposition = policy.map_or(Disposition::Exclude, |policy| policy.classify(height));
        let bucket = buckets.entry(point.label).or_default();
        if disposition != Disposition::Reject && policy.is_some_and(|p| p.rejects(height)) {
            bucket.rejected.push(point.clone());
        }
        match disposition {
            Disposition::Keep => bucket.kept.push(point),
            Disposition::Reassign => bucket.reassigned.push(Point {
                label: ClassLabel::Terrain,
                ..point
            }),
            Disposition::Reject => bucket.rejected.push(point),
            Disposition::Exclude => bucket.excluded.push(point),
        }
    }

    let mut terrain_points = Vec::new();
    let mut kept = BTreeMap::new();
    let mut rejected = BTreeMap::new();
    let mut excluded = BTreeMap::new();
    // terrain first so its kept points lead the terrain output
    for label in [
        ClassLabel::Terrain,
        ClassLabel::Stem,
        ClassLabel::Vegetation,
        ClassLabel::Cwd,
        ClassLabel::Noise,
    ] {
        let bucket = buckets.remove(&label).unwrap_or_default();
        log::info!(
            "{}: {} kept, {} reassigned to terrain, {} rejected, {} excluded",
            label,
            bucket.kept.len(),
            bucket.reassigned.len(),
            bucket.rejected.len(),
            bucket.excluded.len()
        );
        if label == ClassLabel::Terrain {
            terrain_points.extend(bucket.kept);
        } else {
            kept.insert(label, bucket.kept);
        }
        terrain_points.extend(bucket.reassigned);
        rejected.insert(label, template.with_points(bucket.rejected));
        excluded.insert(label, template.with_points(bucket.excluded));
    }

    let mut take = |label: ClassLabel| {
        template.with_points(kept.remove(&label).unwrap_or_default())
    };
    let stem = take(ClassLabel::Stem);
    let vegetation = take(ClassLabel::Vegetation);
    let cwd = take(ClassLabel::Cwd);

    let reconciliation = Reconciliation {
        terrain: template.with_points(terrain_points),
        stem,
        vegetation,
        cwd,
        rejected,
        excluded,
    };
    log::info!(
        "finish reconciling: {} terrain, {} stem, {} vegetation, {} cwd, {} rejected",
        reconciliation.terrain.len(),
        reconciliation.stem.len(),
        reconciliation.vegetation.len(),
        reconciliation.cwd.len(),
        reconciliation.rejected_count()
    );
    reconciliation
}
