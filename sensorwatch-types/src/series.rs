//! Read-only snapshots of the rolling window.

use std::sync::Arc;

use crate::Reading;

/// An immutable, arrival-ordered snapshot of readings.
///
/// Snapshots share their storage, so cloning one is cheap. A snapshot never
/// changes after it is taken; later appends to the live window are not
/// visible through it.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(
    feature = "serde",
    serde(from = "Vec<Reading>", into = "Vec<Reading>")
)]
pub struct Series {
    points: Arc<[Reading]>,
}

impl Series {
    /// An empty series.
    pub fn empty() -> Self {
        Self {
            points: Arc::from(Vec::new()),
        }
    }

    /// Number of readings in the snapshot.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the snapshot holds no readings.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Iterate over readings, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &Reading> {
        self.points.iter()
    }

    /// The readings as a slice, oldest first.
    pub fn as_slice(&self) -> &[Reading] {
        &self.points
    }

    /// The oldest reading still in the window.
    pub fn first(&self) -> Option<&Reading> {
        self.points.first()
    }

    /// The most recently appended reading.
    pub fn latest(&self) -> Option<&Reading> {
        self.points.last()
    }

    /// Iterate over values only, oldest first.
    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.points.iter().map(|r| r.value)
    }

    /// Minimum and maximum value, or `None` for an empty snapshot.
    ///
    /// NaN values are ignored.
    pub fn value_bounds(&self) -> Option<(f64, f64)> {
        self.values()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }

    /// Timestamps of the first and last reading.
    ///
    /// Readings are in arrival order, so `first <= last` is not guaranteed
    /// if the wall clock stepped backwards.
    pub fn time_span(&self) -> Option<(u64, u64)> {
        Some((self.first()?.timestamp_ms, self.latest()?.timestamp_ms))
    }
}

impl Default for Series {
    fn default() -> Self {
        Self::empty()
    }
}

impl From<Vec<Reading>> for Series {
    fn from(points: Vec<Reading>) -> Self {
        Self {
            points: Arc::from(points),
        }
    }
}

impl From<Series> for Vec<Reading> {
    fn from(series: Series) -> Self {
        series.points.to_vec()
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a Reading;
    type IntoIter = std::slice::Iter<'a, Reading>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
