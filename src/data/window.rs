//! The bounded rolling window of readings.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

use crate::{ConfigError, Reading, Series};

/// Window size used when none is configured.
pub const DEFAULT_WINDOW_SIZE: usize = 50;

/// A capacity-bounded, arrival-ordered window of readings.
///
/// This is the only place readings are stored. Appending to a full window
/// evicts the oldest reading first; nothing is ever reordered, deduplicated
/// or dropped otherwise. Consumers get immutable [`Series`] snapshots, never
/// the live buffer.
///
/// # Example
///
/// ```
/// use sensorwatch::{Reading, SeriesWindow};
///
/// let mut window = SeriesWindow::new(3).unwrap();
/// for (i, v) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
///     window.append(Reading::new(i as u64, v));
/// }
///
/// let values: Vec<f64> = window.snapshot().values().collect();
/// assert_eq!(values, vec![20.0, 30.0, 40.0]);
/// ```
#[derive(Debug, Clone)]
pub struct SeriesWindow {
    capacity: NonZeroUsize,
    points: VecDeque<Reading>,
}

impl SeriesWindow {
    /// Create an empty window holding at most `capacity` readings.
    ///
    /// A capacity of zero is rejected.
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        let capacity = NonZeroUsize::new(capacity).ok_or(ConfigError::InvalidWindow(capacity))?;
        Ok(Self {
            capacity,
            points: VecDeque::new(),
        })
    }

    /// Append a reading at the tail, evicting from the head if the window
    /// would exceed its capacity.
    ///
    /// Returns the evicted reading, if any.
    pub fn append(&mut self, reading: Reading) -> Option<Reading> {
        self.points.push_back(reading);

        let mut evicted = None;
        while self.points.len() > self.capacity.get() {
            evicted = self.points.pop_front();
        }
        evicted
    }

    /// Take an immutable snapshot of the current contents, oldest first.
    pub fn snapshot(&self) -> Series {
        Series::from(self.points.iter().copied().collect::<Vec<_>>())
    }

    /// Drop every reading. Capacity is unchanged.
    pub fn reset(&mut self) {
        self.points.clear();
    }

    /// Number of readings currently held.
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the window holds no readings.
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Check if the next append will evict.
    pub fn is_full(&self) -> bool {
        self.points.len() == self.capacity.get()
    }

    /// Maximum number of readings held.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// The most recently appended reading.
    pub fn latest(&self) -> Option<Reading> {
        self.points.back().copied()
    }
}
