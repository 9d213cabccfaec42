//! Bounded risk time series feeding the chart

use std::collections::VecDeque;

use crate::models::SeriesPoint;

/// Number of points the dashboard chart keeps
pub const DEFAULT_SERIES_CAPACITY: usize = 20;

/// Append-only window of the most recent series points.
///
/// Insertion order is arrival order is chronological order. Once full, every
/// append evicts the oldest point, so the length never exceeds `capacity`.
#[derive(Debug, Clone)]
pub struct WindowedSeries {
    points: VecDeque<SeriesPoint>,
    capacity: usize,
}

impl Default for WindowedSeries {
    fn default() -> Self {
        Self::new(DEFAULT_SERIES_CAPACITY)
    }
}

impl WindowedSeries {
    /// A capacity of zero is raised to one; the window always holds the latest point.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            points: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, point: SeriesPoint) {
        self.points.push_back(point);
        while self.points.len() > self.capacity {
            self.points.pop_front();
        }
    }

    /// Chronological copy of the window, detached from later appends
    pub fn snapshot(&self) -> Vec<SeriesPoint> {
        self.points.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&SeriesPoint> {
        self.points.back()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
