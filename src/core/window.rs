// Copyright (c) 2026 bad-antics
// Licensed under the MIT License. See LICENSE file in the project root.
// https://github.com/bad-antics/rockwatch

//! Fixed-capacity reading window

use std::collections::VecDeque;

use crate::sensors::SensorReading;

/// FIFO buffer of the most recent readings, oldest first
#[derive(Debug, Clone)]
pub struct RollingWindow {
    readings: VecDeque<SensorReading>,
    capacity: usize,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting the oldest entry when full. Returns the evicted reading.
    pub fn push(&mut self, reading: SensorReading) -> Option<SensorReading> {
        let evicted = if self.readings.len() == self.capacity {
            self.readings.pop_front()
        } else {
            None
        };
        self.readings.push_back(reading);
        evicted
    }

    /// Replace the contents, keeping the newest `capacity` entries
    pub fn seed(&mut self, readings: Vec<SensorReading>) {
        self.readings.clear();
        let skip = readings.len().saturating_sub(self.capacity);
        self.readings.extend(readings.into_iter().skip(skip));
    }

    pub fn latest(&self) -> Option<&SensorReading> {
        self.readings.back()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn iter(&self) -> impl Iterator<Item = &SensorReading> {
        self.readings.iter()
    }

    pub fn to_vec(&self) -> Vec<SensorReading> {
        self.readings.iter().cloned().collect()
    }
}
