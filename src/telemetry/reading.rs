//! Latest distance reading per sensor position

use std::sync::{Arc, RwLock};

use serde::Serialize;

/// Ultrasonic sensor mounting position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SensorPosition {
    Left,
    Center,
    Right,
}

impl SensorPosition {
    /// Label used by the rover firmware
    pub fn label(self) -> char {
        match self {
            SensorPosition::Left => 'L',
            SensorPosition::Center => 'C',
            SensorPosition::Right => 'R',
        }
    }

    pub fn from_label(label: char) -> Option<Self> {
        match label {
            'L' => Some(SensorPosition::Left),
            'C' => Some(SensorPosition::Center),
            'R' => Some(SensorPosition::Right),
            _ => None,
        }
    }
}

/// Distance in centimeters per position, `None` until first seen.
///
/// Serializes as `{"L": 23, "C": null, "R": 87}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TelemetryReading {
    #[serde(rename = "L")]
    pub left: Option<u32>,
    #[serde(rename = "C")]
    pub center: Option<u32>,
    #[serde(rename = "R")]
    pub right: Option<u32>,
}

impl TelemetryReading {
    pub fn get(&self, position: SensorPosition) -> Option<u32> {
        match position {
            SensorPosition::Left => self.left,
            SensorPosition::Center => self.center,
            SensorPosition::Right => self.right,
        }
    }

    pub fn set(&mut self, position: SensorPosition, cm: u32) {
        match position {
            SensorPosition::Left => self.left = Some(cm),
            SensorPosition::Center => self.center = Some(cm),
            SensorPosition::Right => self.right = Some(cm),
        }
    }

    /// Overwrite only the positions present in `samples`
    pub fn apply(&mut self, samples: &[(SensorPosition, u32)]) {
        for &(position, cm) in samples {
            self.set(position, cm);
        }
    }
}

/// Shared handle to the latest reading
///
/// Written only by the ingest loop; read by status reporting.
#[derive(Debug, Clone, Default)]
pub struct TelemetryCache {
    inner: Arc<RwLock<TelemetryReading>>,
}

impl TelemetryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply samples and return the full snapshot after the update
    pub fn apply(&self, samples: &[(SensorPosition, u32)]) -> TelemetryReading {
        let mut reading = self.inner.write().unwrap_or_else(|e| e.into_inner());
        reading.apply(samples);
        *reading
    }

    pub fn snapshot(&self) -> TelemetryReading {
        *self.inner.read().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_is_unknown() {
        let reading = TelemetryReading::default();
        assert_eq!(
            serde_json::to_value(reading).unwrap(),
            json!({"L": null, "C": null, "R": null})
        );
    }

    #[test]
    fn test_apply_leaves_absent_labels() {
        let mut reading = TelemetryReading::default();
        reading.set(SensorPosition::Center, 50);

        reading.apply(&[(SensorPosition::Left, 23), (SensorPosition::Right, 87)]);

        assert_eq!(reading.get(SensorPosition::Left), Some(23));
        assert_eq!(reading.get(SensorPosition::Center), Some(50));
        assert_eq!(reading.get(SensorPosition::Right), Some(87));
    }

    #[test]
    fn test_cache_shared_between_clones() {
        let cache = TelemetryCache::new();
        let reader = cache.clone();

        let snapshot = cache.apply(&[(SensorPosition::Left, 7)]);
        assert_eq!(snapshot.left, Some(7));
        assert_eq!(reader.snapshot(), snapshot);
    }

    #[test]
    fn test_labels_round_trip() {
        for position in [SensorPosition::Left, SensorPosition::Center, SensorPosition::Right] {
            assert_eq!(SensorPosition::from_label(position.label()), Some(position));
        }
        assert_eq!(SensorPosition::from_label('X'), None);
    }
}
