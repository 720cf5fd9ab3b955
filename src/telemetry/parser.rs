//! Distance line parser
//!
//! The rover prints readings as `<label>: <cm>cm`, one or more per line,
//! e.g. `L: 23cm C: 40cm R: 87cm`.

use std::sync::OnceLock;

use regex::Regex;

use super::reading::SensorPosition;

fn distance_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"([LCR]):\s*(\d+)\s*cm").expect("distance pattern is valid"))
}

/// Extract every `(position, cm)` pair from a line, in order of appearance.
///
/// Lines without a match yield an empty vector. Values too large for `u32`
/// are skipped.
///
/// # Examples
///
/// ```
/// use rover_bridge::telemetry::{parse_distances, SensorPosition};
///
/// let samples = parse_distances("L: 23cm R: 87cm");
/// assert_eq!(samples, vec![(SensorPosition::Left, 23), (SensorPosition::Right, 87)]);
/// assert!(parse_distances("boot ok").is_empty());
/// ```
pub fn parse_distances(line: &str) -> Vec<(SensorPosition, u32)> {
    distance_pattern()
        .captures_iter(line)
        .filter_map(|caps| {
            let label = caps.get(1)?.as_str().chars().next()?;
            let position = SensorPosition::from_label(label)?;
            let cm = caps.get(2)?.as_str().parse().ok()?;
            Some((position, cm))
        })
        .collect()
}
