use chrono::{DateTime, SecondsFormat, Utc};

use crate::shared::FrequencyRange;

/// Power spectrum slice produced by the radio frontend, one bin per `f32`, in dBm.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumSlice {
    timestamp: DateTime<Utc>,
    range: FrequencyRange,
    bins: Vec<f32>,
}

impl SpectrumSlice {
    pub fn new(timestamp: DateTime<Utc>, range: FrequencyRange, bins: Vec<f32>) -> Self {
        Self {
            timestamp,
            range,
            bins,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn range(&self) -> FrequencyRange {
        self.range
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    /// Formats the slice as one Data Tap line:
    /// `<timestamp>;<bandwidth>;<low>;<high>;<bin>,<bin>,...\n`.
    pub fn to_tap_line(&self) -> String {
        let bins = self
            .bins
            .iter()
            .map(|b| b.to_string())
            .collect::<Vec<_>>()
            .join(",");

        format!(
            "{};{};{};{};{}\n",
            self.timestamp.to_rfc3339_opts(SecondsFormat::Micros, true),
            self.range.bandwidth_hz(),
            self.range.low_hz(),
            self.range.high_hz(),
            bins
        )
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn tap_line_format() {
        let slice = SpectrumSlice::new(
            Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
            FrequencyRange::new(145_000_000, 145_025_000).unwrap(),
            vec![-90.5, -72.0, -91.25],
        );

        assert_eq!(
            slice.to_tap_line(),
            "2026-03-01T12:00:00.000000Z;25000;145000000;145025000;-90.5,-72,-91.25\n"
        );
    }
}
