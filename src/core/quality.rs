use crate::types::{ChannelKind, LongFormatLog};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Quality filtering policy.
///
/// Missing-field rows never reach this stage: the parser drops incomplete
/// rows whole rather than imputing (metadata is never interpolated, only
/// wavelength is).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityPolicy {
    /// Drop every sample with a saturation flag set. Disable to inspect
    /// raw saturated data.
    pub drop_saturated: bool,
    /// Drop sample groups that do not carry exactly one complete record
    /// per channel.
    pub require_complete_channels: bool,
}

impl Default for QualityPolicy {
    fn default() -> Self {
        Self {
            drop_saturated: true,
            require_complete_channels: true,
        }
    }
}

/// What the quality filter removed, reported back to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QualityReport {
    pub saturated_samples_dropped: usize,
    pub incomplete_groups_dropped: usize,
    pub rows_dropped: usize,
}

/// Apply the quality policy to a long-format log in place
pub fn apply_quality_filter(
    log: &mut LongFormatLog,
    policy: &QualityPolicy,
    pixel_count: usize,
) -> QualityReport {
    let mut report = QualityReport::default();
    let before = log.len();

    if policy.drop_saturated {
        report.saturated_samples_dropped = remove_saturated(log);
    }
    if policy.require_complete_channels {
        report.incomplete_groups_dropped = enforce_channel_completeness(log, pixel_count);
    }

    report.rows_dropped = before - log.len();
    if report.rows_dropped > 0 {
        log::info!(
            "quality filter dropped {} rows ({} saturated samples, {} incomplete groups)",
            report.rows_dropped,
            report.saturated_samples_dropped,
            report.incomplete_groups_dropped
        );
    }
    report
}

/// Remove every row of any sample whose saturation flag is set.
///
/// A saturated reading invalidates the whole sample: all pixel rows of all
/// channels at that timestamp are dropped together, never partially.
/// Returns the number of samples removed.
pub fn remove_saturated(log: &mut LongFormatLog) -> usize {
    let saturated: HashSet<DateTime<Utc>> = log
        .records()
        .iter()
        .filter(|r| r.meta.saturated)
        .map(|r| r.timestamp)
        .collect();

    if saturated.is_empty() {
        return 0;
    }

    log.retain(|r| !saturated.contains(&r.timestamp));
    saturated.len()
}

/// Exclude sample groups with an unexpected record count.
///
/// Every timestamp must carry exactly `pixel_count` rows for each of the
/// three channels; malformed groups (dropped duplicates, truncated serial
/// writes) are excluded and reported as a warning, and processing
/// continues. Returns the number of groups excluded.
pub fn enforce_channel_completeness(log: &mut LongFormatLog, pixel_count: usize) -> usize {
    let mut counts: HashMap<DateTime<Utc>, HashMap<ChannelKind, usize>> = HashMap::new();
    for record in log.records() {
        *counts
            .entry(record.timestamp)
            .or_default()
            .entry(record.channel)
            .or_default() += 1;
    }

    let malformed: HashSet<DateTime<Utc>> = counts
        .into_iter()
        .filter(|(_, by_channel)| {
            ChannelKind::ALL
                .iter()
                .any(|c| by_channel.get(c).copied().unwrap_or(0) != pixel_count)
        })
        .map(|(ts, _)| ts)
        .collect();

    if malformed.is_empty() {
        return 0;
    }

    for ts in &malformed {
        log::warn!("excluding sample at {} with unexpected record count", ts);
    }
    log.retain(|r| !malformed.contains(&r.timestamp));
    malformed.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SampleMeta, SpectralRecord};
    use chrono::TimeZone;

    fn sample_rows(
        ts: DateTime<Utc>,
        sample_no: u64,
        pixel_count: u32,
        saturated: bool,
    ) -> Vec<SpectralRecord> {
        let meta = SampleMeta {
            sample_no,
            latitude: 56.0,
            longitude: -3.9,
            solar_azimuth: 0.0,
            solar_elevation: 0.0,
            rel_azimuth: 0.0,
            heading: 0.0,
            pitch: 0.0,
            roll: 0.0,
            integration_time_ms: 256.0,
            saturated,
            voltage: None,
            temperature: None,
        };
        ChannelKind::ALL
            .iter()
            .flat_map(|&channel| {
                (0..pixel_count).map(move |pixel| SpectralRecord {
                    timestamp: ts,
                    channel,
                    pixel,
                    magnitude: 1.0,
                    meta,
                })
            })
            .collect()
    }

    #[test]
    fn test_saturation_removal_is_all_or_nothing() {
        let t0 = Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 10).unwrap();

        let mut rows = sample_rows(t0, 1, 4, true);
        rows.extend(sample_rows(t1, 2, 4, false));
        let mut log = LongFormatLog::from_records(rows);

        let dropped = remove_saturated(&mut log);
        assert_eq!(dropped, 1);
        // the clean sample survives intact: 3 channels x 4 pixels
        assert_eq!(log.len(), 12);
        assert!(log.records().iter().all(|r| r.timestamp == t1));
    }

    #[test]
    fn test_saturation_filter_can_be_disabled() {
        let t0 = Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 0).unwrap();
        let mut log = LongFormatLog::from_records(sample_rows(t0, 1, 4, true));

        let policy = QualityPolicy {
            drop_saturated: false,
            require_complete_channels: true,
        };
        let report = apply_quality_filter(&mut log, &policy, 4);
        assert_eq!(report.rows_dropped, 0);
        assert_eq!(log.len(), 12);
    }

    #[test]
    fn test_incomplete_group_excluded() {
        let t0 = Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 10).unwrap();

        let mut rows = sample_rows(t0, 1, 4, false);
        // sample 2 lost its Ed record
        let mut partial = sample_rows(t1, 2, 4, false);
        partial.retain(|r| r.channel != ChannelKind::Ed);
        rows.extend(partial);

        let mut log = LongFormatLog::from_records(rows);
        let dropped = enforce_channel_completeness(&mut log, 4);
        assert_eq!(dropped, 1);
        assert_eq!(log.len(), 12);
        assert!(log.records().iter().all(|r| r.timestamp == t0));
    }

    #[test]
    fn test_complete_log_passes_untouched() {
        let t0 = Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 0).unwrap();
        let mut log = LongFormatLog::from_records(sample_rows(t0, 1, 8, false));

        let report = apply_quality_filter(&mut log, &QualityPolicy::default(), 8);
        assert_eq!(report, QualityReport::default());
        assert_eq!(log.len(), 24);
    }
}
