use crate::types::{ChannelKind, ChannelSpectrum, LongFormatLog, RadError, RadResult};
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Aggregation statistic for temporal resampling.
///
/// A fixed enumerated set with explicit dispatch; `Std` is the sample
/// standard deviation and yields NaN for single-row buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Statistic {
    Mean,
    Median,
    Sum,
    Std,
    Min,
    Max,
}

impl Statistic {
    /// Reduce a non-empty set of values. Sorts in place where the
    /// statistic needs order.
    pub fn reduce(&self, values: &mut [f64]) -> f64 {
        debug_assert!(!values.is_empty());
        let n = values.len() as f64;
        match self {
            Statistic::Mean => values.iter().sum::<f64>() / n,
            Statistic::Sum => values.iter().sum(),
            Statistic::Min => values.iter().cloned().fold(f64::INFINITY, f64::min),
            Statistic::Max => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            Statistic::Std => {
                if values.len() < 2 {
                    return f64::NAN;
                }
                let mean = values.iter().sum::<f64>() / n;
                let ss = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>();
                (ss / (n - 1.0)).sqrt()
            }
            Statistic::Median => {
                values.sort_by(|a, b| a.total_cmp(b));
                let mid = values.len() / 2;
                if values.len() % 2 == 0 {
                    (values[mid - 1] + values[mid]) / 2.0
                } else {
                    values[mid]
                }
            }
        }
    }
}

/// One aggregated row of a resampled log.
///
/// Magnitude, latitude and longitude are reduced with the configured
/// statistic; all other (non-numeric or per-reading) fields are dropped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BucketedRecord {
    pub bucket: DateTime<Utc>,
    pub channel: ChannelKind,
    pub pixel: u32,
    pub magnitude: f64,
    pub latitude: f64,
    pub longitude: f64,
    /// Number of samples reduced into this row
    pub count: usize,
}

/// A long-format table aggregated into fixed time buckets
#[derive(Debug, Clone)]
pub struct ResampledLog {
    pub bucket_width: Duration,
    pub statistic: Statistic,
    records: Vec<BucketedRecord>,
}

impl ResampledLog {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[BucketedRecord] {
        &self.records
    }

    /// Distinct bucket start times in ascending order
    pub fn buckets(&self) -> Vec<DateTime<Utc>> {
        let mut out: Vec<DateTime<Utc>> = self.records.iter().map(|r| r.bucket).collect();
        out.sort();
        out.dedup();
        out
    }

    /// Pixel-ordered spectrum of one (bucket, channel) group
    pub fn spectrum(&self, bucket: DateTime<Utc>, channel: ChannelKind) -> Option<ChannelSpectrum> {
        let mut rows: Vec<(u32, f64)> = self
            .records
            .iter()
            .filter(|r| r.bucket == bucket && r.channel == channel)
            .map(|r| (r.pixel, r.magnitude))
            .collect();

        if rows.is_empty() {
            return None;
        }
        rows.sort_by_key(|&(pixel, _)| pixel);

        let (pixels, magnitudes) = rows.into_iter().unzip();
        Some(ChannelSpectrum { pixels, magnitudes })
    }
}

/// Truncate a timestamp to the start of its bucket.
///
/// Buckets are half-open `[start, start + width)` and anchored at the Unix
/// epoch, so boundaries are independent of data content.
pub fn bucket_start(t: DateTime<Utc>, width: Duration) -> DateTime<Utc> {
    let width_ms = width.num_milliseconds();
    let index = t.timestamp_millis().div_euclid(width_ms);
    Utc.timestamp_millis_opt(index * width_ms).unwrap()
}

/// Aggregate a long-format log into fixed time buckets per
/// (channel, pixel) series.
///
/// Buckets with no rows are simply absent from the output.
pub fn resample(
    log: &LongFormatLog,
    width: Duration,
    statistic: Statistic,
) -> RadResult<ResampledLog> {
    if width <= Duration::zero() {
        return Err(RadError::Processing(format!(
            "bucket width must be positive, got {}",
            width
        )));
    }

    log::info!(
        "resampling {} rows into {}s buckets ({:?})",
        log.len(),
        width.num_seconds(),
        statistic
    );

    type Key = (DateTime<Utc>, ChannelKind, u32);
    let mut groups: HashMap<Key, (Vec<f64>, Vec<f64>, Vec<f64>)> = HashMap::new();

    for record in log.records() {
        let key = (bucket_start(record.timestamp, width), record.channel, record.pixel);
        let (magnitudes, lats, lons) = groups.entry(key).or_default();
        magnitudes.push(record.magnitude);
        lats.push(record.meta.latitude);
        lons.push(record.meta.longitude);
    }

    let mut records: Vec<BucketedRecord> = groups
        .into_iter()
        .map(|((bucket, channel, pixel), (mut magnitudes, mut lats, mut lons))| BucketedRecord {
            bucket,
            channel,
            pixel,
            count: magnitudes.len(),
            magnitude: statistic.reduce(&mut magnitudes),
            latitude: statistic.reduce(&mut lats),
            longitude: statistic.reduce(&mut lons),
        })
        .collect();

    records.sort_by(|a, b| (a.bucket, a.channel, a.pixel).cmp(&(b.bucket, b.channel, b.pixel)));

    log::debug!("resampled to {} bucket rows", records.len());

    Ok(ResampledLog {
        bucket_width: width,
        statistic,
        records,
    })
}
