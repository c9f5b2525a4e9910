use crate::core::quality::{apply_quality_filter, QualityPolicy};
use crate::types::{
    ChannelKind, LongFormatLog, RadError, RadResult, SampleMeta, SpectralRecord,
};
use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Log file schema for one instrument firmware version.
///
/// The raw log opens with a fixed-size header block (instrument settings
/// and the embedded wavelength calibration), followed by a CSV-like table
/// whose column names are fixed per firmware version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogFormat {
    /// Lines to skip before the column header row
    pub header_lines: usize,
    /// Declared size of the `Spec[n]` pixel column family
    pub pixel_count: usize,
    /// Extension of transect log files when scanning a directory
    pub file_extension: String,
}

impl Default for LogFormat {
    fn default() -> Self {
        // Reference firmware: 216 header lines, 200 spectral pixels
        Self {
            header_lines: 216,
            pixel_count: 200,
            file_extension: "dtf".to_string(),
        }
    }
}

/// Positions of the named columns in the data table, resolved from the
/// header row. Unknown columns (e.g. gear position) are ignored.
#[derive(Debug, Clone)]
struct ColumnLayout {
    sample_no: usize,
    date: usize,
    time: usize,
    channel: usize,
    latitude: usize,
    longitude: usize,
    solar_azimuth: usize,
    solar_elevation: usize,
    rel_azimuth: usize,
    heading: usize,
    pitch: usize,
    roll: usize,
    integration_time: usize,
    saturation: usize,
    voltage: Option<usize>,
    temperature: Option<usize>,
    /// (pixel index, column index) for each `Spec[n]` column
    pixels: Vec<(u32, usize)>,
    /// Header text of the date column, used to spot re-embedded headers
    date_header: String,
}

impl ColumnLayout {
    fn from_header(header: &str, pixel_count: usize) -> RadResult<Self> {
        let names: Vec<String> = header.split(',').map(|s| s.trim().to_string()).collect();

        let find = |name: &str| -> RadResult<usize> {
            names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| RadError::Schema(format!("missing required column '{}'", name)))
        };
        let find_opt = |name: &str| names.iter().position(|n| n == name);

        // Per-pixel column family, e.g. "Spec[0]" .. "Spec[199]"
        let spec_re = Regex::new(r"^Spec\[(\d+)\]$")
            .map_err(|e| RadError::Processing(format!("regex error: {}", e)))?;
        let mut pixels = Vec::new();
        for (idx, name) in names.iter().enumerate() {
            if let Some(caps) = spec_re.captures(name) {
                let pixel: u32 = caps[1]
                    .parse()
                    .map_err(|_| RadError::Schema(format!("bad pixel column '{}'", name)))?;
                pixels.push((pixel, idx));
            }
        }

        if pixels.len() != pixel_count {
            return Err(RadError::Schema(format!(
                "expected {} spectral pixel columns, found {}",
                pixel_count,
                pixels.len()
            )));
        }
        pixels.sort_by_key(|&(pixel, _)| pixel);

        let date = find("UTC Date")?;
        Ok(Self {
            sample_no: find("Sample #")?,
            date,
            time: find("UTC Time")?,
            channel: find("Channel")?,
            latitude: find("Lat")?,
            longitude: find("Lon")?,
            solar_azimuth: find("Solar Azi")?,
            solar_elevation: find("Solar Elev")?,
            rel_azimuth: find("Relaz")?,
            heading: find("Heading")?,
            pitch: find("Pitch")?,
            roll: find("Roll")?,
            integration_time: find("Integration Time")?,
            saturation: find("Saturation Flag")?,
            voltage: find_opt("Voltage"),
            temperature: find_opt("Temp"),
            pixels,
            date_header: names[date].clone(),
        })
    }
}

/// One unpivoted data row: a full channel reading with its spectrum
#[derive(Debug, Clone)]
struct WideRecord {
    timestamp: DateTime<Utc>,
    channel: ChannelKind,
    meta: SampleMeta,
    spectrum: Vec<f64>,
}

/// Reader for instrument transect logs.
///
/// Parses raw serial ASCII logs into the canonical long-format table,
/// applying the structural validity checks and the quality policy on the
/// way through.
#[derive(Debug, Clone, Default)]
pub struct LogReader {
    format: LogFormat,
    policy: QualityPolicy,
}

impl LogReader {
    pub fn new(format: LogFormat, policy: QualityPolicy) -> Self {
        Self { format, policy }
    }

    pub fn format(&self) -> &LogFormat {
        &self.format
    }

    /// Parse one raw log file into a quality-filtered long-format table.
    ///
    /// Structural drops (blank rows, re-embedded header rows, session
    /// sentinel rows) are silent; rows with missing required fields are
    /// dropped whole; repeated (sample id, channel) transmissions keep the
    /// last occurrence. An unparsable surviving date is fatal for the file.
    pub fn read_file(&self, path: &Path) -> RadResult<LongFormatLog> {
        log::info!("parsing transect log {}", path.display());
        let file = File::open(path).map_err(|e| {
            RadError::Io(std::io::Error::new(
                e.kind(),
                format!("{}: {}", path.display(), e),
            ))
        })?;

        self.read_from(BufReader::new(file))
            .map_err(|e| annotate_with_path(e, path))
    }

    /// Parse a raw log from any buffered reader
    pub fn read_from<R: BufRead>(&self, reader: R) -> RadResult<LongFormatLog> {
        let mut lines = reader.lines();

        // Skip the instrument header block
        for _ in 0..self.format.header_lines {
            if lines.next().transpose()?.is_none() {
                return Err(RadError::Schema(format!(
                    "log shorter than the {} declared header lines",
                    self.format.header_lines
                )));
            }
        }

        let header = loop {
            match lines.next().transpose()? {
                Some(line) if !line.trim().is_empty() => break line,
                Some(_) => continue,
                None => return Err(RadError::Schema("no column header row found".to_string())),
            }
        };
        let layout = ColumnLayout::from_header(&header, self.format.pixel_count)?;

        // Keep-last dedup of retransmitted (sample id, channel) pairs
        let mut wide: Vec<WideRecord> = Vec::new();
        let mut seen: HashMap<(u64, ChannelKind), usize> = HashMap::new();

        for line in lines {
            let line = line?;
            if let Some(record) = self.parse_row(&line, &layout)? {
                match seen.entry((record.meta.sample_no, record.channel)) {
                    std::collections::hash_map::Entry::Occupied(slot) => {
                        log::debug!(
                            "duplicate transmission of sample {} channel {}, keeping last",
                            record.meta.sample_no,
                            record.channel
                        );
                        wide[*slot.get()] = record;
                    }
                    std::collections::hash_map::Entry::Vacant(slot) => {
                        slot.insert(wide.len());
                        wide.push(record);
                    }
                }
            }
        }

        // Wide -> long pivot: one row per declared pixel column
        let mut records = Vec::with_capacity(wide.len() * self.format.pixel_count);
        for w in wide {
            for (i, &(pixel, _)) in layout.pixels.iter().enumerate() {
                records.push(SpectralRecord {
                    timestamp: w.timestamp,
                    channel: w.channel,
                    pixel,
                    magnitude: w.spectrum[i],
                    meta: w.meta,
                });
            }
        }

        let mut table = LongFormatLog::from_records(records);
        apply_quality_filter(&mut table, &self.policy, self.format.pixel_count);

        log::info!("parsed {} long-format rows", table.len());
        Ok(table)
    }

    /// Parse one data row. `Ok(None)` means the row was structurally
    /// invalid or incomplete and is skipped.
    fn parse_row(&self, line: &str, layout: &ColumnLayout) -> RadResult<Option<WideRecord>> {
        if line.trim().is_empty() {
            return Ok(None);
        }

        let fields: Vec<&str> = line.split(',').map(|f| f.trim()).collect();
        let get = |idx: usize| fields.get(idx).copied().unwrap_or("");

        // Structural validity, not value filtering: rows with a missing
        // date, or carrying the header text re-embedded by a device
        // restart, are not data.
        let date = get(layout.date);
        if date.is_empty() || date == layout.date_header {
            return Ok(None);
        }

        // Session boundary markers sit in the sample-id column and are not
        // numeric; drop them with the rest of the structural noise.
        let sample_no: u64 = match get(layout.sample_no).parse() {
            Ok(n) => n,
            Err(_) => {
                log::debug!("skipping non-data row '{}'", get(layout.sample_no));
                return Ok(None);
            }
        };

        // A date that survived cleaning must parse; this is fatal.
        let timestamp = parse_day_first(date, get(layout.time))?;

        // A valid row carrying a channel outside the configured set means
        // the file does not match the schema at all.
        let channel: ChannelKind = get(layout.channel).parse().map_err(|_| {
            RadError::Schema(format!(
                "sample {}: unexpected channel '{}'",
                sample_no,
                get(layout.channel)
            ))
        })?;

        // NA policy: any missing required field drops the row whole.
        // Metadata is never imputed.
        macro_rules! required {
            ($idx:expr) => {
                match get($idx).parse::<f64>() {
                    Ok(v) => v,
                    Err(_) => return Ok(None),
                }
            };
        }

        let saturated = match get(layout.saturation).parse::<i64>() {
            Ok(flag) => flag != 0,
            Err(_) => return Ok(None),
        };

        let meta = SampleMeta {
            sample_no,
            latitude: required!(layout.latitude),
            longitude: required!(layout.longitude),
            solar_azimuth: required!(layout.solar_azimuth),
            solar_elevation: required!(layout.solar_elevation),
            rel_azimuth: required!(layout.rel_azimuth),
            heading: required!(layout.heading),
            pitch: required!(layout.pitch),
            roll: required!(layout.roll),
            integration_time_ms: required!(layout.integration_time),
            saturated,
            voltage: layout.voltage.and_then(|idx| get(idx).parse().ok()),
            temperature: layout.temperature.and_then(|idx| get(idx).parse().ok()),
        };

        let mut spectrum = Vec::with_capacity(layout.pixels.len());
        for &(_, col) in &layout.pixels {
            match get(col).parse::<f64>() {
                Ok(v) => spectrum.push(v),
                Err(_) => return Ok(None),
            }
        }

        Ok(Some(WideRecord {
            timestamp,
            channel,
            meta,
            spectrum,
        }))
    }

    /// Parse an explicit list of log files and concatenate the results in
    /// timestamp order.
    ///
    /// Files parse independently (in parallel when the `parallel` feature
    /// is on), but the load is all-or-nothing: the first failing file
    /// aborts the whole call. The merged ordering is identical regardless
    /// of parallelism.
    pub fn read_files(&self, paths: &[PathBuf]) -> RadResult<LongFormatLog> {
        #[cfg(feature = "parallel")]
        let parsed: RadResult<Vec<LongFormatLog>> =
            paths.par_iter().map(|p| self.read_file(p)).collect();

        #[cfg(not(feature = "parallel"))]
        let parsed: RadResult<Vec<LongFormatLog>> =
            paths.iter().map(|p| self.read_file(p)).collect();

        let mut merged = LongFormatLog::new();
        for table in parsed? {
            merged.extend(table);
        }
        log::info!("loaded {} files, {} rows total", paths.len(), merged.len());
        Ok(merged)
    }

    /// Load every matching log file in a directory.
    ///
    /// Files are ordered by name before parsing so the load is
    /// deterministic; the final table is sorted by timestamp.
    pub fn read_dir(&self, dir: &Path) -> RadResult<LongFormatLog> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|p| {
                p.extension()
                    .and_then(|e| e.to_str())
                    .map(|e| e.eq_ignore_ascii_case(&self.format.file_extension))
                    .unwrap_or(false)
            })
            .collect();
        paths.sort();

        if paths.is_empty() {
            return Err(RadError::Schema(format!(
                "no .{} log files in {}",
                self.format.file_extension,
                dir.display()
            )));
        }

        self.read_files(&paths)
    }
}

/// Combine the raw date and time fields and parse them day-first
fn parse_day_first(date: &str, time: &str) -> RadResult<DateTime<Utc>> {
    let combined = format!("{} {}", date, time);
    for fmt in ["%d/%m/%Y %H:%M:%S%.f", "%d/%m/%Y %H:%M:%S", "%d-%m-%Y %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&combined, fmt) {
            return Ok(DateTime::from_naive_utc_and_offset(naive, Utc));
        }
    }
    Err(RadError::Parse(format!(
        "cannot parse timestamp '{}'",
        combined
    )))
}

fn annotate_with_path(err: RadError, path: &Path) -> RadError {
    match err {
        RadError::Schema(msg) => RadError::Schema(format!("{}: {}", path.display(), msg)),
        RadError::Parse(msg) => RadError::Parse(format!("{}: {}", path.display(), msg)),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Cursor;

    /// Build a minimal log: `header_lines` filler lines, a 4-pixel column
    /// header, then the given data rows.
    fn toy_log(rows: &[&str]) -> String {
        let mut out = String::new();
        for i in 0..3 {
            out.push_str(&format!("# instrument header line {}\n", i));
        }
        out.push_str(
            "Sample #, UTC Date, UTC Time, Lat, Lon, Solar Azi, Solar Elev, Relaz, Heading, \
             Pitch, Roll, Gearpos, Voltage, Temp, Channel, Integration Time, Saturation Flag, \
             Spec[0], Spec[1], Spec[2], Spec[3]\n",
        );
        for row in rows {
            out.push_str(row);
            out.push('\n');
        }
        out
    }

    fn toy_reader() -> LogReader {
        LogReader::new(
            LogFormat {
                header_lines: 3,
                pixel_count: 4,
                file_extension: "dtf".to_string(),
            },
            QualityPolicy::default(),
        )
    }

    fn row(sample: u64, time: &str, channel: &str, saturated: u8, spec: [f64; 4]) -> String {
        format!(
            "{}, 14/07/2021, {}, 56.147209, -3.923337, 180.1, 41.2, 135.0, 92.3, 0.4, -0.2, \
             2, 12.1, 18.4, {}, 256, {}, {}, {}, {}, {}",
            sample, time, channel, saturated, spec[0], spec[1], spec[2], spec[3]
        )
    }

    fn full_sample(sample: u64, time: &str, saturated: u8) -> Vec<String> {
        vec![
            row(sample, time, "Lu", saturated, [1.0, 2.0, 3.0, 4.0]),
            row(sample, time, "Lsky", saturated, [0.1, 0.2, 0.3, 0.4]),
            row(sample, time, "Ed", saturated, [10.0, 20.0, 30.0, 40.0]),
        ]
    }

    #[test]
    fn test_parse_pivots_to_long_format() {
        let rows = full_sample(1, "10:00:00", 0);
        let text = toy_log(&rows.iter().map(String::as_str).collect::<Vec<_>>());

        let table = toy_reader().read_from(Cursor::new(text)).unwrap();
        // 3 channels x 4 pixels
        assert_eq!(table.len(), 12);

        let t = Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 0).unwrap();
        let lu = table.spectrum(t, ChannelKind::Lu).unwrap();
        assert_eq!(lu.magnitudes, vec![1.0, 2.0, 3.0, 4.0]);

        let first = &table.records()[0];
        assert_eq!(first.meta.sample_no, 1);
        assert!((first.meta.latitude - 56.147209).abs() < 1e-9);
        assert_eq!(first.meta.voltage, Some(12.1));
    }

    #[test]
    fn test_reembedded_header_and_sentinel_rows_dropped() {
        let mut rows = full_sample(1, "10:00:00", 0);
        // device restart re-announces the header mid-stream
        rows.push(
            "Sample #, UTC Date, UTC Time, Lat, Lon, Solar Azi, Solar Elev, Relaz, Heading, \
             Pitch, Roll, Gearpos, Voltage, Temp, Channel, Integration Time, Saturation Flag, \
             Spec[0], Spec[1], Spec[2], Spec[3]"
                .to_string(),
        );
        // session boundary marker in the sample-id column
        rows.push("SESSION, 14/07/2021, , , , , , , , , , , , , , , , , , ,".to_string());
        rows.push(String::new());
        rows.extend(full_sample(2, "10:00:10", 0));

        let text = toy_log(&rows.iter().map(String::as_str).collect::<Vec<_>>());
        let table = toy_reader().read_from(Cursor::new(text)).unwrap();
        assert_eq!(table.len(), 24);
        assert_eq!(table.timestamps().len(), 2);
    }

    #[test]
    fn test_duplicate_transmission_keeps_last() {
        let mut rows = full_sample(1, "10:00:00", 0);
        // retransmission of sample 1's Lu with different magnitudes
        rows.push(row(1, "10:00:00", "Lu", 0, [9.0, 9.0, 9.0, 9.0]));

        let text = toy_log(&rows.iter().map(String::as_str).collect::<Vec<_>>());
        let table = toy_reader().read_from(Cursor::new(text)).unwrap();
        assert_eq!(table.len(), 12);

        let t = Utc.with_ymd_and_hms(2021, 7, 14, 10, 0, 0).unwrap();
        let lu = table.spectrum(t, ChannelKind::Lu).unwrap();
        assert_eq!(lu.magnitudes, vec![9.0, 9.0, 9.0, 9.0]);
    }

    #[test]
    fn test_saturated_sample_excluded_whole() {
        let mut rows = full_sample(1, "10:00:00", 0);
        rows.extend(full_sample(2, "10:00:10", 1));

        let text = toy_log(&rows.iter().map(String::as_str).collect::<Vec<_>>());
        let table = toy_reader().read_from(Cursor::new(text)).unwrap();
        assert_eq!(table.len(), 12);
        assert_eq!(table.timestamps().len(), 1);
    }

    #[test]
    fn test_na_row_dropped_whole() {
        let mut rows = full_sample(1, "10:00:00", 0);
        // sample 2's Lsky lost its latitude: the whole group goes
        let mut partial = full_sample(2, "10:00:10", 0);
        partial[1] = partial[1].replace("56.147209", "");
        rows.extend(partial);

        let text = toy_log(&rows.iter().map(String::as_str).collect::<Vec<_>>());
        let table = toy_reader().read_from(Cursor::new(text)).unwrap();
        // the NA row goes, then channel completeness drops the remnant
        assert_eq!(table.timestamps().len(), 1);
    }

    #[test]
    fn test_wrong_pixel_count_is_schema_error() {
        let reader = LogReader::new(
            LogFormat {
                header_lines: 3,
                pixel_count: 8,
                file_extension: "dtf".to_string(),
            },
            QualityPolicy::default(),
        );
        let rows = full_sample(1, "10:00:00", 0);
        let text = toy_log(&rows.iter().map(String::as_str).collect::<Vec<_>>());

        let err = reader.read_from(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, RadError::Schema(_)));
    }

    #[test]
    fn test_unparsable_date_is_fatal() {
        let bad = row(1, "25:99:99", "Lu", 0, [1.0, 2.0, 3.0, 4.0]);
        let text = toy_log(&[&bad]);

        let err = toy_reader().read_from(Cursor::new(text)).unwrap_err();
        assert!(matches!(err, RadError::Parse(_)));
    }

    #[test]
    fn test_truncated_header_block_is_schema_error() {
        let err = toy_reader()
            .read_from(Cursor::new("only one line\n"))
            .unwrap_err();
        assert!(matches!(err, RadError::Schema(_)));
    }
}
