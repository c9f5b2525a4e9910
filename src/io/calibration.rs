use crate::types::{ChannelKind, PixelWavelengthMap, RadError, RadResult};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// Load the pixel-to-wavelength calibration table.
///
/// Calibrated instruments embed the table at a fixed offset in the log
/// header region: `header_lines` lines to skip, then `pixel_count` CSV
/// rows of `pixel, Ed, Lu, Lsky` wavelengths in nm. A standalone
/// calibration CSV with the same four columns loads the same way with
/// `header_lines = 0`.
///
/// The offset and count are explicit arguments; there is no default
/// calibration path baked into the crate.
pub fn load_wavelength_map(
    path: &Path,
    header_lines: usize,
    pixel_count: usize,
) -> RadResult<PixelWavelengthMap> {
    log::info!("loading wavelength calibration from {}", path.display());
    let file = File::open(path).map_err(|e| {
        RadError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    read_wavelength_map(BufReader::new(file), header_lines, pixel_count)
}

/// Read the calibration table from any buffered reader
pub fn read_wavelength_map<R: BufRead>(
    mut reader: R,
    header_lines: usize,
    pixel_count: usize,
) -> RadResult<PixelWavelengthMap> {
    let mut skipped = String::new();
    for _ in 0..header_lines {
        skipped.clear();
        if reader.read_line(&mut skipped)? == 0 {
            return Err(RadError::Schema(format!(
                "calibration block starts after line {} but the file is shorter",
                header_lines
            )));
        }
    }

    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(reader);

    let mut ed_nm = Vec::with_capacity(pixel_count);
    let mut lu_nm = Vec::with_capacity(pixel_count);
    let mut lsky_nm = Vec::with_capacity(pixel_count);

    for result in csv_reader.records().take(pixel_count) {
        let record = result?;
        if record.len() < 4 {
            return Err(RadError::Schema(format!(
                "calibration row {} has {} fields, expected pixel, Ed, Lu, Lsky",
                ed_nm.len(),
                record.len()
            )));
        }

        let parse = |field: &str, name: &str, row: usize| -> RadResult<f64> {
            field.parse().map_err(|_| {
                RadError::Parse(format!(
                    "calibration row {}: bad {} wavelength '{}'",
                    row,
                    name,
                    field
                ))
            })
        };

        ed_nm.push(parse(&record[1], "Ed", ed_nm.len())?);
        lu_nm.push(parse(&record[2], "Lu", ed_nm.len())?);
        lsky_nm.push(parse(&record[3], "Lsky", ed_nm.len())?);
    }

    if ed_nm.len() != pixel_count {
        return Err(RadError::Schema(format!(
            "calibration table has {} rows, expected {}",
            ed_nm.len(),
            pixel_count
        )));
    }

    let map = PixelWavelengthMap {
        pixel_count,
        lu_nm,
        lsky_nm,
        ed_nm,
    };

    // Monotonic maps are an interpolation precondition; a violation here
    // means the calibration file itself is suspect.
    for channel in ChannelKind::ALL {
        let nm = map.wavelengths(channel);
        if nm.windows(2).any(|w| w[1] <= w[0]) {
            log::warn!("{} wavelength map is not monotonically increasing", channel);
        }
    }

    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn toy_calibration(rows: usize) -> String {
        let mut text = String::from("# calibration block\n# pixel map follows\n");
        for pixel in 0..rows {
            let base = 400.0 + pixel as f64 * 100.0;
            text.push_str(&format!(
                "{}, {}, {}, {}\n",
                pixel,
                base,
                base + 1.0,
                base + 2.0
            ));
        }
        text
    }

    #[test]
    fn test_load_per_channel_columns() {
        let map = read_wavelength_map(Cursor::new(toy_calibration(4)), 2, 4).unwrap();
        assert_eq!(map.pixel_count, 4);
        assert_eq!(map.ed_nm, vec![400.0, 500.0, 600.0, 700.0]);
        assert_eq!(map.lu_nm, vec![401.0, 501.0, 601.0, 701.0]);
        assert_eq!(map.lsky_nm, vec![402.0, 502.0, 602.0, 702.0]);
        assert_eq!(map.wavelengths(ChannelKind::Lsky)[0], 402.0);
    }

    #[test]
    fn test_short_table_is_schema_error() {
        let err = read_wavelength_map(Cursor::new(toy_calibration(3)), 2, 200).unwrap_err();
        assert!(matches!(err, RadError::Schema(_)));
    }

    #[test]
    fn test_bad_wavelength_is_parse_error() {
        let text = "skip\nskip\n0, 400.0, forty, 402.0\n";
        let err = read_wavelength_map(Cursor::new(text), 2, 1).unwrap_err();
        assert!(matches!(err, RadError::Parse(_)));
    }

    #[test]
    fn test_missing_header_block_is_schema_error() {
        let err = read_wavelength_map(Cursor::new("one line\n"), 5, 1).unwrap_err();
        assert!(matches!(err, RadError::Schema(_)));
    }
}
