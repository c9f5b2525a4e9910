use crate::core::table::{BandedRow, GriddedRow};
use crate::types::{RadError, RadResult};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Write the uniform-grid table as delimited text, one row per
/// (bucket, wavelength)
pub fn write_gridded<W: Write>(writer: W, rows: &[GriddedRow]) -> RadResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the band-convolved table as delimited text, one row per
/// (bucket, band)
pub fn write_banded<W: Write>(writer: W, rows: &[BandedRow]) -> RadResult<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    for row in rows {
        csv_writer.serialize(row)?;
    }
    csv_writer.flush()?;
    Ok(())
}

/// Write the Rrs matrix in wide layout: one row per bucket, one `Rrs<nm>`
/// column per wavelength.
///
/// This is the layout the downstream delta-correction step consumes.
/// Every bucket must cover the same wavelength set (gridded tables always
/// do).
pub fn write_rrs_matrix<W: Write>(writer: W, rows: &[GriddedRow]) -> RadResult<()> {
    if rows.is_empty() {
        return Err(RadError::Processing(
            "nothing to export: empty gridded table".to_string(),
        ));
    }

    let mut wavelengths: Vec<f64> = rows.iter().map(|r| r.wavelength_nm).collect();
    wavelengths.sort_by(|a, b| a.total_cmp(b));
    wavelengths.dedup();

    // bucket -> wavelength -> rrs
    let mut by_bucket: BTreeMap<_, BTreeMap<u64, f64>> = BTreeMap::new();
    for row in rows {
        by_bucket
            .entry(row.bucket)
            .or_default()
            .insert(row.wavelength_nm.to_bits(), row.rrs);
    }

    let mut csv_writer = csv::Writer::from_writer(writer);

    let mut header = vec!["datetime".to_string()];
    header.extend(wavelengths.iter().map(|nm| format!("Rrs{}", nm)));
    csv_writer.write_record(&header)?;

    for (bucket, by_wavelength) in by_bucket {
        let mut record = vec![bucket.to_rfc3339()];
        for nm in &wavelengths {
            let rrs = by_wavelength.get(&nm.to_bits()).ok_or_else(|| {
                RadError::Schema(format!(
                    "bucket {} has no value at {} nm; buckets cover different grids",
                    bucket, nm
                ))
            })?;
            record.push(rrs.to_string());
        }
        csv_writer.write_record(&record)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Convenience wrapper writing the wide Rrs matrix to a file path
pub fn write_rrs_matrix_file(path: &Path, rows: &[GriddedRow]) -> RadResult<()> {
    log::info!("writing Rrs matrix to {}", path.display());
    let file = File::create(path).map_err(|e| {
        RadError::Io(std::io::Error::new(
            e.kind(),
            format!("{}: {}", path.display(), e),
        ))
    })?;
    write_rrs_matrix(file, rows)
}
