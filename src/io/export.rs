//! CSV export for the price-annotated timeline.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::schedule::TimelineBucket;
use crate::schedule::types::utc_label;

/// Column header for the timeline export.
const HEADER: &str = "start,start_utc,state,token,price_eur_kwh,price_eur_mwh";

/// Exports a timeline to a CSV file at the given path.
///
/// Writes a header row followed by one row per bucket, in the order given.
/// Buckets without a known price leave both price columns empty.
///
/// # Errors
///
/// Returns an `io::Error` if file creation or writing fails.
pub fn export_timeline_csv(buckets: &[TimelineBucket], path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    write_timeline_csv(buckets, io::BufWriter::new(file))
}

/// Writes a timeline as CSV to any writer.
///
/// # Errors
///
/// Returns an `io::Error` if writing fails.
pub fn write_timeline_csv(buckets: &[TimelineBucket], writer: impl Write) -> io::Result<()> {
    let mut wtr = csv::WriterBuilder::new().from_writer(writer);
    wtr.write_record(HEADER.split(','))?;

    for b in buckets {
        let (kwh, mwh) = match b.price {
            Some(p) => (format!("{p:.5}"), format!("{:.2}", p * 1000.0)),
            None => (String::new(), String::new()),
        };
        wtr.write_record(&[
            b.start.to_string(),
            utc_label(b.start),
            b.state.to_string(),
            b.state.as_token().to_string(),
            kwh,
            mwh,
        ])?;
    }

    wtr.flush()?;
    Ok(())
}
