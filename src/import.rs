//! CSV import: schema validation and row-by-row classification.

use crate::classify::{Classifier, ImportError, RawRecord};
use crate::events::Events;
use std::collections::HashSet;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Columns every export file must carry. Extra columns are ignored.
pub const REQUIRED_COLUMNS: &[&str] = &[
    "Transaction",
    "Type",
    "Input Currency",
    "Input Amount",
    "Output Currency",
    "Output Amount",
    "USD Equivalent",
    "Fee",
    "Fee Currency",
    "Details",
    "Date / Time (UTC)",
];

/// Reject a header that is empty or missing required columns, naming every
/// missing column at once. Runs before any row is parsed.
pub fn validate_header(headers: &csv::StringRecord) -> Result<(), ImportError> {
    if headers.is_empty() {
        return Err(ImportError::EmptyInput);
    }
    let present: HashSet<&str> = headers.iter().collect();
    let missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|column| !present.contains(**column))
        .map(|column| column.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ImportError::MissingColumns(missing));
    }
    Ok(())
}

/// Read and classify one export. Collections come back sorted by timestamp
/// ascending (the export itself is reverse chronological).
pub fn read_csv<R: Read>(reader: R, classifier: &Classifier) -> Result<Events, ImportError> {
    let mut rdr = csv::Reader::from_reader(reader);
    validate_header(rdr.headers()?)?;

    let mut events = Events::default();
    let mut rows = 0usize;
    for result in rdr.deserialize() {
        let record: RawRecord = result?;
        rows += 1;
        let row_events = classifier.classify(&record)?;
        if row_events.is_empty() {
            events.dropped_rows += 1;
        }
        for event in row_events {
            events.push(event);
        }
    }
    events.sort_by_date();
    log::info!(
        "read {} rows: {} events, {} FX observations, {} dropped",
        rows,
        events.total_events(),
        events.fx_observations.len(),
        events.dropped_rows
    );
    Ok(events)
}

pub fn read_csv_file(path: &Path, classifier: &Classifier) -> Result<Events, ImportError> {
    log::info!("reading {}", path.display());
    let file = File::open(path)?;
    read_csv(file, classifier)
}

/// Read several exports and merge them into one date-sorted event set.
pub fn read_csv_files<P: AsRef<Path>>(
    paths: &[P],
    classifier: &Classifier,
) -> Result<Events, ImportError> {
    let mut merged = Events::default();
    for path in paths {
        merged.append(read_csv_file(path.as_ref(), classifier)?);
    }
    merged.sort_by_date();
    Ok(merged)
}
