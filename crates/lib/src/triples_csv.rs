//! Reading and writing elicited triples as CSV, one file per batch.

use crate::constants::{TRIPLES_CSV_HEADER, TRIPLES_CSV_PREFIX};
use crate::types::Triple;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum TriplesFileError {
    #[error("Failed to access '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// `wikidata_triples_<index>.csv`
pub fn triples_file_name(index: u32) -> String {
    format!("{TRIPLES_CSV_PREFIX}{index}.csv")
}

/// Writes `triples` to `path`, replacing any previous content. The header is
/// always written, even for an empty batch.
pub fn write_triples_csv(path: &Path, triples: &[Triple]) -> Result<(), TriplesFileError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| TriplesFileError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;
    writer.write_record(TRIPLES_CSV_HEADER)?;
    for triple in triples {
        writer.serialize(triple)?;
    }
    writer.flush().map_err(|source| TriplesFileError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Raw triples written to `{}`.", path.display());
    Ok(())
}

pub fn read_triples_csv(path: &Path) -> Result<Vec<Triple>, TriplesFileError> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize()
        .collect::<Result<Vec<Triple>, _>>()
        .map_err(TriplesFileError::from)
}

/// Reads every `*.csv` file in `dir`, keyed by file name.
pub fn read_triples_dir(dir: &Path) -> Result<BTreeMap<String, Vec<Triple>>, TriplesFileError> {
    let entries = fs::read_dir(dir).map_err(|source| TriplesFileError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = BTreeMap::new();
    for entry in entries {
        let entry = entry.map_err(|source| TriplesFileError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some("csv") {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        let triples = read_triples_csv(&path)?;
        info!("Read {} triples from '{name}'.", triples.len());
        files.insert(name, triples);
    }
    Ok(files)
}
