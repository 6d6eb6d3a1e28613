//! # Batch Job Store
//!
//! The job store is a directory-as-queue: the stage a record sits in encodes
//! the state of its batch. A record is written to the in-progress stage when
//! its batch is submitted and moved (never copied) to the completed stage once
//! the provider reports it done. The store also keeps the artefacts around a
//! batch: the request file, the downloaded results and the append-only
//! template/index mapping log.
//!
//! `FsJobStore` is the production implementation; `MemoryJobStore` keeps the
//! same contract in memory so the lifecycle can be tested without touching
//! the filesystem. Neither guards against two writers on the same store.

use crate::config::StorePaths;
use crate::constants::{
    COMPLETED_PREFIX, IN_PROGRESS_PREFIX, REQUEST_PREFIX, RESULTS_PREFIX,
};
use crate::types::JobRecord;
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store I/O failed on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Job record is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No {stage} record for index {index}")]
    NotFound { stage: Stage, index: u32 },
    #[error("A {stage} record for index {index} already exists")]
    AlreadyExists { stage: Stage, index: u32 },
    #[error("Malformed mapping log line: {0}")]
    Mapping(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// The two places a job record can live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    InProgress,
    Completed,
}

impl Stage {
    pub fn prefix(self) -> &'static str {
        match self {
            Stage::InProgress => IN_PROGRESS_PREFIX,
            Stage::Completed => COMPLETED_PREFIX,
        }
    }

    /// `in_progress_3.json`, `completed_3.json`, ...
    pub fn file_name(self, index: u32) -> String {
        format!("{}{index}.json", self.prefix())
    }

    /// The inverse of `file_name`. Foreign files yield `None`.
    pub fn parse_file_name(self, name: &str) -> Option<u32> {
        name.strip_prefix(self.prefix())?
            .strip_suffix(".json")?
            .parse()
            .ok()
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::InProgress => f.write_str("in-progress"),
            Stage::Completed => f.write_str("completed"),
        }
    }
}

/// One line of the template/index mapping log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub template_name: String,
    pub index: u32,
}

/// Durable storage for job records and batch artefacts.
pub trait JobStore: Send + Sync {
    /// Indices of every record in `stage`, ascending.
    fn list(&self, stage: Stage) -> Result<Vec<u32>, StoreError>;
    fn read(&self, stage: Stage, index: u32) -> Result<JobRecord, StoreError>;
    fn write(&self, stage: Stage, index: u32, record: &JobRecord) -> Result<(), StoreError>;
    /// Moves a record between stages. Fails if the source is missing or the
    /// destination is already taken.
    fn move_record(&self, index: u32, from: Stage, to: Stage) -> Result<(), StoreError>;

    fn write_request(&self, index: u32, payload: &[u8]) -> Result<(), StoreError>;
    fn write_results(&self, index: u32, payload: &[u8]) -> Result<(), StoreError>;
    fn read_results(&self, index: u32) -> Result<Vec<u8>, StoreError>;

    fn append_mapping(&self, template_name: &str, index: u32) -> Result<(), StoreError>;
    fn read_mapping(&self) -> Result<Vec<MappingEntry>, StoreError>;

    /// The next unused index: one past the highest index in either stage.
    fn next_index(&self) -> Result<u32, StoreError> {
        let highest = self
            .list(Stage::InProgress)?
            .into_iter()
            .chain(self.list(Stage::Completed)?)
            .max()
            .unwrap_or(0);
        Ok(highest + 1)
    }
}

pub(crate) fn format_mapping_line(template_name: &str, index: u32) -> String {
    format!("{template_name} {index}\n")
}

pub(crate) fn parse_mapping(content: &str) -> Result<Vec<MappingEntry>, StoreError> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            let (name, index) = line
                .trim_end()
                .rsplit_once(' ')
                .ok_or_else(|| StoreError::Mapping(line.to_string()))?;
            let index = index
                .parse()
                .map_err(|_| StoreError::Mapping(line.to_string()))?;
            Ok(MappingEntry {
                template_name: name.to_string(),
                index,
            })
        })
        .collect()
}

// --- Filesystem store ---

/// A job store backed by the directories named in `StorePaths`.
#[derive(Debug, Clone)]
pub struct FsJobStore {
    paths: StorePaths,
}

impl FsJobStore {
    pub fn new(paths: StorePaths) -> Self {
        Self { paths }
    }

    fn stage_dir(&self, stage: Stage) -> &Path {
        match stage {
            Stage::InProgress => &self.paths.in_progress_dir,
            Stage::Completed => &self.paths.completed_dir,
        }
    }

    fn record_path(&self, stage: Stage, index: u32) -> PathBuf {
        self.stage_dir(stage).join(stage.file_name(index))
    }

    pub fn results_path(&self, index: u32) -> PathBuf {
        self.paths
            .results_dir
            .join(format!("{RESULTS_PREFIX}{index}.jsonl"))
    }

    pub fn request_path(&self, index: u32) -> PathBuf {
        self.paths
            .request_dir
            .join(format!("{REQUEST_PREFIX}{index}.jsonl"))
    }

    fn write_file(path: &Path, payload: &[u8]) -> Result<(), StoreError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        fs::write(path, payload).map_err(io_err(path))
    }
}

impl JobStore for FsJobStore {
    fn list(&self, stage: Stage) -> Result<Vec<u32>, StoreError> {
        let dir = self.stage_dir(stage);
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut indices = Vec::new();
        for entry in fs::read_dir(dir).map_err(io_err(dir))? {
            let entry = entry.map_err(io_err(dir))?;
            let name = entry.file_name();
            match stage.parse_file_name(&name.to_string_lossy()) {
                Some(index) => indices.push(index),
                None => debug!("Ignoring foreign file {:?} in {}", name, dir.display()),
            }
        }
        indices.sort_unstable();
        Ok(indices)
    }

    fn read(&self, stage: Stage, index: u32) -> Result<JobRecord, StoreError> {
        let path = self.record_path(stage, index);
        if !path.exists() {
            return Err(StoreError::NotFound { stage, index });
        }
        let content = fs::read_to_string(&path).map_err(io_err(&path))?;
        let mut record: JobRecord = serde_json::from_str(&content)?;
        if record.source_index == 0 {
            record.source_index = index;
        }
        Ok(record)
    }

    fn write(&self, stage: Stage, index: u32, record: &JobRecord) -> Result<(), StoreError> {
        let path = self.record_path(stage, index);
        let payload = serde_json::to_vec_pretty(record)?;
        Self::write_file(&path, &payload)
    }

    fn move_record(&self, index: u32, from: Stage, to: Stage) -> Result<(), StoreError> {
        let source = self.record_path(from, index);
        let target = self.record_path(to, index);
        if !source.exists() {
            return Err(StoreError::NotFound { stage: from, index });
        }
        if target.exists() {
            return Err(StoreError::AlreadyExists { stage: to, index });
        }
        let target_dir = self.stage_dir(to);
        fs::create_dir_all(target_dir).map_err(io_err(target_dir))?;
        fs::rename(&source, &target).map_err(io_err(&source))?;
        info!("Moved {} to {}", source.display(), target.display());
        Ok(())
    }

    fn write_request(&self, index: u32, payload: &[u8]) -> Result<(), StoreError> {
        Self::write_file(&self.request_path(index), payload)
    }

    fn write_results(&self, index: u32, payload: &[u8]) -> Result<(), StoreError> {
        let path = self.results_path(index);
        Self::write_file(&path, payload)?;
        info!("Batch results written to `{}`.", path.display());
        Ok(())
    }

    fn read_results(&self, index: u32) -> Result<Vec<u8>, StoreError> {
        let path = self.results_path(index);
        fs::read(&path).map_err(io_err(&path))
    }

    fn append_mapping(&self, template_name: &str, index: u32) -> Result<(), StoreError> {
        let path = &self.paths.mapping_log;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(io_err(path))?;
        file.write_all(format_mapping_line(template_name, index).as_bytes())
            .map_err(io_err(path))
    }

    fn read_mapping(&self) -> Result<Vec<MappingEntry>, StoreError> {
        let path = &self.paths.mapping_log;
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(path).map_err(io_err(path))?;
        parse_mapping(&content)
    }
}

// --- In-memory store ---

#[derive(Debug, Default)]
struct MemoryState {
    records: BTreeMap<(u8, u32), JobRecord>,
    requests: BTreeMap<u32, Vec<u8>>,
    results: BTreeMap<u32, Vec<u8>>,
    mapping: String,
}

fn stage_key(stage: Stage) -> u8 {
    match stage {
        Stage::InProgress => 0,
        Stage::Completed => 1,
    }
}

/// A job store held entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn request(&self, index: u32) -> Option<Vec<u8>> {
        self.lock().requests.get(&index).cloned()
    }
}

impl JobStore for MemoryJobStore {
    fn list(&self, stage: Stage) -> Result<Vec<u32>, StoreError> {
        let key = stage_key(stage);
        Ok(self
            .lock()
            .records
            .keys()
            .filter(|(s, _)| *s == key)
            .map(|(_, index)| *index)
            .collect())
    }

    fn read(&self, stage: Stage, index: u32) -> Result<JobRecord, StoreError> {
        self.lock()
            .records
            .get(&(stage_key(stage), index))
            .cloned()
            .ok_or(StoreError::NotFound { stage, index })
    }

    fn write(&self, stage: Stage, index: u32, record: &JobRecord) -> Result<(), StoreError> {
        self.lock()
            .records
            .insert((stage_key(stage), index), record.clone());
        Ok(())
    }

    fn move_record(&self, index: u32, from: Stage, to: Stage) -> Result<(), StoreError> {
        let mut state = self.lock();
        if state.records.contains_key(&(stage_key(to), index)) {
            return Err(StoreError::AlreadyExists { stage: to, index });
        }
        let record = state
            .records
            .remove(&(stage_key(from), index))
            .ok_or(StoreError::NotFound { stage: from, index })?;
        state.records.insert((stage_key(to), index), record);
        Ok(())
    }

    fn write_request(&self, index: u32, payload: &[u8]) -> Result<(), StoreError> {
        self.lock().requests.insert(index, payload.to_vec());
        Ok(())
    }

    fn write_results(&self, index: u32, payload: &[u8]) -> Result<(), StoreError> {
        self.lock().results.insert(index, payload.to_vec());
        Ok(())
    }

    fn read_results(&self, index: u32) -> Result<Vec<u8>, StoreError> {
        self.lock()
            .results
            .get(&index)
            .cloned()
            .ok_or(StoreError::NotFound {
                stage: Stage::Completed,
                index,
            })
    }

    fn append_mapping(&self, template_name: &str, index: u32) -> Result<(), StoreError> {
        self.lock()
            .mapping
            .push_str(&format_mapping_line(template_name, index));
        Ok(())
    }

    fn read_mapping(&self) -> Result<Vec<MappingEntry>, StoreError> {
        parse_mapping(&self.lock().mapping)
    }
}
