/*!
 * Backing Store
 *
 * Swap target for evicted processes: an in-memory descriptor map backed by an
 * append-only text log, one record per line:
 *
 * ```text
 * <pid> <name> <total_instructions> <memory_size>
 * ```
 *
 * Loading falls back to the log when the map misses and takes the *first*
 * record for the pid. The log is never compacted.
 */

use crate::core::errors::{BackingStoreError, StoreResult};
use crate::core::types::{Pid, Size};
use crate::process::{Process, ProcessDescriptor};
use ahash::RandomState;
use dashmap::DashMap;
use log::{debug, info, warn};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Page size given to descriptors rebuilt from the log, which does not record it
const LOG_PAGE_SIZE: Size = 1;

struct LogFile {
    path: PathBuf,
    file: File,
}

/// Descriptor store for evicted processes
pub struct BackingStore {
    entries: DashMap<Pid, ProcessDescriptor, RandomState>,
    log: Option<Mutex<LogFile>>,
}

impl BackingStore {
    /// Open (or create) a log-backed store. Existing records are kept.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&path)?;
        info!("Backing store opened at {}", path.display());
        Ok(Self {
            entries: DashMap::with_hasher(RandomState::new()),
            log: Some(Mutex::new(LogFile { path, file })),
        })
    }

    /// Store without a persisted log
    pub fn in_memory() -> Self {
        Self {
            entries: DashMap::with_hasher(RandomState::new()),
            log: None,
        }
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.log.as_ref().map(|log| log.lock().path.clone())
    }

    /// Upsert the descriptor and append a record to the log
    pub fn store(&self, descriptor: &ProcessDescriptor) -> StoreResult<()> {
        self.entries.insert(descriptor.pid, descriptor.clone());

        if let Some(log) = &self.log {
            let mut log = log.lock();
            writeln!(log.file, "{}", format_record(descriptor))?;
            log.file.flush()?;
        }

        debug!(
            "Stored PID {} ({} bytes) in backing store",
            descriptor.pid, descriptor.memory_size
        );
        Ok(())
    }

    /// Rebuild a process from the store.
    /// Current instruction is reset to the resumed marker.
    pub fn load(&self, pid: Pid) -> StoreResult<Process> {
        if let Some(entry) = self.entries.get(&pid) {
            return Ok(Process::from_descriptor(entry.value()));
        }

        let descriptor = self
            .scan_log(pid)?
            .ok_or(BackingStoreError::NotFound(pid))?;
        self.entries.insert(pid, descriptor.clone());
        Ok(Process::from_descriptor(&descriptor))
    }

    /// Drop the in-memory entry. The log keeps its records.
    pub fn remove(&self, pid: Pid) -> Option<ProcessDescriptor> {
        self.entries.remove(&pid).map(|(_, descriptor)| descriptor)
    }

    pub fn contains(&self, pid: Pid) -> bool {
        self.entries.contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// In-memory descriptors ordered by pid
    pub fn contents(&self) -> Vec<ProcessDescriptor> {
        let mut contents: Vec<ProcessDescriptor> = self
            .entries
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        contents.sort_by_key(|d| d.pid);
        contents
    }

    fn scan_log(&self, pid: Pid) -> StoreResult<Option<ProcessDescriptor>> {
        let Some(log) = &self.log else {
            return Ok(None);
        };
        let mut log = log.lock();
        log.file.seek(SeekFrom::Start(0))?;

        for (number, line) in BufReader::new(&log.file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match parse_record(&line) {
                Some(descriptor) if descriptor.pid == pid => return Ok(Some(descriptor)),
                Some(_) => {}
                None => warn!("Skipping malformed backing store line {}: {:?}", number + 1, line),
            }
        }
        Ok(None)
    }
}

impl std::fmt::Debug for BackingStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackingStore")
            .field("entries", &self.entries.len())
            .field("path", &self.path())
            .finish()
    }
}

fn format_record(descriptor: &ProcessDescriptor) -> String {
    let name: String = if descriptor.name.is_empty() {
        "_".to_string()
    } else {
        descriptor
            .name
            .chars()
            .map(|c| if c.is_whitespace() { '_' } else { c })
            .collect()
    };
    format!(
        "{} {} {} {}",
        descriptor.pid, name, descriptor.total_instructions, descriptor.memory_size
    )
}

fn parse_record(line: &str) -> Option<ProcessDescriptor> {
    let mut fields = line.split_whitespace();
    let pid = fields.next()?.parse().ok()?;
    let name = fields.next()?.to_string();
    let total_instructions = fields.next()?.parse().ok()?;
    let memory_size = fields.next()?.parse().ok()?;
    if fields.next().is_some() {
        return None;
    }
    Some(ProcessDescriptor {
        pid,
        name,
        total_instructions,
        memory_size,
        page_size: LOG_PAGE_SIZE,
    })
}
