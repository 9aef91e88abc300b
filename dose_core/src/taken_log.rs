//! Append-only taken log.
//!
//! Taken records are appended to a JSONL (JSON Lines) file. Every write
//! holds an exclusive lock across read-check-append, which is what makes
//! `mark_taken` unique on `(schedule_id, scheduled_for)` across processes.

use crate::dose_id::taken_key;
use crate::repository::{collect_taken_map, TakenEventStore, TakenMap};
use crate::{Error, NewTakenRecord, Result, TakenRecord};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// JSONL-backed taken store with file locking
pub struct JsonlTakenStore {
    path: PathBuf,
}

impl JsonlTakenStore {
    /// Create a store for the given path; the file is created on first write
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Ensure the parent directory exists
    fn ensure_parent_dir(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Open the log and take its exclusive lock.
    ///
    /// `compact` replaces the file by rename, so a handle that waited on the
    /// lock may point at the old inode. Retry until the locked file is the one
    /// at `path`.
    fn open_locked(&self, create: bool) -> Result<File> {
        loop {
            let file = OpenOptions::new()
                .create(create)
                .read(true)
                .append(true)
                .open(&self.path)?;
            file.lock_exclusive()?;

            if is_current(&file, &self.path)? {
                return Ok(file);
            }
            tracing::debug!("Taken log {:?} was replaced while waiting, reopening", self.path);
        }
    }

    /// Rewrite the log keeping only the first record per dose and dropping
    /// unreadable lines. Returns the number of records kept.
    ///
    /// Atomically replaces the log by:
    /// 1. Writing to a temp file in the same directory
    /// 2. Syncing to disk
    /// 3. Renaming over the original
    ///
    /// Writers waiting on the lock notice the replacement and reopen the new
    /// file before appending.
    pub fn compact(&self) -> Result<usize> {
        if !self.path.exists() {
            return Ok(0);
        }

        let file = self.open_locked(false)?;

        let records = read_records_from(&file)?;
        let mut seen = HashSet::new();
        let kept: Vec<&TakenRecord> = records
            .iter()
            .filter(|r| seen.insert(taken_key(&r.schedule_id, r.scheduled_for)))
            .collect();

        let parent = self.path.parent().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::Other, "taken log path missing parent")
        })?;
        let temp = NamedTempFile::new_in(parent)?;
        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            for record in &kept {
                serde_json::to_writer(&mut writer, record)?;
                writer.write_all(b"\n")?;
            }
            writer.flush()?;
        }
        temp.as_file().sync_all()?;

        temp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        // Lock on the replaced inode is released when `file` drops
        drop(file);

        tracing::info!(
            "Compacted taken log {:?}: kept {} of {} records",
            self.path,
            kept.len(),
            records.len()
        );
        Ok(kept.len())
    }
}

impl TakenEventStore for JsonlTakenStore {
    fn mark_taken(&self, _user_id: &str, record: NewTakenRecord) -> Result<TakenRecord> {
        self.ensure_parent_dir()?;

        // Exclusive for the whole check-then-append
        let mut file = self.open_locked(true)?;

        let key = taken_key(&record.schedule_id, record.scheduled_for);
        let existing = read_records_from(&file)?
            .into_iter()
            .find(|r| taken_key(&r.schedule_id, r.scheduled_for) == key);

        if let Some(existing) = existing {
            file.unlock()?;
            tracing::debug!("Dose {} already taken, returning existing record", key);
            return Ok(existing);
        }

        let stored = record.into_record();
        let mut line = serde_json::to_string(&stored)?;
        line.push('\n');
        if !ends_with_newline(&file)? {
            // Torn tail from an interrupted write; keep it on its own line
            tracing::warn!("Taken log {:?} ends mid-line, terminating it", self.path);
            line.insert(0, '\n');
        }
        file.seek(SeekFrom::End(0))?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        file.sync_data()?;

        file.unlock()?;

        tracing::debug!("Appended taken record {} for dose {}", stored.id, key);
        Ok(stored)
    }

    fn get_taken_map(
        &self,
        _user_id: &str,
        schedule_ids: &[String],
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<TakenMap> {
        let records = read_records(&self.path)?;
        Ok(collect_taken_map(&records, schedule_ids, from, to))
    }
}

/// Read all taken records from a log file
pub fn read_records(path: &Path) -> Result<Vec<TakenRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }

    let file = File::open(path)?;
    // Acquire shared lock for reading
    file.lock_shared()?;
    let records = read_records_from(&file);
    file.unlock()?;

    records
}

#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let open = file.metadata()?;
    match std::fs::metadata(path) {
        Ok(current) => Ok(open.dev() == current.dev() && open.ino() == current.ino()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

// Renaming over an open file fails outside unix, so the handle is always current
#[cfg(not(unix))]
fn is_current(_file: &File, _path: &Path) -> Result<bool> {
    Ok(true)
}

fn ends_with_newline(file: &File) -> Result<bool> {
    let len = file.metadata()?.len();
    if len == 0 {
        return Ok(true);
    }

    let mut handle = file;
    handle.seek(SeekFrom::Start(len - 1))?;
    let mut last = [0u8; 1];
    handle.read_exact(&mut last)?;
    Ok(last[0] == b'\n')
}

/// Parse records from an already-locked file, from the start
fn read_records_from(file: &File) -> Result<Vec<TakenRecord>> {
    let mut handle = file;
    handle.seek(SeekFrom::Start(0))?;

    let reader = BufReader::new(handle);
    let mut records = Vec::new();

    for (line_num, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<TakenRecord>(&line) {
            Ok(record) => records.push(record),
            Err(e) => {
                tracing::warn!("Failed to parse taken record at line {}: {}", line_num + 1, e);
                // Continue reading, don't fail completely
            }
        }
    }

    tracing::debug!("Read {} taken records", records.len());
    Ok(records)
}
