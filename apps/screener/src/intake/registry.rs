use std::fmt;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::intake::friendly_size;
use crate::models::score::Mode;

/// Identity of a staged file, derived from (name, size, last-modified) so that
/// selecting the same file twice is idempotent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileKey(String);

impl FileKey {
    pub fn derive(name: &str, size_bytes: u64, last_modified_ms: i64) -> Self {
        Self(format!("{name}_{size_bytes}_{last_modified_ms}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for FileKey {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

/// A raw file handed over by the selection source (picker, drop, multipart body).
#[derive(Debug, Clone)]
pub struct FileCandidate {
    pub name: String,
    pub size_bytes: u64,
    pub last_modified_ms: i64,
    pub payload: Bytes,
}

impl FileCandidate {
    pub fn new(name: impl Into<String>, payload: Bytes, last_modified_ms: i64) -> Self {
        Self {
            name: name.into(),
            size_bytes: payload.len() as u64,
            last_modified_ms,
            payload,
        }
    }

    /// A file whose content was not kept because it exceeds the size limit.
    pub fn oversized(name: impl Into<String>, size_bytes: u64, last_modified_ms: i64) -> Self {
        Self {
            name: name.into(),
            size_bytes,
            last_modified_ms,
            payload: Bytes::new(),
        }
    }

    pub fn key(&self) -> FileKey {
        FileKey::derive(&self.name, self.size_bytes, self.last_modified_ms)
    }
}

/// A staged file. The payload is a shared handle onto the caller's buffer,
/// never a copy of it.
#[derive(Debug, Clone, Serialize)]
pub struct IntakeFile {
    pub id: FileKey,
    pub name: String,
    #[serde(skip)]
    pub payload: Bytes,
    pub size_bytes: u64,
    pub validation_error: Option<String>,
    pub progress_percent: u8,
}

impl IntakeFile {
    pub fn is_valid(&self) -> bool {
        self.validation_error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("File not found: {0}")]
    UnknownFile(FileKey),

    #[error("Progress {0}% is outside 0-100")]
    ProgressOutOfRange(u8),

    #[error("Progress for {id} cannot move backwards ({current}% -> {requested}%)")]
    ProgressRegression {
        id: FileKey,
        current: u8,
        requested: u8,
    },
}

/// What an `add_files` call did to the registry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AddOutcome {
    pub added: Vec<FileKey>,
    pub duplicates: usize,
    pub oversized: usize,
    /// Single mode only: a previously staged file was dropped to make room.
    pub replaced: bool,
}

impl AddOutcome {
    /// True when the staged set itself changed.
    pub fn changed(&self) -> bool {
        !self.added.is_empty() || self.replaced
    }
}

/// Ordered, deduplicated set of staged files.
///
/// Never holds two entries with the same `FileKey`. In Single mode it holds
/// at most one entry.
#[derive(Debug, Clone)]
pub struct IntakeRegistry {
    files: Vec<IntakeFile>,
    max_file_size_bytes: u64,
    upload_cycle: u64,
}

impl IntakeRegistry {
    pub fn new(max_file_size_bytes: u64) -> Self {
        Self {
            files: Vec::new(),
            max_file_size_bytes,
            upload_cycle: 0,
        }
    }

    /// Stages candidates.
    ///
    /// Bulk appends every candidate whose key is not already present.
    /// Single keeps only the first candidate and replaces whatever was staged,
    /// unless it is the very same file. Oversized files are staged with a
    /// validation error so they stay visible and removable.
    pub fn add_files(&mut self, mode: Mode, candidates: Vec<FileCandidate>) -> AddOutcome {
        let mut outcome = AddOutcome::default();

        let candidates: Vec<FileCandidate> = match mode {
            Mode::Single => candidates.into_iter().take(1).collect(),
            Mode::Bulk => candidates,
        };

        if mode == Mode::Single {
            if let Some(first) = candidates.first() {
                if self.contains(&first.key()) {
                    outcome.duplicates += 1;
                    return outcome;
                }
                if !self.files.is_empty() {
                    self.clear_all();
                    outcome.replaced = true;
                }
            }
        }

        for candidate in candidates {
            let id = candidate.key();
            if self.contains(&id) {
                outcome.duplicates += 1;
                continue;
            }

            let validation_error = (candidate.size_bytes > self.max_file_size_bytes).then(|| {
                format!(
                    "File exceeds max size of {}",
                    friendly_size(self.max_file_size_bytes)
                )
            });
            // oversized files are never scored, so their content is not retained
            let payload = if validation_error.is_some() {
                outcome.oversized += 1;
                Bytes::new()
            } else {
                candidate.payload
            };

            debug!(
                "Staged {} ({})",
                candidate.name,
                friendly_size(candidate.size_bytes)
            );
            self.files.push(IntakeFile {
                id: id.clone(),
                name: candidate.name,
                payload,
                size_bytes: candidate.size_bytes,
                validation_error,
                progress_percent: 0,
            });
            outcome.added.push(id);
        }

        outcome
    }

    /// Removes a file. Returns false (not an error) when it was not staged.
    pub fn remove_file(&mut self, id: &FileKey) -> bool {
        let before = self.files.len();
        self.files.retain(|f| &f.id != id);
        self.files.len() != before
    }

    /// Empties the registry and returns how many files were dropped.
    pub fn clear_all(&mut self) -> usize {
        let removed = self.files.len();
        self.files.clear();
        // any in-flight upload cycle refers to files that no longer exist
        self.upload_cycle += 1;
        removed
    }

    /// Records upload progress. Within one upload cycle progress may only grow.
    pub fn set_progress(&mut self, id: &FileKey, percent: u8) -> Result<(), IntakeError> {
        if percent > 100 {
            return Err(IntakeError::ProgressOutOfRange(percent));
        }
        let file = self
            .files
            .iter_mut()
            .find(|f| &f.id == id)
            .ok_or_else(|| IntakeError::UnknownFile(id.clone()))?;

        if percent < file.progress_percent {
            return Err(IntakeError::ProgressRegression {
                id: id.clone(),
                current: file.progress_percent,
                requested: percent,
            });
        }
        file.progress_percent = percent;
        Ok(())
    }

    /// Starts a new upload cycle: every file goes back to 0% and the valid
    /// ones are returned in staging order.
    pub fn begin_upload_cycle(&mut self) -> (u64, Vec<FileKey>) {
        self.upload_cycle += 1;
        for file in &mut self.files {
            file.progress_percent = 0;
        }
        let targets = self
            .files
            .iter()
            .filter(|f| f.is_valid())
            .map(|f| f.id.clone())
            .collect();
        (self.upload_cycle, targets)
    }

    /// Progress write tied to an upload cycle. Returns `Ok(false)` when the
    /// cycle has been superseded and the write was ignored.
    pub fn advance_upload(
        &mut self,
        cycle: u64,
        id: &FileKey,
        percent: u8,
    ) -> Result<bool, IntakeError> {
        if cycle != self.upload_cycle {
            return Ok(false);
        }
        self.set_progress(id, percent)?;
        Ok(true)
    }

    pub fn contains(&self, id: &FileKey) -> bool {
        self.files.iter().any(|f| &f.id == id)
    }

    #[cfg(test)]
    pub fn get(&self, id: &FileKey) -> Option<&IntakeFile> {
        self.files.iter().find(|f| &f.id == id)
    }

    pub fn files(&self) -> &[IntakeFile] {
        &self.files
    }

    pub fn valid_files(&self) -> impl Iterator<Item = &IntakeFile> {
        self.files.iter().filter(|f| f.is_valid())
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Ordered keys of every staged file, used to detect set mutation.
    pub fn snapshot(&self) -> Vec<FileKey> {
        self.files.iter().map(|f| f.id.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(name: &str, size: usize, last_modified_ms: i64) -> FileCandidate {
        FileCandidate::new(name, Bytes::from(vec![0u8; size]), last_modified_ms)
    }

    #[test]
    fn test_add_same_file_twice_is_idempotent() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(Mode::Bulk, vec![candidate("a.pdf", 10, 1)]);
        let outcome = registry.add_files(Mode::Bulk, vec![candidate("a.pdf", 10, 1)]);

        assert_eq!(registry.len(), 1);
        assert_eq!(outcome.duplicates, 1);
        assert!(!outcome.changed());
    }

    #[test]
    fn test_bulk_dedups_within_one_batch_and_keeps_order() {
        let mut registry = IntakeRegistry::new(1024);
        let outcome = registry.add_files(
            Mode::Bulk,
            vec![
                candidate("a.pdf", 10, 1),
                candidate("b.pdf", 10, 1),
                candidate("a.pdf", 10, 1),
            ],
        );
        assert_eq!(outcome.added.len(), 2);
        assert_eq!(outcome.duplicates, 1);
        let names: Vec<_> = registry.files().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["a.pdf", "b.pdf"]);
    }

    #[test]
    fn test_same_name_different_timestamp_is_a_different_file() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(Mode::Bulk, vec![candidate("a.pdf", 10, 1)]);
        registry.add_files(Mode::Bulk, vec![candidate("a.pdf", 10, 2)]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_single_mode_replaces_previous_file() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(Mode::Single, vec![candidate("x.pdf", 10, 1)]);
        let outcome = registry.add_files(Mode::Single, vec![candidate("y.pdf", 20, 1)]);

        assert!(outcome.replaced);
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.files()[0].name, "y.pdf");
    }

    #[test]
    fn test_single_mode_keeps_only_first_candidate() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(
            Mode::Single,
            vec![candidate("x.pdf", 10, 1), candidate("y.pdf", 10, 1)],
        );
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.files()[0].name, "x.pdf");
    }

    #[test]
    fn test_single_mode_reselecting_same_file_is_not_a_change() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(Mode::Single, vec![candidate("x.pdf", 10, 1)]);
        let outcome = registry.add_files(Mode::Single, vec![candidate("x.pdf", 10, 1)]);
        assert!(!outcome.changed());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_single_mode_empty_candidates_leaves_set_untouched() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(Mode::Single, vec![candidate("x.pdf", 10, 1)]);
        let outcome = registry.add_files(Mode::Single, vec![]);
        assert!(!outcome.changed());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_oversized_file_stays_visible_with_error() {
        let mut registry = IntakeRegistry::new(16);
        let outcome = registry.add_files(Mode::Bulk, vec![candidate("big.pdf", 32, 1)]);

        assert_eq!(outcome.oversized, 1);
        assert_eq!(registry.len(), 1);
        let file = &registry.files()[0];
        assert!(!file.is_valid());
        assert!(file
            .validation_error
            .as_deref()
            .unwrap()
            .contains("exceeds max size"));
        assert_eq!(file.size_bytes, 32);
        assert!(file.payload.is_empty());
        assert_eq!(registry.valid_files().count(), 0);
    }

    #[test]
    fn test_oversized_candidate_keeps_declared_size() {
        let mut registry = IntakeRegistry::new(16);
        let outcome = registry.add_files(
            Mode::Bulk,
            vec![FileCandidate::oversized("huge.pdf", 4096, 1)],
        );

        assert_eq!(outcome.oversized, 1);
        let file = &registry.files()[0];
        assert_eq!(file.id, FileKey::derive("huge.pdf", 4096, 1));
        assert_eq!(file.size_bytes, 4096);
        assert!(!file.is_valid());
    }

    #[test]
    fn test_remove_absent_file_is_noop() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(Mode::Bulk, vec![candidate("a.pdf", 10, 1)]);
        assert!(!registry.remove_file(&FileKey::from("missing".to_string())));
        assert_eq!(registry.len(), 1);

        let id = registry.files()[0].id.clone();
        assert!(registry.remove_file(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(Mode::Bulk, vec![candidate("a.pdf", 10, 1)]);
        let id = registry.files()[0].id.clone();

        registry.set_progress(&id, 40).unwrap();
        registry.set_progress(&id, 40).unwrap();
        let err = registry.set_progress(&id, 30).unwrap_err();
        assert_eq!(
            err,
            IntakeError::ProgressRegression {
                id: id.clone(),
                current: 40,
                requested: 30
            }
        );
        assert_eq!(registry.get(&id).unwrap().progress_percent, 40);
    }

    #[test]
    fn test_progress_rejects_out_of_range_and_unknown() {
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(Mode::Bulk, vec![candidate("a.pdf", 10, 1)]);
        let id = registry.files()[0].id.clone();

        assert_eq!(
            registry.set_progress(&id, 101),
            Err(IntakeError::ProgressOutOfRange(101))
        );
        let missing = FileKey::from("nope".to_string());
        assert_eq!(
            registry.set_progress(&missing, 10),
            Err(IntakeError::UnknownFile(missing.clone()))
        );
    }

    #[test]
    fn test_new_upload_cycle_resets_progress_and_skips_invalid() {
        let mut registry = IntakeRegistry::new(16);
        registry.add_files(
            Mode::Bulk,
            vec![candidate("ok.pdf", 8, 1), candidate("big.pdf", 64, 1)],
        );
        let ok_id = registry.files()[0].id.clone();
        registry.set_progress(&ok_id, 100).unwrap();

        let (cycle, targets) = registry.begin_upload_cycle();
        assert_eq!(targets, vec![ok_id.clone()]);
        assert_eq!(registry.get(&ok_id).unwrap().progress_percent, 0);

        assert_eq!(registry.advance_upload(cycle, &ok_id, 10), Ok(true));
        let (_, _) = registry.begin_upload_cycle();
        // the old cycle can no longer write
        assert_eq!(registry.advance_upload(cycle, &ok_id, 90), Ok(false));
        assert_eq!(registry.get(&ok_id).unwrap().progress_percent, 0);
    }

    #[test]
    fn test_payload_is_shared_not_copied() {
        let payload = Bytes::from_static(b"resume body");
        let mut registry = IntakeRegistry::new(1024);
        registry.add_files(
            Mode::Bulk,
            vec![FileCandidate::new("a.pdf", payload.clone(), 1)],
        );
        assert_eq!(registry.files()[0].payload.as_ptr(), payload.as_ptr());
    }
}
