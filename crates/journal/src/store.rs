use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;

use crate::error::{JournalError, Result};

/// Line-oriented access to one journal file.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    path: PathBuf,
}

/// Exclusive advisory lock on a journal file, released on drop.
#[derive(Debug)]
pub struct StoreLock {
    file: File,
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}

impl DocumentStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the document as lines without terminators.  A missing file is an
    /// empty document.
    pub fn load(&self) -> Result<Vec<String>> {
        Ok(split_lines(&self.load_text()?))
    }

    /// The document exactly as stored.  A missing file is empty text.
    pub fn load_text(&self) -> Result<String> {
        if !self.path.exists() {
            return Ok(String::new());
        }
        fs::read_to_string(&self.path).map_err(|err| JournalError::io(&self.path, err))
    }

    /// Atomically replace the document with `text`.
    ///
    /// The content goes to a `.tmp` sibling first, is fsync'd, then renamed over
    /// the target, so readers only ever see the previous or the new document.
    /// The `.tmp` file is removed on any error path.
    pub fn save_text(&self, text: &str) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| JournalError::io(parent, err))?;
            }
        }

        let tmp_path = self.sibling("tmp");
        let write_result = (|| -> std::io::Result<()> {
            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .truncate(true)
                .open(&tmp_path)?;
            file.write_all(text.as_bytes())?;
            file.flush()?;
            file.sync_all()
        })();

        if let Err(err) = write_result {
            let _ = fs::remove_file(&tmp_path);
            return Err(JournalError::io(&tmp_path, err));
        }

        if let Err(err) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(JournalError::io(&self.path, err));
        }

        Ok(())
    }

    /// Take an exclusive lock on a `.lock` sibling for the duration of a
    /// load-mutate-save.  Blocks while another process holds it.
    pub fn lock(&self) -> Result<StoreLock> {
        let lock_path = self.sibling("lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| JournalError::io(parent, err))?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|err| JournalError::Lock {
                path: lock_path.clone(),
                source: err,
            })?;
        file.lock_exclusive().map_err(|err| JournalError::Lock {
            path: lock_path,
            source: err,
        })?;
        Ok(StoreLock { file })
    }

    fn sibling(&self, suffix: &str) -> PathBuf {
        let filename = self
            .path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_else(|| "journal.org".to_string());
        self.path.with_file_name(format!("{filename}.{suffix}"))
    }
}

pub fn split_lines(text: &str) -> Vec<String> {
    text.lines().map(str::to_string).collect()
}

/// Insert `block` in front of line `at` of `original`, leaving every existing
/// byte as it was.  The block uses the document's own line ending (`\r\n` when
/// the document has any), and a document without a final newline still ends
/// without one.
pub fn splice_lines(original: &str, at: usize, block: &[String]) -> String {
    let eol = if original.contains("\r\n") { "\r\n" } else { "\n" };
    let offset = match at.checked_sub(1) {
        None => 0,
        Some(prev) => original
            .match_indices('\n')
            .nth(prev)
            .map_or(original.len(), |(idx, _)| idx + 1),
    };
    let (head, tail) = original.split_at(offset);

    let mut out = String::with_capacity(original.len() + block.len() * 16);
    out.push_str(head);
    if !head.is_empty() && !head.ends_with('\n') {
        out.push_str(eol);
    }
    out.push_str(&block.join(eol));
    if !tail.is_empty() || original.is_empty() || original.ends_with('\n') {
        out.push_str(eol);
    }
    out.push_str(tail);
    out
}
