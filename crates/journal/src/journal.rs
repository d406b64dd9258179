use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::daily::{DailyJournal, append_to_day_file};
use crate::error::Result;
use crate::query::{self, DayRef};
use crate::store::{DocumentStore, splice_lines, split_lines};
use crate::upsert::{Created, upsert};

#[derive(Debug, Clone)]
enum Layout {
    Document(DocumentStore),
    Daily(DailyJournal),
}

/// The journal as seen by callers, independent of the on-disk layout.
#[derive(Debug, Clone)]
pub struct Journal {
    layout: Layout,
}

/// What an append touched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendReceipt {
    pub date: NaiveDate,
    /// File that was written.
    pub path: PathBuf,
    pub created: Created,
}

impl Journal {
    /// Single outline document at `path`.
    pub fn document(path: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::Document(DocumentStore::new(path)),
        }
    }

    /// One file per day under `dir`.
    pub fn daily(dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: Layout::Daily(DailyJournal::new(dir)),
        }
    }

    pub fn is_document(&self) -> bool {
        matches!(self.layout, Layout::Document(_))
    }

    /// The document file, or the directory of day files.
    pub fn root(&self) -> &Path {
        match &self.layout {
            Layout::Document(store) => store.path(),
            Layout::Daily(daily) => daily.dir(),
        }
    }

    pub fn append(&self, date: NaiveDate, message: &str) -> Result<AppendReceipt> {
        self.append_with_id(date, message, crate::new_day_id)
    }

    pub fn append_with_id(
        &self,
        date: NaiveDate,
        message: &str,
        new_id: impl FnOnce() -> String,
    ) -> Result<AppendReceipt> {
        let store = match &self.layout {
            Layout::Document(store) => store.clone(),
            Layout::Daily(daily) => daily.store_for(date),
        };

        let _lock = store.lock()?;
        let original = store.load_text()?;
        let lines = split_lines(&original);
        let outcome = match &self.layout {
            Layout::Document(_) => upsert(&lines, date, message, new_id)?,
            Layout::Daily(_) => append_to_day_file(&lines, date, message, new_id)?,
        };
        // Only the new block is rendered; existing bytes, line endings and a
        // missing final newline stay as they were.
        let block = &outcome.lines[outcome.inserted.clone()];
        store.save_text(&splice_lines(&original, outcome.inserted.start, block))?;

        tracing::info!(
            date = %date,
            created = ?outcome.created,
            inserted_lines = outcome.inserted.len(),
            path = %store.path().display(),
            "journal entry appended"
        );

        Ok(AppendReceipt {
            date,
            path: store.path().to_path_buf(),
            created: outcome.created,
        })
    }

    pub fn day_exists(&self, date: NaiveDate) -> Result<bool> {
        match &self.layout {
            Layout::Document(store) => Ok(query::day_node_exists(&store.load()?, date)),
            Layout::Daily(daily) => Ok(daily.exists(date)),
        }
    }

    pub fn anniversaries(&self, date: NaiveDate, exclude_year: Option<i32>) -> Result<Vec<DayRef>> {
        match &self.layout {
            Layout::Document(store) => Ok(query::anniversary_matches(
                &store.load()?,
                date,
                exclude_year,
            )),
            Layout::Daily(daily) => daily.anniversaries(date, exclude_year),
        }
    }

    /// Raw text of the entry for `date`.
    pub fn read_day(&self, date: NaiveDate) -> Result<Option<String>> {
        match &self.layout {
            Layout::Document(store) => {
                let lines = store.load()?;
                Ok(query::find_day(&lines, date).map(|node| node.raw(&lines)))
            }
            Layout::Daily(daily) => {
                let store = daily.store_for(date);
                if !store.exists() {
                    return Ok(None);
                }
                Ok(Some(store.load()?.join("\n")))
            }
        }
    }

    /// Raw text of the most recent entry.
    pub fn read_newest(&self) -> Result<Option<(NaiveDate, String)>> {
        match &self.layout {
            Layout::Document(store) => {
                let lines = store.load()?;
                Ok(query::newest_day(&lines).map(|node| (node.date, node.raw(&lines))))
            }
            Layout::Daily(daily) => {
                let Some(date) = daily.newest()? else {
                    return Ok(None);
                };
                Ok(self.read_day(date)?.map(|raw| (date, raw)))
            }
        }
    }

    /// The whole outline document; `None` when it does not exist yet or the
    /// layout has no single document.
    pub fn read_document(&self) -> Result<Option<String>> {
        match &self.layout {
            Layout::Document(store) if store.exists() => Ok(Some(store.load()?.join("\n"))),
            _ => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use tempfile::TempDir;

    use super::Journal;
    use crate::upsert::Created;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn document_layout_end_to_end() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("Journal/journal.org");
        let journal = Journal::document(&path);

        assert!(!journal.day_exists(date(2024, 3, 15)).unwrap());
        assert_eq!(journal.read_document().unwrap(), None);

        let receipt = journal.append(date(2024, 3, 15), "hello").unwrap();
        assert_eq!(receipt.created, Created::Year);
        assert_eq!(receipt.path, path);
        let receipt = journal.append(date(2024, 3, 15), "world").unwrap();
        assert_eq!(receipt.created, Created::Nothing);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.starts_with("* 2024\n\n** 2024-W11\n\n*** 2024-03-15 Friday\n:PROPERTIES:\n:ID:       "));
        assert!(raw.ends_with(":END:\n\nhello\n\nworld\n"));

        assert!(journal.day_exists(date(2024, 3, 15)).unwrap());
        let day = journal.read_day(date(2024, 3, 15)).unwrap().unwrap();
        assert!(day.starts_with("*** 2024-03-15 Friday"));
        let (newest, _) = journal.read_newest().unwrap().unwrap();
        assert_eq!(newest, date(2024, 3, 15));
        assert!(journal.read_day(date(2024, 3, 14)).unwrap().is_none());
    }

    #[test]
    fn append_keeps_crlf_document_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("journal.org");
        let original = "#+title: Journal\r\n* 2024\r\n** 2024-W11\r\n*** 2024-03-15 Friday\r\n:PROPERTIES:\r\n:ID:       kept\r\n:END:\r\n\r\nhello";
        std::fs::write(&path, original).unwrap();

        let journal = Journal::document(&path);
        let receipt = journal.append(date(2024, 3, 15), "world").unwrap();
        assert_eq!(receipt.created, Created::Nothing);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(&raw[..original.len()], original);
        assert_eq!(raw, format!("{original}\r\n\r\nworld"));
    }

    #[test]
    fn generated_ids_are_unique_per_day() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::document(dir.path().join("journal.org"));
        journal.append(date(2024, 3, 14), "a").unwrap();
        journal.append(date(2024, 3, 15), "b").unwrap();

        let raw = std::fs::read_to_string(journal.root()).unwrap();
        let ids: Vec<&str> = raw
            .lines()
            .filter_map(|line| line.strip_prefix(":ID:"))
            .map(str::trim)
            .collect();
        assert_eq!(ids.len(), 2);
        assert!(ids.iter().all(|id| !id.is_empty()));
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn daily_layout_end_to_end() {
        let dir = TempDir::new().unwrap();
        let journal = Journal::daily(dir.path());

        journal.append(date(2023, 3, 15), "last year").unwrap();
        let receipt = journal.append(date(2024, 3, 15), "today").unwrap();
        assert_eq!(receipt.path, dir.path().join("2024-03-15.org"));
        assert_eq!(receipt.created, Created::Day);

        assert!(journal.day_exists(date(2024, 3, 15)).unwrap());
        assert!(!journal.day_exists(date(2024, 3, 16)).unwrap());

        let found = journal.anniversaries(date(2024, 3, 15), Some(2024)).unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].date, date(2023, 3, 15));
        assert!(found[0].id.is_some());

        let day = journal.read_day(date(2023, 3, 15)).unwrap().unwrap();
        assert!(day.contains("#+title: 2023-03-15 Wednesday"));
        assert!(day.ends_with("last year"));
        assert_eq!(journal.read_newest().unwrap().unwrap().0, date(2024, 3, 15));
        assert_eq!(journal.read_document().unwrap(), None);
    }
}
