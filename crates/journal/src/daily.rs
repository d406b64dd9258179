//! One org file per day: `<dir>/YYYY-MM-DD.org`.
//!
//! A new file starts with a properties drawer and a `#+title:` line; messages
//! are appended below, blank-line separated.  There is no outline to walk, so
//! the upsert degenerates to create-or-append.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;

use crate::error::{JournalError, Result};
use crate::outline::{day_title, parse_id_property, properties_block};
use crate::query::{DayRef, collect_anniversaries};
use crate::store::DocumentStore;
use crate::upsert::{Created, UpsertOutcome, message_lines};

const EXTENSION: &str = "org";

#[derive(Debug, Clone)]
pub struct DailyJournal {
    dir: PathBuf,
}

impl DailyJournal {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{}.{EXTENSION}", date.format("%Y-%m-%d")))
    }

    pub fn store_for(&self, date: NaiveDate) -> DocumentStore {
        DocumentStore::new(self.path_for(date))
    }

    pub fn exists(&self, date: NaiveDate) -> bool {
        self.path_for(date).is_file()
    }

    /// Dates that have a day file, oldest first.
    pub fn dates(&self) -> Result<Vec<NaiveDate>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(JournalError::io(&self.dir, err)),
        };

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| JournalError::io(&self.dir, err))?;
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some(EXTENSION) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if let Ok(date) = NaiveDate::parse_from_str(stem, "%Y-%m-%d") {
                dates.push(date);
            }
        }
        dates.sort();
        Ok(dates)
    }

    pub fn newest(&self) -> Result<Option<NaiveDate>> {
        Ok(self.dates()?.pop())
    }

    /// Day files sharing `date`'s month and day.  The id comes from the file's
    /// properties drawer when it has one.
    pub fn anniversaries(&self, date: NaiveDate, exclude_year: Option<i32>) -> Result<Vec<DayRef>> {
        let mut candidates = Vec::new();
        for day in self.dates()? {
            let lines = self.store_for(day).load()?;
            let id = lines
                .iter()
                .find_map(|line| parse_id_property(line))
                .map(str::to_string);
            candidates.push(DayRef { date: day, id });
        }
        Ok(collect_anniversaries(candidates, date, exclude_year))
    }
}

/// Create-or-append for a single day file's lines.
pub fn append_to_day_file(
    lines: &[String],
    date: NaiveDate,
    message: &str,
    new_id: impl FnOnce() -> String,
) -> Result<UpsertOutcome> {
    let body = message_lines(message)?;
    let at = lines.len();
    let mut block = Vec::new();
    let created = if lines.is_empty() {
        block.extend(properties_block(&new_id()));
        block.push(format!("#+title: {}", day_title(date)));
        Created::Day
    } else {
        Created::Nothing
    };

    let prev_blank = block
        .last()
        .or(lines.last())
        .is_some_and(|line| line.trim().is_empty());
    if !prev_blank {
        block.push(String::new());
    }
    block.extend(body);

    let mut out = lines.to_vec();
    out.extend(block);
    Ok(UpsertOutcome {
        inserted: at..out.len(),
        lines: out,
        created,
    })
}
