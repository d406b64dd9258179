//! Locate-or-create the year → week → day path and append a message.
//!
//! One forward scan drives an explicit [`ScanState`] machine.  Every existing
//! line is kept verbatim; the only change to the document is a single
//! contiguous insertion, reported as [`UpsertOutcome::inserted`].

use std::ops::Range;

use chrono::NaiveDate;

use crate::error::{JournalError, Result};
use crate::outline::{
    DAY_LEVEL, DayKeys, WEEK_LEVEL, YEAR_LEVEL, escape_body_line, is_properties_close,
    is_properties_open, parse_heading, properties_block,
};

/// Highest outline level the upsert had to create.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Created {
    /// The day node existed; only the message was appended.
    Nothing,
    Day,
    Week,
    Year,
}

#[derive(Debug, Clone)]
pub struct UpsertOutcome {
    pub lines: Vec<String>,
    pub created: Created,
    /// Indices of the inserted lines within `lines`.
    pub inserted: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanState {
    SeekingYear,
    SeekingWeek,
    SeekingDay,
    /// Matched the day heading, waiting for its `:PROPERTIES:` line.
    AwaitingProperties,
    InProperties,
    /// Past `:END:`; the day's body runs until the next heading at day level
    /// or above.
    InBody,
}

impl ScanState {
    /// What still has to be created when the scan stops in this state.
    fn missing(self) -> Created {
        match self {
            ScanState::SeekingYear => Created::Year,
            ScanState::SeekingWeek => Created::Week,
            ScanState::SeekingDay
            | ScanState::AwaitingProperties
            | ScanState::InProperties => Created::Day,
            ScanState::InBody => Created::Nothing,
        }
    }
}

/// Where the new block goes.
#[derive(Debug, Clone, Copy)]
struct InsertionPoint {
    at: usize,
    missing: Created,
    /// A heading follows directly at `at`; keep a blank line in front of it.
    pad_after: bool,
}

/// Append `message` to the day node for `date`, creating whatever part of the
/// year / week / day path is missing.  `new_id` is called only when a day node
/// is created.
pub fn upsert(
    lines: &[String],
    date: NaiveDate,
    message: &str,
    new_id: impl FnOnce() -> String,
) -> Result<UpsertOutcome> {
    let body = message_lines(message)?;
    let keys = DayKeys::for_date(date);
    let point = locate(lines, &keys);

    let mut block = Vec::new();
    let mut prev_blank = match point.at.checked_sub(1) {
        Some(prev) => lines[prev].trim().is_empty(),
        // Nothing precedes the insertion; no leading blank line.
        None => true,
    };
    let mut push_segment = |segment: Vec<String>, block: &mut Vec<String>| {
        if !prev_blank {
            block.push(String::new());
        }
        block.extend(segment);
        prev_blank = false;
    };

    if point.missing >= Created::Year {
        push_segment(vec![keys.year.clone()], &mut block);
    }
    if point.missing >= Created::Week {
        push_segment(vec![keys.week.clone()], &mut block);
    }
    if point.missing >= Created::Day {
        let mut segment = vec![keys.day.clone()];
        segment.extend(properties_block(&new_id()));
        push_segment(segment, &mut block);
    }
    push_segment(body, &mut block);
    if point.pad_after {
        block.push(String::new());
    }

    let inserted = point.at..point.at + block.len();
    let mut out = Vec::with_capacity(lines.len() + block.len());
    out.extend_from_slice(&lines[..point.at]);
    out.extend(block);
    out.extend_from_slice(&lines[point.at..]);

    tracing::debug!(
        date = %date,
        created = ?point.missing,
        at = point.at,
        "journal upsert planned"
    );

    Ok(UpsertOutcome {
        lines: out,
        created: point.missing,
        inserted,
    })
}

fn locate(lines: &[String], keys: &DayKeys) -> InsertionPoint {
    let mut state = ScanState::SeekingYear;
    let mut last_content: Option<usize> = None;
    let mut idx = 0;

    while idx < lines.len() {
        let line = lines[idx].trim_end();
        let level = parse_heading(line).map(|heading| heading.level);

        // A heading at or above the given level ends the scope being searched.
        let closes = |scope: usize| level.is_some_and(|level| level <= scope);

        match state {
            ScanState::SeekingYear => {
                if line == keys.year {
                    state = ScanState::SeekingWeek;
                }
            }
            ScanState::SeekingWeek => {
                if line == keys.week {
                    state = ScanState::SeekingDay;
                } else if closes(YEAR_LEVEL) {
                    return close_scope(lines, state, last_content, idx);
                }
            }
            ScanState::SeekingDay => {
                if line == keys.day {
                    state = ScanState::AwaitingProperties;
                } else if closes(WEEK_LEVEL) {
                    return close_scope(lines, state, last_content, idx);
                }
            }
            ScanState::AwaitingProperties | ScanState::InProperties if level.is_some() => {
                // Malformed day node: no drawer, or a drawer that never closes.
                // It is left alone and the line is looked at again as if the
                // day had not been found.
                tracing::warn!(
                    line = idx + 1,
                    day = %keys.day,
                    "day node without a complete properties block; it will not be reused"
                );
                state = ScanState::SeekingDay;
                continue;
            }
            ScanState::AwaitingProperties => {
                if is_properties_open(line) {
                    state = ScanState::InProperties;
                }
            }
            ScanState::InProperties => {
                if is_properties_close(line) {
                    state = ScanState::InBody;
                }
            }
            ScanState::InBody => {
                if closes(DAY_LEVEL) {
                    return close_scope(lines, state, last_content, idx);
                }
            }
        }

        if !line.trim().is_empty() {
            last_content = Some(idx);
        }
        idx += 1;
    }

    InsertionPoint {
        at: lines.len(),
        missing: state.missing(),
        pad_after: false,
    }
}

/// The scope being searched ended at `heading_idx`: insert right after its
/// last non-blank line, leaving any blank lines before the next heading alone.
fn close_scope(
    lines: &[String],
    state: ScanState,
    last_content: Option<usize>,
    heading_idx: usize,
) -> InsertionPoint {
    let at = last_content.map_or(0, |idx| idx + 1);
    debug_assert!(at <= heading_idx);
    InsertionPoint {
        at,
        missing: state.missing(),
        pad_after: !lines[at].trim().is_empty(),
    }
}

/// Body lines for `message`: edges trimmed, structural lines escaped so the
/// message can never open a new heading.
pub(crate) fn message_lines(message: &str) -> Result<Vec<String>> {
    let mut body: Vec<String> = message
        .lines()
        .map(|line| line.trim_end().to_string())
        .skip_while(|line| line.is_empty())
        .collect();
    while body.last().is_some_and(|line| line.is_empty()) {
        body.pop();
    }
    if body.is_empty() {
        return Err(JournalError::EmptyMessage);
    }
    Ok(body.iter().map(|line| escape_body_line(line)).collect())
}
