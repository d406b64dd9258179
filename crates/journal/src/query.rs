//! Read-only lookups over a loaded document.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::outline::{DayNode, day_nodes, parse_day_heading};

/// A day entry found by a lookup: its date and, when recorded, its `:ID:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayRef {
    pub date: NaiveDate,
    pub id: Option<String>,
}

/// `true` when a day heading for `date` is present anywhere in the document.
/// Matches on the date alone, like [`find_day`], so a hand-edited heading with
/// a missing or different weekday still counts.
pub fn day_node_exists(lines: &[String], date: NaiveDate) -> bool {
    lines.iter().any(|line| parse_day_heading(line) == Some(date))
}

/// Day entries sharing `date`'s month and day, oldest first, one per date.
/// Entries from `exclude_year` are left out.
pub fn anniversary_matches(
    lines: &[String],
    date: NaiveDate,
    exclude_year: Option<i32>,
) -> Vec<DayRef> {
    collect_anniversaries(
        day_nodes(lines)
            .into_iter()
            .map(|node| DayRef {
                date: node.date,
                id: node.id,
            }),
        date,
        exclude_year,
    )
}

pub(crate) fn collect_anniversaries(
    candidates: impl IntoIterator<Item = DayRef>,
    date: NaiveDate,
    exclude_year: Option<i32>,
) -> Vec<DayRef> {
    let mut matches: BTreeMap<NaiveDate, Option<String>> = BTreeMap::new();
    for candidate in candidates {
        if candidate.date.month() != date.month() || candidate.date.day() != date.day() {
            continue;
        }
        if exclude_year == Some(candidate.date.year()) {
            continue;
        }
        let slot = matches.entry(candidate.date).or_default();
        if slot.is_none() {
            *slot = candidate.id;
        }
    }
    matches
        .into_iter()
        .map(|(date, id)| DayRef { date, id })
        .collect()
}

/// The first day node for `date`.
pub fn find_day(lines: &[String], date: NaiveDate) -> Option<DayNode> {
    day_nodes(lines).into_iter().find(|node| node.date == date)
}

/// The day node with the latest date; on ties the one further down the file.
pub fn newest_day(lines: &[String]) -> Option<DayNode> {
    day_nodes(lines)
        .into_iter()
        .max_by(|left, right| left.date.cmp(&right.date).then(left.start.cmp(&right.start)))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::upsert::upsert;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn journal(entries: &[(NaiveDate, &str, &'static str)]) -> Vec<String> {
        let mut lines = Vec::new();
        for (day, message, id) in entries {
            lines = upsert(&lines, *day, message, || id.to_string())
                .unwrap()
                .lines;
        }
        lines
    }

    #[test]
    fn exists_only_for_written_days() {
        let lines = journal(&[(date(2024, 3, 15), "hello", "a")]);
        assert!(day_node_exists(&lines, date(2024, 3, 15)));
        assert!(!day_node_exists(&lines, date(2024, 3, 16)));
        assert!(!day_node_exists(&[], date(2024, 3, 15)));
    }

    #[test]
    fn existence_agrees_with_lookup_for_hand_edited_headings() {
        let lines: Vec<String> = ["* 2024", "** 2024-W11", "*** 2024-03-15", "", "typed by hand"]
            .iter()
            .map(|line| line.to_string())
            .collect();
        assert!(day_node_exists(&lines, date(2024, 3, 15)));
        assert!(find_day(&lines, date(2024, 3, 15)).is_some());
        assert!(!day_node_exists(&lines, date(2023, 3, 15)));
    }

    #[test]
    fn anniversaries_across_years() {
        let lines = journal(&[
            (date(2022, 3, 15), "two years ago", "y2022"),
            (date(2023, 3, 15), "last year", "y2023"),
            (date(2023, 3, 16), "next day", "other"),
            (date(2024, 3, 15), "today", "y2024"),
        ]);

        let all = anniversary_matches(&lines, date(2024, 3, 15), None);
        assert_eq!(
            all.iter().map(|r| r.date).collect::<Vec<_>>(),
            vec![date(2022, 3, 15), date(2023, 3, 15), date(2024, 3, 15)]
        );
        assert_eq!(all[0].id.as_deref(), Some("y2022"));

        let past = anniversary_matches(&lines, date(2024, 3, 15), Some(2024));
        assert_eq!(
            past,
            vec![
                DayRef {
                    date: date(2022, 3, 15),
                    id: Some("y2022".to_string())
                },
                DayRef {
                    date: date(2023, 3, 15),
                    id: Some("y2023".to_string())
                },
            ]
        );
    }

    #[test]
    fn leap_day_matches_only_leap_years() {
        let lines = journal(&[
            (date(2020, 2, 29), "leap", "l"),
            (date(2021, 2, 28), "not leap", "n"),
        ]);
        let found = anniversary_matches(&lines, date(2024, 2, 29), Some(2024));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].date, date(2020, 2, 29));
    }

    #[test]
    fn find_and_newest_day() {
        let lines = journal(&[
            (date(2024, 3, 14), "thu", "a"),
            (date(2024, 3, 15), "fri", "b"),
        ]);
        let node = find_day(&lines, date(2024, 3, 14)).unwrap();
        assert_eq!(node.id.as_deref(), Some("a"));
        assert!(node.raw(&lines).contains("thu"));
        assert!(!node.raw(&lines).contains("fri"));

        let newest = newest_day(&lines).unwrap();
        assert_eq!(newest.date, date(2024, 3, 15));
        assert!(find_day(&lines, date(2024, 3, 16)).is_none());
        assert!(newest_day(&[]).is_none());
    }
}
