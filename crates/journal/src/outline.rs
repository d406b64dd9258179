//! Year / week / day outline vocabulary.
//!
//! Nodes are not materialised as a tree: a node *is* its heading line, and the
//! heading text is the key.  This module knows how to render and recognise
//! those lines; the upsert and query modules walk the raw line sequence.

use chrono::NaiveDate;

pub const PROPERTIES_OPEN: &str = ":PROPERTIES:";
pub const PROPERTIES_CLOSE: &str = ":END:";
pub const ID_PROPERTY: &str = ":ID:";

/// Heading depth of the three outline levels.
pub const YEAR_LEVEL: usize = 1;
pub const WEEK_LEVEL: usize = 2;
pub const DAY_LEVEL: usize = 3;

/// The three heading lines a date lives under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayKeys {
    pub date: NaiveDate,
    /// `* 2024`
    pub year: String,
    /// `** 2024-W11`
    pub week: String,
    /// `*** 2024-03-15 Friday`
    pub day: String,
}

impl DayKeys {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            date,
            year: format!("* {}", date.format("%Y")),
            // ISO week-numbering year, so 2024-12-30 is 2025-W01 rather than
            // colliding with the first week of 2024.
            week: format!("** {}", date.format("%G-W%V")),
            day: format!("*** {}", day_title(date)),
        }
    }
}

/// `2024-03-15 Friday`
pub fn day_title(date: NaiveDate) -> String {
    date.format("%Y-%m-%d %A").to_string()
}

/// A recognised org heading line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Heading<'a> {
    pub level: usize,
    pub text: &'a str,
}

/// Parse `*** text` into a heading.  Stars must start the line and be followed
/// by a space (or end the line), which keeps `*bold*` body text out.
pub fn parse_heading(line: &str) -> Option<Heading<'_>> {
    let level = line.chars().take_while(|ch| *ch == '*').count();
    if level == 0 {
        return None;
    }
    let rest = &line[level..];
    if !rest.is_empty() && !rest.starts_with(' ') {
        return None;
    }
    Some(Heading {
        level,
        text: rest.trim(),
    })
}

/// The date of a day heading (`*** 2024-03-15 Friday`), if the line is one.
/// The weekday suffix is not checked so hand-edited headings still count.
pub fn parse_day_heading(line: &str) -> Option<NaiveDate> {
    let heading = parse_heading(line.trim_end())?;
    if heading.level != DAY_LEVEL {
        return None;
    }
    let stamp = heading.text.split_whitespace().next()?;
    NaiveDate::parse_from_str(stamp, "%Y-%m-%d").ok()
}

/// Prefix body lines that org would read as structure (`* x`, `#+title:`)
/// with a comma, as org itself does.  Lines already carrying the escape get
/// one more comma so the escape stays reversible.
pub fn escape_body_line(line: &str) -> String {
    let unescaped = line.trim_start_matches(',');
    if parse_heading(unescaped).is_some() || unescaped.starts_with("#+") {
        format!(",{line}")
    } else {
        line.to_string()
    }
}

pub fn is_properties_open(line: &str) -> bool {
    line.trim() == PROPERTIES_OPEN
}

pub fn is_properties_close(line: &str) -> bool {
    line.trim() == PROPERTIES_CLOSE
}

/// The `:ID:` value of a property line.
pub fn parse_id_property(line: &str) -> Option<&str> {
    let value = line.trim().strip_prefix(ID_PROPERTY)?.trim();
    (!value.is_empty()).then_some(value)
}

/// Properties drawer carrying a freshly generated identifier.
pub fn properties_block(id: &str) -> [String; 3] {
    [
        PROPERTIES_OPEN.to_string(),
        format!("{ID_PROPERTY}       {id}"),
        PROPERTIES_CLOSE.to_string(),
    ]
}

/// A day node located in a document: its heading line through the line before
/// the next heading of day level or above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayNode {
    pub date: NaiveDate,
    pub id: Option<String>,
    /// Index of the `***` heading line.
    pub start: usize,
    /// Exclusive end index.
    pub end: usize,
}

impl DayNode {
    pub fn raw(&self, lines: &[String]) -> String {
        lines[self.start..self.end].join("\n")
    }
}

/// Materialise every recognisable day node, in document order.
pub fn day_nodes(lines: &[String]) -> Vec<DayNode> {
    let mut nodes = Vec::new();
    let mut current: Option<DayNode> = None;

    for (idx, line) in lines.iter().enumerate() {
        if let Some(heading) = parse_heading(line) {
            if heading.level <= DAY_LEVEL {
                if let Some(mut node) = current.take() {
                    node.end = idx;
                    nodes.push(node);
                }
                if let Some(date) = parse_day_heading(line) {
                    current = Some(DayNode {
                        date,
                        id: None,
                        start: idx,
                        end: lines.len(),
                    });
                }
                continue;
            }
        }
        if let Some(node) = current.as_mut() {
            if node.id.is_none() {
                node.id = parse_id_property(line).map(str::to_string);
            }
        }
    }

    if let Some(node) = current {
        nodes.push(node);
    }
    nodes
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn keys_follow_fixed_heading_format() {
        let keys = DayKeys::for_date(date(2024, 3, 15));
        assert_eq!(keys.year, "* 2024");
        assert_eq!(keys.week, "** 2024-W11");
        assert_eq!(keys.day, "*** 2024-03-15 Friday");
    }

    #[test]
    fn week_key_uses_iso_week_year_at_year_boundary() {
        let keys = DayKeys::for_date(date(2024, 12, 30));
        assert_eq!(keys.year, "* 2024");
        assert_eq!(keys.week, "** 2025-W01");

        let keys = DayKeys::for_date(date(2021, 1, 1));
        assert_eq!(keys.week, "** 2020-W53");
        assert_eq!(keys.day, "*** 2021-01-01 Friday");
    }

    #[test]
    fn structural_body_lines_are_comma_escaped() {
        assert_eq!(escape_body_line("* buy milk"), ",* buy milk");
        assert_eq!(escape_body_line("*** 2024-03-15 Friday"), ",*** 2024-03-15 Friday");
        assert_eq!(escape_body_line("#+title: fake"), ",#+title: fake");
        assert_eq!(escape_body_line(",* already"), ",,* already");
        assert_eq!(escape_body_line("*bold* text"), "*bold* text");
        assert_eq!(escape_body_line("  * indented bullet"), "  * indented bullet");
        assert_eq!(escape_body_line(", plain"), ", plain");
    }

    #[test]
    fn headings_need_a_space_after_stars() {
        assert_eq!(
            parse_heading("** 2024-W11"),
            Some(Heading {
                level: 2,
                text: "2024-W11"
            })
        );
        assert_eq!(parse_heading("*bold* text"), None);
        assert_eq!(parse_heading("plain"), None);
        assert_eq!(parse_heading("***").map(|h| h.level), Some(3));
    }

    #[test]
    fn day_heading_parsing() {
        assert_eq!(
            parse_day_heading("*** 2023-03-15 Wednesday"),
            Some(date(2023, 3, 15))
        );
        assert_eq!(parse_day_heading("*** 2023-03-15"), Some(date(2023, 3, 15)));
        assert_eq!(parse_day_heading("** 2023-03-15 Wednesday"), None);
        assert_eq!(parse_day_heading("*** groceries"), None);
    }

    #[test]
    fn id_property_parsing() {
        assert_eq!(parse_id_property(":ID:       abc-123"), Some("abc-123"));
        assert_eq!(parse_id_property(":ID:"), None);
        assert_eq!(parse_id_property(":CREATED: x"), None);
    }

    #[test]
    fn day_nodes_span_until_next_heading_of_day_level() {
        let doc: Vec<String> = [
            "* 2024",
            "** 2024-W11",
            "*** 2024-03-14 Thursday",
            ":PROPERTIES:",
            ":ID:       first",
            ":END:",
            "",
            "one",
            "**** nested note",
            "*** 2024-03-15 Friday",
            ":PROPERTIES:",
            ":ID:       second",
            ":END:",
            "** 2024-W12",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let nodes = day_nodes(&doc);
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].date, date(2024, 3, 14));
        assert_eq!(nodes[0].id.as_deref(), Some("first"));
        assert_eq!((nodes[0].start, nodes[0].end), (2, 9));
        assert!(nodes[0].raw(&doc).ends_with("**** nested note"));
        assert_eq!(nodes[1].id.as_deref(), Some("second"));
        assert_eq!((nodes[1].start, nodes[1].end), (9, 13));
    }
}
