//! Fixed-width text tables.
//!
//! Every cell is exactly its column's width: longer text keeps its *last*
//! `width` characters (so `file.lua:123` keeps its line number), shorter
//! text is padded on the right. Rows therefore line up and can be parsed
//! by column offsets.

use crate::results::ResultRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Rank,
    Function,
    Calls,
    Time,
    AvgTime,
    Memory,
    AvgMem,
    Code,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Column {
    pub title: &'static str,
    pub width: usize,
    pub field: Field,
}

impl Column {
    pub const fn new(title: &'static str, width: usize, field: Field) -> Self {
        Self {
            title,
            width,
            field,
        }
    }
}

pub const DEFAULT_COLUMNS: &[Column] = &[
    Column::new("#", 5, Field::Rank),
    Column::new("Function", 25, Field::Function),
    Column::new("Calls", 8, Field::Calls),
    Column::new("Time", 14, Field::Time),
    Column::new("Avg time", 14, Field::AvgTime),
    Column::new("Memory", 10, Field::Memory),
    Column::new("Avg mem", 10, Field::AvgMem),
    Column::new("Code", 32, Field::Code),
];

/// Collector activity appended under the table.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GcSummary {
    pub cycles: u64,
    pub mean_interval: f64,
}

/// Exactly `width` characters of `text`: its tail if too long, right-padded
/// if too short.
pub fn fit(text: &str, width: usize) -> String {
    let len = text.chars().count();
    if len > width {
        text.chars().skip(len - width).collect()
    } else {
        let mut out = String::with_capacity(width);
        out.push_str(text);
        out.extend(std::iter::repeat(' ').take(width - len));
        out
    }
}

fn cell(row: &ResultRow, field: Field, decimals: usize) -> String {
    match field {
        Field::Rank => row.rank.to_string(),
        Field::Function => row.label.clone(),
        Field::Calls => row.num_calls.to_string(),
        Field::Time => format!("{:.*}", decimals, row.time),
        Field::AvgTime => match row.avg_time {
            Some(t) => format!("{:.*}", decimals, t),
            None => "-".to_owned(),
        },
        Field::Memory => format!("{:.0}", row.total_mem),
        Field::AvgMem => match row.avg_mem {
            Some(m) => format!("{m:.0}"),
            None => "-".to_owned(),
        },
        Field::Code => row.location.to_string(),
    }
}

fn border(columns: &[Column]) -> String {
    let mut line = String::from("+");
    for col in columns {
        line.push_str(&"-".repeat(col.width + 2));
        line.push('+');
    }
    line.push('\n');
    line
}

fn line(columns: &[Column], cells: impl Iterator<Item = String>) -> String {
    let mut out = String::from("|");
    for (col, text) in columns.iter().zip(cells) {
        out.push(' ');
        out.push_str(&fit(&text, col.width));
        out.push_str(" |");
    }
    out.push('\n');
    out
}

/// Render `rows` as a bordered table in the order of `columns`. Times are
/// printed with `decimals` places. The GC line appears only for more than
/// one observed cycle.
pub fn render(
    rows: &[ResultRow],
    columns: &[Column],
    decimals: usize,
    gc: Option<GcSummary>,
) -> String {
    let rule = border(columns);
    let mut out = String::new();
    out.push_str(&rule);
    out.push_str(&line(columns, columns.iter().map(|c| c.title.to_owned())));
    out.push_str(&rule);
    for row in rows {
        out.push_str(&line(
            columns,
            columns.iter().map(|c| cell(row, c.field, decimals)),
        ));
    }
    out.push_str(&rule);
    if let Some(gc) = gc.filter(|g| g.cycles > 1) {
        out.push_str(&format!(
            "GC cycles: {}, avg interval: {:.*}\n",
            gc.cycles, decimals, gc.mean_interval
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::SourceLocation;

    fn row(rank: usize, label: &str, unit: &str, line: u32) -> ResultRow {
        ResultRow {
            rank,
            label: label.into(),
            location: SourceLocation {
                unit: unit.into(),
                line,
            },
            num_calls: 3,
            time: 0.06,
            avg_time: Some(0.02),
            total_mem: 12.0,
            avg_mem: None,
        }
    }

    #[test]
    fn fit_pads_short_text() {
        assert_eq!(fit("abc", 6), "abc   ");
        assert_eq!(fit("", 2), "  ");
        assert_eq!(fit("exact", 5), "exact");
    }

    #[test]
    fn fit_keeps_the_tail_of_long_text() {
        assert_eq!(fit("scripts/deep/module.lua:128", 10), "le.lua:128");
    }

    #[test]
    fn fit_counts_characters_not_bytes() {
        assert_eq!(fit("héllo", 3), "llo");
        assert_eq!(fit("é", 2).chars().count(), 2);
    }

    #[test]
    fn every_line_has_the_same_width() {
        let rows = vec![
            row(1, "update", "game/world.lua", 41),
            row(2, "a_really_long_function_name_that_overflows", "x.lua", 9),
        ];
        let table = render(&rows, DEFAULT_COLUMNS, 6, None);
        let widths: Vec<usize> = table.lines().map(|l| l.chars().count()).collect();
        assert_eq!(widths.len(), 6, "top, header, rule, two rows, bottom:\n{table}");
        assert!(widths.iter().all(|&w| w == widths[0]), "ragged table:\n{table}");
        assert!(table.contains("| #     | Function"), "{table}");
        assert!(table.contains("0.060000"), "{table}");
        assert!(table.contains("game/world.lua:41"), "{table}");
        assert!(table.contains("that_overflows |"), "{table}");
    }

    #[test]
    fn missing_average_renders_as_dash() {
        let table = render(&[row(1, "f", "a.lua", 1)], DEFAULT_COLUMNS, 6, None);
        let body = table.lines().nth(3).unwrap();
        let avg_mem = body.split(" | ").nth(6).unwrap();
        assert_eq!(avg_mem.trim(), "-");
    }

    #[test]
    fn empty_result_renders_headers_and_borders_only() {
        let table = render(&[], DEFAULT_COLUMNS, 6, None);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines.len(), 4);
        assert!(lines[0].starts_with("+-------+"));
        assert_eq!(lines[0], lines[2]);
        assert_eq!(lines[0], lines[3]);
    }

    #[test]
    fn gc_line_needs_more_than_one_cycle() {
        let one = GcSummary {
            cycles: 1,
            mean_interval: 0.5,
        };
        assert!(!render(&[], DEFAULT_COLUMNS, 3, Some(one)).contains("GC cycles"));

        let many = GcSummary {
            cycles: 4,
            mean_interval: 0.25,
        };
        let table = render(&[], DEFAULT_COLUMNS, 3, Some(many));
        assert!(
            table.ends_with("GC cycles: 4, avg interval: 0.250\n"),
            "{table}"
        );
    }

    #[test]
    fn custom_columns_follow_declared_order() {
        let columns = [
            Column::new("Code", 12, Field::Code),
            Column::new("Calls", 5, Field::Calls),
        ];
        let table = render(&[row(1, "f", "a.lua", 7)], &columns, 6, None);
        let lines: Vec<&str> = table.lines().collect();
        assert_eq!(lines[0], "+--------------+-------+");
        assert_eq!(lines[1], "| Code         | Calls |");
        assert_eq!(lines[3], "| a.lua:7      | 3     |");
    }
}
