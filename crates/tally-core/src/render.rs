use std::io::{self, IsTerminal, Write};

use unicode_width::UnicodeWidthStr;

use crate::config::Config;
use crate::datetime::format_day;
use crate::filter::FilterState;
use crate::paginate::Page;
use crate::task::Task;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: cfg.color() && io::stdout().is_terminal(),
        }
    }

    #[tracing::instrument(skip(self, page, filter))]
    pub fn print_page(&self, page: &Page<&Task>, filter: &FilterState) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_page(&mut out, page, filter)
    }

    pub fn write_page<W: Write>(
        &self,
        mut writer: W,
        page: &Page<&Task>,
        filter: &FilterState,
    ) -> anyhow::Result<()> {
        if let Some(summary) = filter_summary(filter) {
            writeln!(writer, "{}", self.paint(&summary, "36"))?;
        }

        if page.items.is_empty() {
            writeln!(writer, "No todos to show.")?;
        } else {
            let headers = vec![
                "#".to_string(),
                "ID".to_string(),
                "Done".to_string(),
                "Created".to_string(),
                "Title".to_string(),
            ];

            let rows = page
                .items
                .iter()
                .enumerate()
                .map(|(offset, task)| {
                    let position = (page.start_index + offset + 1).to_string();
                    let (mark, title) = if task.completed {
                        ("[x]", self.paint(&task.title, "9"))
                    } else {
                        ("[ ]", task.title.clone())
                    };
                    vec![
                        self.paint(&position, "33"),
                        task.short_id(),
                        mark.to_string(),
                        format_day(task.created_date),
                        title,
                    ]
                })
                .collect();

            write_table(&mut writer, headers, rows)?;
        }

        writeln!(writer)?;
        writeln!(writer, "{}", page.info_line())?;
        writeln!(writer, "{}", self.page_strip(page))?;
        Ok(())
    }

    /// `< prev  1 [2] 3  next >`; unavailable arrows are left blank.
    pub fn page_strip<T>(&self, page: &Page<T>) -> String {
        let prev = if page.has_previous() { "< prev" } else { "      " };
        let next = if page.has_next() { "next >" } else { "" };

        let buttons = page
            .strip()
            .map(|n| {
                if n == page.page {
                    self.paint(&format!("[{n}]"), "1")
                } else {
                    n.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");

        format!("{prev}  {buttons}  {next}").trim_end().to_string()
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn filter_summary(filter: &FilterState) -> Option<String> {
    let criteria = filter.criteria();
    if criteria.is_empty() {
        return None;
    }

    let mut parts = Vec::new();
    if let Some(query) = criteria.query() {
        parts.push(format!("title contains {query:?}"));
    }
    if let Some(from) = criteria.from_day() {
        parts.push(format!("from {}", format_day(from)));
    }
    if let Some(to) = criteria.to_day() {
        parts.push(format!("to {}", format_day(to)));
    }
    Some(format!("filter: {}", parts.join(", ")))
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for (header, &width) in headers.iter().zip(&widths) {
        write!(writer, "{header:width$} ")?;
    }
    writeln!(writer)?;

    for &width in &widths {
        write!(writer, "{:-<width$} ", "")?;
    }
    writeln!(writer)?;

    for row in rows {
        for (cell, &width) in row.iter().zip(&widths) {
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = width.saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
