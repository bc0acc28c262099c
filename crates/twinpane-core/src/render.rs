use std::io::{self, IsTerminal, Write};

use chrono::Local;
use unicode_width::UnicodeWidthStr;

use crate::browser::{CollectionBrowser, Phase};
use crate::config::Config;
use crate::filter::FilterMode;
use crate::task_store::TaskStore;

const PROGRESS_WIDTH: usize = 20;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> Self {
        Self {
            color: color_enabled(cfg) && io::stdout().is_terminal(),
        }
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all, fields(mode = %mode))]
    pub fn write_task_panel<W: Write>(
        &self,
        out: &mut W,
        store: &TaskStore,
        mode: FilterMode,
    ) -> anyhow::Result<()> {
        let counts = store.counts();

        writeln!(out, "{}", self.paint("Task Manager", "1"))?;
        writeln!(
            out,
            "Total: {}  Active: {}  Completed: {}",
            counts.total, counts.active, counts.completed
        )?;

        let filters = FilterMode::ALL_MODES
            .iter()
            .map(|&option| {
                let label = format!("{} {}", option.label(), counts.for_mode(option));
                if option == mode {
                    self.paint(&format!("[{label}]"), "7")
                } else {
                    format!(" {label} ")
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        writeln!(out, "Filter: {filters}")?;
        writeln!(out)?;

        let visible = store.filtered_view(mode);
        if visible.is_empty() {
            if mode == FilterMode::All {
                writeln!(out, "No tasks yet. Add one above!")?;
            } else {
                writeln!(out, "No {mode} tasks.")?;
            }
        } else {
            let headers = vec![
                "ID".to_string(),
                "Done".to_string(),
                "Created".to_string(),
                "Task".to_string(),
            ];
            let rows = visible
                .iter()
                .map(|task| {
                    let done = if task.completed {
                        self.paint("[x]", "32")
                    } else {
                        "[ ]".to_string()
                    };
                    let created = task
                        .created_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d")
                        .to_string();
                    let text = if task.completed {
                        self.paint(&task.text, "2;9")
                    } else {
                        task.text.clone()
                    };
                    vec![self.paint(&task.id, "33"), done, created, text]
                })
                .collect();
            write_table(&mut *out, headers, rows)?;
        }

        if counts.total > 0 {
            let filled = (counts.progress() * PROGRESS_WIDTH as f64).round() as usize;
            writeln!(out)?;
            writeln!(
                out,
                "Progress: {} of {} completed [{}{}] {:.0}%",
                counts.completed,
                counts.total,
                "#".repeat(filled),
                "-".repeat(PROGRESS_WIDTH - filled),
                counts.progress() * 100.0
            )?;
        }

        Ok(())
    }

    #[tracing::instrument(skip_all, fields(phase = %browser.phase()))]
    pub fn write_posts_panel<W: Write>(
        &self,
        out: &mut W,
        browser: &CollectionBrowser,
    ) -> anyhow::Result<()> {
        match browser.phase() {
            Phase::Idle | Phase::Loading => {
                writeln!(out, "Loading posts...")?;
                return Ok(());
            }
            Phase::Failed => {
                let message = browser.error_message().unwrap_or("unknown error");
                writeln!(
                    out,
                    "{}",
                    self.paint(&format!("Failed to load posts: {message}"), "31")
                )?;
                return Ok(());
            }
            Phase::Ready => {}
        }

        let summary = browser.summary();
        writeln!(out, "{}", self.paint("API Data Explorer", "1"))?;
        if summary.query.is_empty() {
            writeln!(
                out,
                "Showing {} of {} posts",
                summary.showing, summary.matching
            )?;
        } else {
            writeln!(
                out,
                "Showing {} of {} posts for \"{}\"",
                summary.showing, summary.matching, summary.query
            )?;
        }
        writeln!(out)?;

        let items = browser.current_page_items();
        if items.is_empty() {
            if summary.query.is_empty() {
                writeln!(out, "No posts available.")?;
            } else {
                writeln!(out, "No posts found matching your search.")?;
            }
        } else {
            for post in items {
                writeln!(
                    out,
                    "{}  {}",
                    self.paint(&format!("Post #{}", post.id), "33"),
                    self.paint(&format!("User {}", post.user_id), "36")
                )?;
                writeln!(out, "  {}", self.paint(&post.title, "1"))?;
                for line in post.body.lines() {
                    writeln!(out, "  {line}")?;
                }
                writeln!(out)?;
            }
        }

        let total = browser.total_pages();
        if total > 1 {
            let pages = browser
                .page_window()
                .into_iter()
                .map(|page| {
                    if page == browser.current_page() {
                        self.paint(&format!("[{page}]"), "7")
                    } else {
                        format!(" {page} ")
                    }
                })
                .collect::<Vec<_>>()
                .join("");
            let previous = if browser.has_previous() { "< Previous" } else { "  --------" };
            let next = if browser.has_next() { "Next >" } else { "------" };
            writeln!(
                out,
                "{previous}  {pages}  {next}   (page {} of {total})",
                browser.current_page()
            )?;
        }

        writeln!(out, "Total posts available: {}", summary.available)?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
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

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

/// `color` accepts the same boolean words as every other rc flag; unset means on.
fn color_enabled(cfg: &Config) -> bool {
    cfg.get_bool("color").unwrap_or(true)
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
