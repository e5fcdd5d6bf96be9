use std::fmt::Write as _;

use chrono_tz::Tz;
use screener::{Interval, PageError, PageView, Row, SnapshotStatus};
use serenity::all::{ButtonStyle, CreateActionRow, CreateButton};

pub const PAGE_PREFIX: &str = "scan_page:";

const COLUMNS: [&str; 3] = ["close", "rsi", "adx"];

/// Discord's limit on message content, in characters.
pub const MAX_MESSAGE_CHARS: usize = 2000;
/// Longest expression echoed back in a page header.
const MAX_ECHO_CHARS: usize = 200;

pub fn page_id(owner: u64, result_id: u64, page: usize) -> String {
    format!("{PAGE_PREFIX}{owner}:{result_id}:{page}")
}

/// `(owner, result_id, page)` from a pagination button id.
pub fn parse_page_id(custom_id: &str) -> Option<(u64, u64, usize)> {
    let mut parts = custom_id.strip_prefix(PAGE_PREFIX)?.split(':');
    let owner = parts.next()?.parse().ok()?;
    let result_id = parts.next()?.parse().ok()?;
    let page = parts.next()?.parse().ok()?;
    match parts.next() {
        None => Some((owner, result_id, page)),
        Some(_) => None,
    }
}

/// Header plus a monospace table of the page, kept under
/// [`MAX_MESSAGE_CHARS`]. Rows that do not fit are cut and counted.
pub fn page_content(title: Option<&str>, view: &PageView, tz: Tz) -> String {
    let as_of = view.as_of.with_timezone(&tz);
    let mut out = String::new();
    if let Some(title) = title {
        out.push_str(title);
        out.push('\n');
    }
    let _ = writeln!(
        out,
        "**{}** · `{}` · page {}/{} · {} rows · as of {}",
        view.interval,
        echo(&view.expression),
        view.page + 1,
        view.total_pages,
        view.total_rows,
        as_of.format("%Y-%m-%d %H:%M %Z"),
    );

    if view.rows.is_empty() {
        out.push_str("No symbols matched.");
        return out;
    }

    let mut table = String::from("```\n");
    let _ = writeln!(table, "{:<14}{:>14}{:>8}{:>8}", "symbol", COLUMNS[0], COLUMNS[1], COLUMNS[2]);
    let mut shown = 0;
    for row in &view.rows {
        let line = format!(
            "{:<14}{:>14}{:>8}{:>8}\n",
            row.symbol,
            price(row),
            fixed(row, COLUMNS[1]),
            fixed(row, COLUMNS[2]),
        );
        // room for the closing fence and the "… n more" note
        let used = chars(&out) + chars(&table) + chars(&line) + 3 + 24;
        if used > MAX_MESSAGE_CHARS {
            break;
        }
        table.push_str(&line);
        shown += 1;
    }
    table.push_str("```");
    out.push_str(&table);

    if shown < view.rows.len() {
        let _ = write!(out, "\n… {} more on this page", view.rows.len() - shown);
    }
    out
}

fn chars(s: &str) -> usize {
    s.chars().count()
}

/// The expression as shown inside inline code: backticks swapped out and
/// long input cut short.
fn echo(expression: &str) -> String {
    let clean = expression.replace('`', "'");
    if chars(&clean) <= MAX_ECHO_CHARS {
        return clean;
    }
    let mut cut: String = clean.chars().take(MAX_ECHO_CHARS - 1).collect();
    cut.push('…');
    cut
}

pub fn page_buttons(view: &PageView, owner: u64) -> Vec<CreateActionRow> {
    if view.total_pages <= 1 {
        return vec![];
    }

    let prev = CreateButton::new(page_id(owner, view.result_id, view.page.saturating_sub(1)))
        .label("◀ Prev")
        .style(ButtonStyle::Secondary)
        .disabled(!view.has_prev());
    let next = CreateButton::new(page_id(owner, view.result_id, view.page + 1))
        .label("Next ▶")
        .style(ButtonStyle::Primary)
        .disabled(!view.has_next());

    vec![CreateActionRow::Buttons(vec![prev, next])]
}

pub fn page_error(error: &PageError) -> String {
    match error {
        PageError::NoSuchSession => "This result has expired. Run `/scan query` again.".to_string(),
        PageError::OutOfRange { .. } => "No more pages in that direction.".to_string(),
        PageError::Superseded => {
            "You ran a newer query since. Use the buttons on its message.".to_string()
        }
        PageError::SnapshotMissing(interval) => {
            format!("No {interval} data yet. Try `/scan refresh interval:{interval}`.")
        }
        PageError::Query(e) => format!("Invalid expression: {e}"),
    }
}

pub fn status_lines(status: &[SnapshotStatus], scheduled: &[Interval], tz: Tz) -> String {
    let mut out = String::from("```\n");
    let _ = writeln!(out, "{:<6}{:>8}{:>9}  {}", "tf", "rows", "skipped", "updated");

    for interval in scheduled {
        match status.iter().find(|s| s.interval == *interval) {
            Some(s) => {
                let at = s.completed_at.with_timezone(&tz);
                let _ = writeln!(
                    out,
                    "{:<6}{:>8}{:>9}  {}",
                    interval,
                    s.rows,
                    s.skipped,
                    at.format("%m-%d %H:%M")
                );
            }
            None => {
                let _ = writeln!(out, "{:<6}{:>8}{:>9}  {}", interval, "-", "-", "pending");
            }
        }
    }

    out.push_str("```");
    out
}

fn price(row: &Row) -> String {
    match row.number("close") {
        Some(v) if v.abs() >= 1000.0 => format!("{v:.2}"),
        Some(v) if v.abs() >= 1.0 => format!("{v:.4}"),
        Some(v) => format!("{v:.6}"),
        None => "-".to_string(),
    }
}

fn fixed(row: &Row, name: &str) -> String {
    row.number(name)
        .map(|v| format!("{v:.1}"))
        .unwrap_or_else(|| "-".to_string())
}
