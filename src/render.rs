//! Text rendering for the REPL.
//!
//! Every function returns a `String` so output can be asserted on in tests;
//! the REPL writes them to stdout. Tables are laid out with ratatui into an
//! off-screen buffer and then flattened to lines, so they scroll with the
//! rest of the transcript.

use std::fmt::Write as _;

use crossterm::style::Stylize;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Rect};
use ratatui::style::{Modifier, Style};
use ratatui::text::Line;
use ratatui::widgets::{Row, Table, Widget};
use tally_chat::ExchangeReport;
use tally_cost::{ChatSession, ModelTable, Role, UsageSnapshot, format_usd};

/// Warning shown whenever the conversation no longer fits the window.
pub const CONTEXT_EXCEEDED: &str = "Context window exceeded. Some previous content is truncated.";

/// Divider printed above the first turn outside the window.
pub const WINDOW_EDGE: &str = "-- outside the context window --";

const BAR_WIDTH: usize = 30;
const PRICE_WIDTH: u16 = 9;
const CONTEXT_WIDTH: u16 = 8;

/// The conversation, one block per turn, truncated turns struck out.
pub fn history(session: &ChatSession) -> String {
    let snapshot = session.snapshot();
    if session.is_empty() {
        return "No messages yet. Type a prompt to start.\n".to_string();
    }

    let mut out = String::new();
    let edge = snapshot.first_truncated();
    for (index, turn) in session.turns().iter().enumerate() {
        if edge == Some(index) {
            let _ = writeln!(out, "  {}", WINDOW_EDGE.dark_grey());
        }
        let role = match turn.role {
            Role::User => "user".cyan(),
            Role::Assistant => "assistant".green(),
        };
        let edited = if turn.is_edited() { " (edited)" } else { "" };
        let _ = writeln!(out, "{} {}{}", turn.id.to_string().bold(), role, edited);

        let truncated = snapshot.is_truncated(index);
        for line in turn.text.lines() {
            if truncated {
                let _ = writeln!(out, "  {}", line.crossed_out().dark_grey());
            } else {
                let _ = writeln!(out, "  {}", line);
            }
        }
        let _ = writeln!(
            out,
            "  Tokens used by Message {}: {}",
            turn.id,
            snapshot.tokens_at(index).unwrap_or(0)
        );
    }
    out.push('\n');
    out.push_str(&usage_summary(snapshot));
    out
}

/// Total line and progress bar.
pub fn usage_summary(snapshot: &UsageSnapshot) -> String {
    let mut out = format!(
        "Total Tokens Used: {}/{} tokens\n",
        snapshot.total_tokens, snapshot.context_window_limit
    );
    let _ = writeln!(out, "{}", progress_bar(snapshot.usage_ratio(), BAR_WIDTH));
    if snapshot.context_exceeded() {
        let _ = writeln!(out, "{}", CONTEXT_EXCEEDED.yellow());
    }
    out
}

/// `[█████░░░░░]  50%` style bar. `ratio` is clamped to `0.0..=1.0`.
pub fn progress_bar(ratio: f64, width: usize) -> String {
    let ratio = if ratio.is_finite() { ratio.clamp(0.0, 1.0) } else { 1.0 };
    let filled = (ratio * width as f64).round() as usize;
    format!(
        "[{}{}] {:>3}%",
        "█".repeat(filled),
        "░".repeat(width.saturating_sub(filled)),
        (ratio * 100.0).round() as u64
    )
}

/// Per-turn token breakdown.
pub fn token_breakdown(session: &ChatSession) -> String {
    let snapshot = session.snapshot();
    let mut out = String::from("Token Breakdown for each message:\n");
    for (index, turn) in session.turns().iter().enumerate() {
        let marker = if snapshot.is_truncated(index) { "  (truncated)" } else { "" };
        let _ = writeln!(
            out,
            "  Message {}: {} tokens{}",
            turn.id,
            snapshot.tokens_at(index).unwrap_or(0),
            marker
        );
    }
    let _ = writeln!(
        out,
        "  In window: {} tokens, truncated: {} tokens",
        snapshot.active_tokens(),
        snapshot.truncated_tokens
    );
    let _ = writeln!(out, "Session cost so far: {}", format_usd(session.spent_usd()));
    out.push_str(&usage_summary(snapshot));
    out
}

/// Summary printed after a successful exchange.
pub fn exchange(report: &ExchangeReport, session: &ChatSession) -> String {
    let outcome = &report.outcome;
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", outcome.assistant_id.to_string().bold(), "assistant".green());
    for line in report.response.text.lines() {
        let _ = writeln!(out, "  {}", line);
    }
    out.push('\n');
    let _ = writeln!(out, "Tokens used by User Input: {}", outcome.prompt_tokens);
    let _ = writeln!(out, "Tokens used by Assistant Response: {}", outcome.response_tokens);
    let _ = writeln!(
        out,
        "Cost of this interaction: {}",
        format_usd(outcome.cost.total_usd())
    );
    if outcome.cost.cached_cost_usd > 0.0 {
        let _ = writeln!(
            out,
            "  (includes {} at the cached-input price)",
            format_usd(outcome.cost.cached_cost_usd)
        );
    }
    let _ = writeln!(out, "Session cost so far: {}", format_usd(session.spent_usd()));
    out.push_str(&usage_summary(session.snapshot()));
    out
}

/// Model table with the active model marked.
pub fn models(table: &ModelTable, active: &str) -> String {
    let name_width = table
        .names()
        .map(str::len)
        .chain(std::iter::once("Model".len()))
        .max()
        .unwrap_or(0)
        .min(u16::MAX as usize / 2) as u16;

    let rows: Vec<Row> = table
        .iter()
        .map(|profile| {
            let marker = if profile.name == active { "*" } else { "" };
            let cached = profile
                .cached_input_price_per_1k
                .map(|p| p.to_string())
                .unwrap_or_else(|| "-".to_string());
            Row::new(vec![
                Line::from(marker),
                Line::from(profile.name.clone()),
                Line::from(profile.input_price_per_1k.to_string()).right_aligned(),
                Line::from(profile.output_price_per_1k.to_string()).right_aligned(),
                Line::from(cached).right_aligned(),
                Line::from(profile.context_window_limit.to_string()).right_aligned(),
            ])
        })
        .collect();

    let header = Row::new(vec![
        Line::from(""),
        Line::from("Model"),
        Line::from("In/1k").right_aligned(),
        Line::from("Out/1k").right_aligned(),
        Line::from("Cached/1k").right_aligned(),
        Line::from("Context").right_aligned(),
    ])
    .style(Style::default().add_modifier(Modifier::BOLD));

    let widths = [
        Constraint::Length(1),
        Constraint::Length(name_width),
        Constraint::Length(PRICE_WIDTH),
        Constraint::Length(PRICE_WIDTH),
        Constraint::Length(PRICE_WIDTH),
        Constraint::Length(CONTEXT_WIDTH),
    ];
    let spacing = 1;
    let width = 1 + name_width + 3 * PRICE_WIDTH + CONTEXT_WIDTH + 5 * spacing;
    let height = u16::try_from(rows.len() + 1).unwrap_or(u16::MAX);

    let area = Rect::new(0, 0, width, height);
    let mut buf = Buffer::empty(area);
    Table::new(rows, widths)
        .header(header)
        .column_spacing(spacing)
        .render(area, &mut buf);
    buffer_text(&buf)
}

/// Flatten a rendered buffer into lines, dropping trailing blanks.
fn buffer_text(buf: &Buffer) -> String {
    let area = buf.area;
    let mut out = String::new();
    for y in area.top()..area.bottom() {
        let mut line = String::new();
        for x in area.left()..area.right() {
            line.push_str(buf[(x, y)].symbol());
        }
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// Command reference.
pub const HELP: &str = "\
Type a message and press Enter to send it.

Commands:
  /retry              Send the last failed message again
  /edit <id> <text>   Replace the text of message #id
  /delete <id>        Remove message #id
  /model [name]       Show or switch the active model
  /models             List known models and prices
  /usage              Token breakdown for each message
  /history            Show the conversation
  /clear              Remove every message
  /help               Show this help
  /quit               Exit

Press Ctrl-C while waiting for a response to cancel it.
";
