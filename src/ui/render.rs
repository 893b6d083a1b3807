//! Plain-text renderers for the terminal views.
//!
//! Each function returns the finished text so commands decide where it goes
//! and tests can inspect it with ANSI codes stripped.

use std::fmt::Write as _;
use std::time::Duration;

use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::aggregator::StateBoard;
use crate::models::{
    OperatorMetrics, PartState, PartSummary, ScannedPart, TrackingRecord, UserTasks,
    format_minutes,
};
use crate::ui::icons::{CHECK, CLOCK, CROSS, WARN};
use crate::ui::palette::StateStyle;
use crate::view::{Notice, NoticeKind};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Spinner shown while a request is outstanding.
pub fn spinner(message: impl Into<String>) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    bar.set_message(message.into());
    bar.enable_steady_tick(Duration::from_millis(100));
    bar
}

/// Column summary for every board state.
pub fn board_summary(board: &StateBoard) -> String {
    let mut out = String::new();
    for (state, count) in board.counts() {
        let st = StateStyle::of(state);
        let open = board.open_pool(state).len();
        let _ = writeln!(
            out,
            "{:<4} {} {} ({} open)",
            st.style().apply_to(st.code),
            st.heading(state),
            style(count).bold(),
            open
        );
    }
    let _ = writeln!(out, "{} parts on the board", board.total());
    out
}

/// Parts of one state, up to `limit` entries.
pub fn state_column(board: &StateBoard, state: PartState, limit: usize) -> String {
    let st = StateStyle::of(state);
    let parts = board.parts(state);
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", st.heading(state), parts.len());
    if parts.is_empty() {
        let _ = writeln!(out, "  {}", style("No parts in this state").dim());
        return out;
    }
    for part in parts.iter().take(limit) {
        let _ = writeln!(out, "  {}", part_line(part));
    }
    if parts.len() > limit {
        let _ = writeln!(
            out,
            "  {}",
            style(format!("... and {} more", parts.len() - limit)).dim()
        );
    }
    out
}

fn part_line(part: &PartSummary) -> String {
    let holder = match (part.taken, part.tracking_id) {
        (true, Some(id)) => format!("{}taken (task {})", CLOCK, id),
        (true, None) => format!("{}taken", CLOCK),
        (false, _) => "open".to_string(),
    };
    let project = part
        .project_id
        .map(|p| format!("project {}", p))
        .unwrap_or_default();
    format!("{}  {:<24} {:<12} {}", part.part_id, part.name(), project, holder)
}

/// Current task and the capped completed list.
pub fn user_tasks(tasks: &UserTasks) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style("Current task").bold());
    if tasks.current.is_empty() {
        let _ = writeln!(out, "  {}", style("No active task").dim());
    }
    for record in &tasks.current {
        let started = record
            .start_time
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  #{:<6} {:<24} {:<28} started {}",
            record.tracking_id,
            record.name(),
            state_cell(record),
            started
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{} ({} of {})",
        style("Completed tasks").bold(),
        tasks.completed.len(),
        tasks.completed_total
    );
    for record in &tasks.completed {
        let duration = record
            .duration()
            .map(|d| format_minutes(d.num_minutes()))
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  #{:<6} {:<24} {:<28} {}",
            record.tracking_id,
            record.name(),
            state_cell(record),
            duration
        );
    }
    out
}

fn state_cell(record: &TrackingRecord) -> String {
    record
        .part_state
        .map(|s| s.label())
        .unwrap_or_else(|| "-".to_string())
}

pub fn metrics(operator_id: i64, metrics: &OperatorMetrics) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style(format!("Operator {}", operator_id)).bold());
    let _ = writeln!(out, "  Total tasks:      {}", metrics.total_tasks);
    let _ = writeln!(
        out,
        "  Average duration: {}",
        format_minutes(metrics.average_task_duration.round() as i64)
    );
    let _ = writeln!(
        out,
        "  Parts today / month / year: {} / {} / {}",
        metrics.count_for("DAY"),
        metrics.count_for("MONTH"),
        metrics.count_for("YEAR")
    );
    if !metrics.avg_duration_by_category.is_empty() {
        let _ = writeln!(out, "  Average by stage:");
        for (state, minutes) in &metrics.avg_duration_by_category {
            let st = StateStyle::of(*state);
            let _ = writeln!(
                out,
                "    {:<4} {:<30} {}",
                st.code,
                state.label(),
                format_minutes(minutes.round() as i64)
            );
        }
    }
    out
}

pub fn notice(notice: &Notice) -> String {
    match notice.kind {
        NoticeKind::Success => format!("{}{}", CHECK, style(&notice.message).green()),
        NoticeKind::Duplicate => format!("{}{}", WARN, style(&notice.message).yellow()),
        NoticeKind::Error => format!("{}{}", CROSS, style(&notice.message).red()),
    }
}

/// Recently received parts, newest first.
pub fn recent_scans(entries: &[ScannedPart]) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", style("Recently received").bold());
    if entries.is_empty() {
        let _ = writeln!(out, "  {}", style("Nothing received yet").dim());
    }
    for entry in entries {
        let at = entry
            .scan_date_time
            .map(|t| t.format(TIME_FORMAT).to_string())
            .unwrap_or_else(|| "-".to_string());
        let _ = writeln!(
            out,
            "  {}  {:<24} {}",
            at,
            entry.part_name.as_deref().unwrap_or("Unnamed part"),
            entry.part_id
        );
    }
    out
}
