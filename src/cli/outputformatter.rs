use terminal_size::{terminal_size, Height, Width};

use crate::complaints::{BadgeTone, Complaint, Consistency, DetailState, Slot, Timeline};
use crate::error::{Notice, Tone};
use crate::identity::Session;

/// Column widths are capped so one long complaint text cannot push the table off screen.
const MAX_COL_WIDTH: usize = 60;

/// Plain rows/columns table rendered with ASCII borders.
#[derive(Debug, Clone, Default)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: &[&str]) -> Self { Self { headers: headers.iter().map(|s| s.to_string()).collect(), rows: Vec::new() } }

    pub fn push(&mut self, row: Vec<String>) { self.rows.push(row); }

    /// Render to lines no wider than `max_width` (visible characters).
    pub fn render(&self, max_width: usize, color: bool) -> Vec<String> {
        let mut widths: Vec<usize> = self.headers.iter().map(|s| visible_len(s).min(MAX_COL_WIDTH)).collect();
        for r in &self.rows {
            for (i, cell) in r.iter().enumerate().take(widths.len()) {
                let w = visible_len(cell);
                if w > widths[i] { widths[i] = w.min(MAX_COL_WIDTH); }
            }
        }
        // Shrink the widest column until the table fits.
        let frame = |w: &[usize]| w.iter().sum::<usize>() + w.len() * 3 + 1;
        while frame(&widths) > max_width {
            let (idx, widest) = match widths.iter().enumerate().max_by_key(|(_, w)| **w) {
                Some((i, w)) => (i, *w),
                None => break,
            };
            if widest <= 4 { break; }
            widths[idx] = widest - 1;
        }

        let sep = build_separator(&widths);
        let mut out = vec![sep.clone(), build_header(&self.headers, &widths, color), sep.clone()];
        for r in &self.rows { out.push(build_row(r, &widths)); }
        out.push(sep);
        out
    }
}

pub fn complaint_table(items: &[&Complaint], color: bool) -> Table {
    let mut t = Table::new(&["ID", "Status", "Category", "Created", "Text"]);
    for c in items {
        t.push(vec![
            c.id.to_string(),
            badge(c.status.label(), c.status.tone(), color),
            c.category_label().to_string(),
            c.created_at.format("%Y-%m-%d %H:%M").to_string(),
            c.text.replace('\n', " "),
        ]);
    }
    t
}

pub fn timeline_lines(timeline: &Timeline) -> Vec<String> {
    if timeline.is_empty() { return vec!["No updates yet.".to_string()]; }
    timeline
        .entries()
        .iter()
        .map(|e| {
            let mut line = format!("{}  {}", e.created_at.format("%Y-%m-%d %H:%M"), e.action_label());
            if let (Some(from), Some(to)) = (e.old_status, e.new_status) {
                line.push_str(&format!(": {} -> {}", from.label(), to.label()));
            }
            if let Some(c) = e.comment.as_deref().filter(|c| !c.trim().is_empty()) {
                line.push_str(&format!(" \"{}\"", c.trim()));
            }
            if !e.is_valid() { line.push_str(" (unexpected transition)"); }
            line
        })
        .collect()
}

pub fn detail_lines(state: &DetailState, color: bool) -> Vec<String> {
    let mut out = Vec::new();
    match &state.complaint {
        Slot::Ready(c) => {
            out.push(format!("Complaint #{}", c.id));
            out.push(format!("Status:   {}", badge(c.status.label(), c.status.tone(), color)));
            out.push(format!("Category: {}", c.category_label()));
            out.push(format!("Created:  {}", c.created_at.format("%Y-%m-%d %H:%M")));
            if let Some(u) = c.updated_at { out.push(format!("Updated:  {}", u.format("%Y-%m-%d %H:%M"))); }
            out.push(String::new());
            out.push(c.text.clone());
        }
        Slot::Failed(n) => out.push(notice_line(n, color)),
        Slot::Loading | Slot::Idle => out.push("Loading complaint...".to_string()),
    }
    out.push(String::new());
    out.push("History:".to_string());
    match &state.history {
        Slot::Ready(t) => out.extend(timeline_lines(t).into_iter().map(|l| format!("  {}", l))),
        Slot::Failed(n) => out.push(format!("  {}", notice_line(n, color))),
        Slot::Loading | Slot::Idle => out.push("  Loading history...".to_string()),
    }
    match state.consistency() {
        Some(Consistency::HistoryLagging { .. }) => out.push("  (history is still catching up)".to_string()),
        Some(Consistency::HistoryAhead { .. }) | Some(Consistency::Divergent { .. }) => {
            out.push("  (history and status disagree; refresh to update)".to_string())
        }
        _ => {}
    }
    out
}

pub fn session_lines(s: &Session) -> Vec<String> {
    if !s.is_authenticated() { return vec!["Not signed in.".to_string()]; }
    let or_dash = |v: &str| if v.is_empty() { "-".to_string() } else { v.to_string() };
    vec![
        format!("Signed in as: {}", or_dash(&s.identity_label)),
        format!("Role:         {}", if s.is_privileged { "staff" } else { "client" }),
        format!("Name:         {}", or_dash(&s.name)),
        format!("Email:        {}", or_dash(&s.email)),
        format!("User id:      {}", or_dash(&s.user_id)),
        format!("Avatar:       {}", or_dash(&s.avatar_ref)),
    ]
}

pub fn notice_line(n: &Notice, color: bool) -> String {
    let (tag, code) = match n.tone {
        Tone::Info => ("info", "36"),
        Tone::Warning => ("warning", "33"),
        Tone::Success => ("ok", "32"),
    };
    if color { format!("\x1b[{}m[{}]\x1b[0m {}", code, tag, n.message) } else { format!("[{}] {}", tag, n.message) }
}

fn badge(label: &str, tone: BadgeTone, color: bool) -> String {
    if !color { return label.to_string(); }
    let code = match tone {
        BadgeTone::Success => "32",
        BadgeTone::Warning => "33",
        BadgeTone::Info => "36",
        BadgeTone::Default => "0",
    };
    format!("\x1b[{}m{}\x1b[0m", code, label)
}

/// Print lines clipped to the terminal.
pub fn print_lines(lines: &[String]) {
    let maxw = terminal_width();
    for l in lines { println!("{}", fit_line_to_width(l, maxw)); }
}

pub fn terminal_width() -> usize {
    match terminal_size() {
        Some((Width(w), Height(_))) if w > 4 => (w - 4) as usize,
        _ => 100,
    }
}

/// Color only when stdout is a terminal and NO_COLOR is unset.
pub fn use_color() -> bool {
    std::env::var_os("NO_COLOR").is_none() && terminal_size().is_some()
}

fn build_separator(widths: &[usize]) -> String {
    let mut s = String::from("+");
    for w in widths {
        s.push_str(&"-".repeat(*w + 2));
        s.push('+');
    }
    s
}

fn build_header(cells: &[String], widths: &[usize], color: bool) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let text = truncate(cells.get(i).map(|c| c.as_str()).unwrap_or(""), *w);
        s.push(' ');
        if color { s.push_str(&format!("\x1b[32m{}\x1b[0m", text)); } else { s.push_str(&text); }
        s.push_str(&" ".repeat(w.saturating_sub(visible_len(&text))));
        s.push_str(" |");
    }
    s
}

fn build_row(cells: &[String], widths: &[usize]) -> String {
    let mut s = String::from("|");
    for (i, w) in widths.iter().enumerate() {
        let cell = cells.get(i).map(|c| c.as_str()).unwrap_or("");
        let text = truncate(cell, *w);
        let pad = " ".repeat(w.saturating_sub(visible_len(&text)));
        s.push(' ');
        if is_numeric_like(cell) {
            s.push_str(&pad);
            s.push_str(&text);
        } else {
            s.push_str(&text);
            s.push_str(&pad);
        }
        s.push_str(" |");
    }
    s
}

/// Truncate to `max` visible characters. Cells carrying ANSI codes are kept whole when they fit.
fn truncate(s: &str, max: usize) -> String {
    if visible_len(s) <= max { return s.to_string(); }
    let plain = strip_ansi(s);
    if max <= 1 { return "…".to_string(); }
    plain.chars().take(max - 1).collect::<String>() + "…"
}

fn is_numeric_like(s: &str) -> bool {
    let st = s.trim();
    !st.is_empty() && st.chars().all(|c| c.is_ascii_digit())
}

fn fit_line_to_width(s: &str, maxw: usize) -> String {
    if visible_len(s) <= maxw { return s.to_string(); }
    truncate(s, maxw)
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            if chars.peek() == Some(&'[') {
                chars.next();
                for c in chars.by_ref() {
                    if c.is_ascii_alphabetic() { break; }
                }
            }
            continue;
        }
        out.push(ch);
    }
    out
}

fn visible_len(s: &str) -> usize { strip_ansi(s).chars().count() }

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaints::Status;
    use chrono::{TimeZone, Utc};

    fn complaint(id: u64, text: &str) -> Complaint {
        Complaint {
            id,
            text: text.to_string(),
            status: Status::InReview,
            category: None,
            created_at: Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap(),
            updated_at: None,
            owner_user_id: None,
        }
    }

    #[test]
    fn table_fits_width() {
        let long = "x".repeat(200);
        let a = complaint(42, &long);
        let lines = complaint_table(&[&a], false).render(70, false);
        assert!(lines.iter().all(|l| visible_len(l) <= 70), "{:?}", lines);
        assert!(lines[3].contains("42"));
        assert!(lines[3].contains("In review"));
        assert!(lines[3].contains("General"));
    }

    #[test]
    fn ansi_is_not_counted() {
        assert_eq!(visible_len("\x1b[32mok\x1b[0m"), 2);
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(strip_ansi("\x1b[33mwarn\x1b[0m"), "warn");
    }

    #[test]
    fn signed_out_and_staff_session() {
        assert_eq!(session_lines(&Session::default()), vec!["Not signed in.".to_string()]);
        let s = Session { credential: "t".into(), is_privileged: true, identity_label: "staff1".into(), ..Default::default() };
        let lines = session_lines(&s);
        assert!(lines[1].ends_with("staff"));
        assert!(lines[2].ends_with("-"));
    }

    #[test]
    fn unexpected_history_rows_are_marked() {
        use crate::complaints::{Action, HistoryEntry};
        let row = HistoryEntry {
            id: 4,
            complaint_id: 42,
            action: Action::StatusChanged,
            actor_role: None,
            old_status: Some(Status::Rejected),
            new_status: Some(Status::Closed),
            comment: None,
            created_at: Utc.with_ymd_and_hms(2025, 10, 1, 9, 0, 0).unwrap(),
        };
        let lines = timeline_lines(&Timeline::from_entries(vec![row]));
        assert_eq!(lines.len(), 1);
        assert!(lines[0].ends_with("Rejected -> Closed (unexpected transition)"), "{}", lines[0]);
    }

    #[test]
    fn notice_without_color() {
        let n = Notice { tone: Tone::Warning, message: "Too many attempts.".into() };
        assert_eq!(notice_line(&n, false), "[warning] Too many attempts.");
    }
}
