use std::io::IsTerminal;
use std::time::{Duration, Instant};

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{HumanBytes, ProgressBar, ProgressStyle};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

pub(crate) struct TerminalProgress {
    style: OutputStyle,
    label: String,
    current: u64,
    total: Option<u64>,
    progress_bar: Option<ProgressBar>,
    started_at: Instant,
}

pub(crate) fn current_output_style() -> OutputStyle {
    output_style_for(
        std::io::stdout().is_terminal(),
        std::env::var_os("NO_COLOR").is_some(),
    )
}

pub(crate) fn output_style_for(is_terminal: bool, no_color: bool) -> OutputStyle {
    if is_terminal && !no_color {
        OutputStyle::Rich
    } else {
        OutputStyle::Plain
    }
}

pub(crate) fn render_status_line(style: OutputStyle, status: &str, message: &str) -> String {
    match style {
        OutputStyle::Plain => message.to_string(),
        OutputStyle::Rich => format!("{} {message}", status_badge(status)),
    }
}

fn status_badge(status: &str) -> &'static str {
    match status {
        "ok" => "[OK]",
        "warn" => "[WARN]",
        "error" => "[ERR]",
        _ => "[..]",
    }
}

/// Fatal error output: the top-level message, then one line per cause.
pub(crate) fn render_error_lines(style: OutputStyle, err: &anyhow::Error) -> Vec<String> {
    let headline = match style {
        OutputStyle::Plain => format!("error: {err}"),
        OutputStyle::Rich => render_status_line(style, "error", &err.to_string()),
    };
    let mut lines = vec![headline];
    lines.extend(err.chain().skip(1).map(|cause| format!("  caused by: {cause}")));
    lines
}

pub(crate) fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

impl TerminalProgress {
    pub(crate) fn start(style: OutputStyle, label: &str) -> Self {
        let progress_bar = if style == OutputStyle::Rich {
            let progress_bar = ProgressBar::new(0);
            if let Ok(template) = ProgressStyle::with_template(
                "{spinner:.cyan.bold} {msg:<10} [{bar:20.cyan/blue}] {bytes:>10}/{total_bytes:10} {elapsed_precise}",
            ) {
                progress_bar.set_style(template.tick_chars(".oO@* ").progress_chars("=>-"));
            }
            progress_bar.set_message(label.to_string());
            progress_bar.enable_steady_tick(Duration::from_millis(80));
            Some(progress_bar)
        } else {
            None
        };

        Self {
            style,
            label: label.to_string(),
            current: 0,
            total: None,
            progress_bar,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn set(&mut self, current: u64, total: Option<u64>) {
        self.current = current;
        self.total = total;

        let Some(progress_bar) = &self.progress_bar else {
            return;
        };
        if let Some(total) = total {
            progress_bar.set_length(total);
        }
        progress_bar.set_position(current);
    }

    pub(crate) fn finish_success(mut self) {
        let Some(progress_bar) = self.progress_bar.take() else {
            return;
        };

        progress_bar.finish_and_clear();
        if let Some(line) = render_progress_line(
            self.style,
            &self.label,
            self.current,
            self.total,
            Some(self.started_at.elapsed()),
        ) {
            println!("{line}");
        }
    }

    pub(crate) fn finish_abandon(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

fn format_elapsed(elapsed: Duration) -> String {
    let secs = elapsed.as_secs();
    let millis = elapsed.subsec_millis();
    format!("{secs}.{millis:03}s")
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn progress_label_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightCyan.into()))
        .effects(Effects::BOLD)
}

fn progress_bar_style() -> Style {
    Style::new().fg_color(Some(AnsiColor::BrightBlue.into()))
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Summary left behind once a rich progress bar is cleared. An unknown
/// total renders as a full bar.
pub(crate) fn render_progress_line(
    style: OutputStyle,
    label: &str,
    current: u64,
    total: Option<u64>,
    elapsed: Option<Duration>,
) -> Option<String> {
    if style == OutputStyle::Plain {
        return None;
    }

    let width = 18_usize;
    let safe_total = total.unwrap_or(current).max(1);
    let bounded_current = current.min(safe_total);
    let filled = ((bounded_current as usize) * width) / (safe_total as usize);
    let bar = format!(
        "{}{}",
        "=".repeat(filled),
        "-".repeat(width.saturating_sub(filled))
    );
    let percent = (bounded_current * 100) / safe_total;
    let suffix = elapsed
        .map(|value| format!(" complete in {}", format_elapsed(value)))
        .unwrap_or_default();

    Some(format!(
        "{} [{}] {:>3}% {}{}",
        colorize(progress_label_style(), label),
        colorize(progress_bar_style(), &bar),
        percent,
        HumanBytes(current),
        suffix
    ))
}
