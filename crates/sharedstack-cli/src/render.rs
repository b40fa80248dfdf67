use std::io::IsTerminal;
use std::time::Duration;

use anstyle::{AnsiColor, Effects, Style};
use indicatif::{ProgressBar, ProgressStyle};
use sharedstack_installer::{
    EvictionOutcome, LoaderMerge, PassReport, PointerChange, TagInstallOutcome,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum OutputStyle {
    Plain,
    Rich,
}

#[derive(Copy, Clone, Debug)]
pub(crate) struct TerminalRenderer {
    style: OutputStyle,
}

/// Spinner shown while a blocking step runs; absent in plain output.
pub(crate) struct Spinner {
    progress_bar: Option<ProgressBar>,
}

impl TerminalRenderer {
    pub(crate) fn current() -> Self {
        Self {
            style: current_output_style(),
        }
    }

    pub(crate) fn style(self) -> OutputStyle {
        self.style
    }

    pub(crate) fn start_spinner(self, label: &str) -> Spinner {
        if self.style == OutputStyle::Plain {
            return Spinner { progress_bar: None };
        }

        let progress_bar = ProgressBar::new_spinner();
        if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan.bold} {msg} {elapsed}") {
            progress_bar.set_style(style.tick_chars("|/-\\ "));
        }
        progress_bar.set_message(label.to_string());
        progress_bar.enable_steady_tick(Duration::from_millis(80));
        Spinner {
            progress_bar: Some(progress_bar),
        }
    }

    pub(crate) fn print_lines(self, lines: &[String]) {
        for line in lines {
            println!("{line}");
        }
    }
}

impl Spinner {
    pub(crate) fn finish(mut self) {
        if let Some(progress_bar) = self.progress_bar.take() {
            progress_bar.finish_and_clear();
        }
    }
}

pub(crate) fn current_output_style() -> OutputStyle {
    if std::io::stdout().is_terminal() {
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

fn render_section_header(style: OutputStyle, title: &str) -> Option<String> {
    match style {
        OutputStyle::Plain => None,
        OutputStyle::Rich => Some(colorize(section_style(), &format!("== {title} =="))),
    }
}

fn section_style() -> Style {
    Style::new()
        .fg_color(Some(AnsiColor::BrightBlue.into()))
        .effects(Effects::BOLD)
}

fn colorize(style: Style, text: &str) -> String {
    format!("{}{}{}", style.render(), text, style.render_reset())
}

/// Human-readable summary of one pass. Unchanged pointers and skipped
/// steps produce no lines.
pub(crate) fn format_pass_report(report: &PassReport, style: OutputStyle) -> Vec<String> {
    let mut lines = Vec::new();
    let section = |lines: &mut Vec<String>, title: &str| {
        if let Some(header) = render_section_header(style, title) {
            lines.push(header);
        }
    };
    let status = |badge: &str, message: String| render_status_line(style, badge, &message);

    if !report.reclaimed.is_empty() || !report.installs.is_empty() {
        section(&mut lines, "install");
    }
    for work in &report.reclaimed {
        lines.push(status(
            "step",
            format!("reclaimed abandoned work directory {}", work.path.display()),
        ));
        if let Some(teardown) = &work.teardown {
            lines.push(status(
                if teardown.failures.is_empty() { "ok" } else { "warn" },
                format!(
                    "finished evicting {} (removed {}, untagged {} packages)",
                    work.tag,
                    teardown.removed.len(),
                    teardown.undeclared.len()
                ),
            ));
            for failure in &teardown.failures {
                lines.push(status("warn", format!("{}: {failure}", work.tag)));
            }
        }
    }
    for install in &report.installs {
        let tag = &install.tag;
        lines.push(match &install.outcome {
            TagInstallOutcome::Installed { env_name } => {
                status("ok", format!("installed {tag} (environment {env_name})"))
            }
            TagInstallOutcome::LostRace => {
                status("step", format!("{tag} was installed by a concurrent run"))
            }
            TagInstallOutcome::Planned => status("step", format!("would install {tag}")),
            TagInstallOutcome::Failed { reason } => {
                status("error", format!("failed to install {tag}: {reason}"))
            }
        });
    }

    let pointers = &report.pointers;
    let mut pointer_lines = Vec::new();
    for (pointer, tag, change) in &pointers.symlinks {
        if let PointerChange::Repointed { .. } = change {
            pointer_lines.push(status("ok", format!("{pointer} -> {tag}")));
        }
    }
    if let LoaderMerge::Published { backed_up } = pointers.loader {
        let suffix = if backed_up { " (previous kept as .bak)" } else { "" };
        pointer_lines.push(status("ok", format!("published shared loader{suffix}")));
    }
    for binding in pointers.bindings.iter().filter(|binding| binding.declared > 0) {
        pointer_lines.push(status(
            "ok",
            format!(
                "{} package tags follow {} ({} declared)",
                binding.pointer, binding.source, binding.declared
            ),
        ));
    }
    for failure in &pointers.failures {
        pointer_lines.push(status("error", format!("pointer update failed: {failure}")));
    }
    if !pointer_lines.is_empty() {
        section(&mut lines, "pointers");
        lines.extend(pointer_lines);
    }

    if !report.evictions.is_empty() {
        section(&mut lines, "retention");
    }
    for eviction in &report.evictions {
        let tag = &eviction.tag;
        match &eviction.outcome {
            EvictionOutcome::Evicted { teardown } | EvictionOutcome::Planned { teardown } => {
                let verb = if matches!(eviction.outcome, EvictionOutcome::Planned { .. }) {
                    "would evict"
                } else {
                    "evicted"
                };
                lines.push(status(
                    if teardown.failures.is_empty() { "ok" } else { "warn" },
                    format!(
                        "{verb} {tag} (removed {}, untagged {} packages)",
                        teardown.removed.len(),
                        teardown.undeclared.len()
                    ),
                ));
                for failure in &teardown.failures {
                    lines.push(status("warn", format!("{tag}: {failure}")));
                }
            }
            EvictionOutcome::AlreadyEvicted => {
                lines.push(status("step", format!("{tag} was evicted by a concurrent run")));
            }
            EvictionOutcome::LedgerWriteFailed { reason } => {
                lines.push(status(
                    "error",
                    format!("kept {tag}: could not record it as retired: {reason}"),
                ));
            }
            EvictionOutcome::Failed { reason } => {
                lines.push(status("error", format!("failed to evict {tag}: {reason}")));
            }
        }
    }

    lines.push(if report.has_failures() {
        status("warn", "pass finished with failures".to_string())
    } else {
        status("ok", "stack is up to date".to_string())
    });
    lines
}
