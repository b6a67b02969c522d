//! Alert sinks: where classified releases go.

use std::io::{self, IsTerminal, Stdout, Write};

use crossterm::style::{Color, Stylize};
use tracing::warn;

use crate::domain::{Classification, ClassificationResult};

const BANNER_WIDTH: usize = 50;

/// Consumer of classification results. Fire-and-forget: a sink must swallow
/// (and log) its own failures.
pub trait AlertSink {
    fn emit(&mut self, result: &ClassificationResult);
}

/// Prints a framed, coloured alert to a terminal (or any writer).
pub struct TerminalAlertSink<W: Write = Stdout> {
    out: W,
    color: bool,
}

impl TerminalAlertSink<Stdout> {
    /// Stdout sink; colour only when stdout is a terminal.
    pub fn stdout() -> Self {
        let out = io::stdout();
        let color = out.is_terminal();
        Self { out, color }
    }
}

impl<W: Write> TerminalAlertSink<W> {
    pub fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> AlertSink for TerminalAlertSink<W> {
    fn emit(&mut self, result: &ClassificationResult) {
        let text = format_alert(result, self.color);
        let written = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(e) = written {
            warn!(indicator = %result.indicator, "Failed to print alert: {e}");
        }
    }
}

fn tone(classification: Classification) -> (Color, &'static str) {
    let label = classification.label();
    if label.contains("Positive") {
        (Color::Green, "▲")
    } else if label.contains("Negative") {
        (Color::Red, "▼")
    } else {
        (Color::Yellow, "◆")
    }
}

/// Render one alert block. With `color = false` the output is plain text.
pub fn format_alert(result: &ClassificationResult, color: bool) -> String {
    let (accent, icon) = tone(result.classification);
    let rule = "=".repeat(BANNER_WIDTH);

    let headline = format!(" {icon} MACRO EVENT DETECTED: {} ", result.indicator);
    let actual = format!("{}%", result.actual);
    let surprise = result.surprise.to_string();

    let (headline, actual, surprise) = if color {
        (
            headline.with(accent).bold().to_string(),
            actual.bold().to_string(),
            surprise.with(accent).to_string(),
        )
    } else {
        (headline, actual, surprise)
    };

    let mut out = String::new();
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&headline);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("Date:      {}\n", result.date.format("%Y-%m-%d")));
    out.push_str(&format!("Actual:    {actual}\n"));
    out.push_str(&format!("Expected:  {}%\n", result.expected));
    out.push_str(&format!("Surprise:  {surprise} (Z-Score: {})\n", result.z_score));
    out.push_str(&format!("Analysis:  {}\n", result.classification));
    out.push_str(&rule);
    out.push_str("\n\n");
    out
}
