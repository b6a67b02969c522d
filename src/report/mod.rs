//! Reporting: alert sinks, CLI summaries and dashboard analytics.

pub mod alert;
pub mod analytics;
pub mod format;

pub use alert::{AlertSink, TerminalAlertSink, format_alert};
pub use format::{format_calendar, format_cycle_summary};
