//! Ratatui-based dashboard over the stored series.
//!
//! Three tabs: analytics (chart + stats for one indicator), a data log of all
//! observations, and the release calendar. Market overlays are fetched from
//! FRED on demand and cached for the session.

use std::collections::HashMap;
use std::io;
use std::time::Duration;

use chrono::NaiveDate;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{
    Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, ListState, Paragraph, Row, Table},
};

use crate::data::FredClient;
use crate::domain::{CalendarRow, Series};
use crate::error::AppError;
use crate::io::{CsvStore, Registry};
use crate::report::analytics::{
    OVERLAY_ASSETS, Snapshot, chart_window, data_log, format_correlation, order_by_registry,
    overlay_correlation, rescale_onto, scale_for_display, trend_points, window_stats, y_bounds,
};

mod plotters_chart;

use plotters_chart::{MacroPlottersChart, date_to_x, x_to_date};

/// Start the dashboard.
pub fn run(registry: Registry, store: CsvStore, fred: FredClient) -> Result<(), AppError> {
    let mut app = App::new(registry, store, fred)?;

    let _guard = TerminalGuard::new()?;
    let backend = CrosstermBackend::new(io::stdout());
    let mut terminal =
        Terminal::new(backend).map_err(|e| AppError::io(format!("Failed to initialize terminal: {e}")))?;

    app.event_loop(&mut terminal)
}

/// Ensures the terminal is restored (raw mode, alternate screen) on exit.
struct TerminalGuard;

impl TerminalGuard {
    fn new() -> Result<Self, AppError> {
        enable_raw_mode().map_err(|e| AppError::io(format!("Failed to enable raw mode: {e}")))?;
        if let Err(e) = execute!(io::stdout(), EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(AppError::io(format!("Failed to enter alternate screen: {e}")));
        }
        Ok(Self)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tab {
    Analytics,
    DataLog,
    Calendar,
}

impl Tab {
    const ALL: [Tab; 3] = [Tab::Analytics, Tab::DataLog, Tab::Calendar];

    fn title(self) -> &'static str {
        match self {
            Tab::Analytics => "Analytics",
            Tab::DataLog => "Data Log",
            Tab::Calendar => "Calendar",
        }
    }

    fn next(self) -> Self {
        match self {
            Tab::Analytics => Tab::DataLog,
            Tab::DataLog => Tab::Calendar,
            Tab::Calendar => Tab::Analytics,
        }
    }
}

struct App {
    registry: Registry,
    store: CsvStore,
    fred: FredClient,
    series: Vec<Series>,
    calendar: Option<Vec<CalendarRow>>,
    tab: Tab,
    selected: usize,
    overlay: usize,
    overlay_cache: HashMap<&'static str, Vec<(NaiveDate, f64)>>,
    log_offset: usize,
    status: String,
}

impl App {
    fn new(registry: Registry, store: CsvStore, fred: FredClient) -> Result<Self, AppError> {
        let mut app = Self {
            registry,
            store,
            fred,
            series: Vec::new(),
            calendar: None,
            tab: Tab::Analytics,
            selected: 0,
            overlay: 0,
            overlay_cache: HashMap::new(),
            log_offset: 0,
            status: String::new(),
        };
        app.reload()?;
        Ok(app)
    }

    fn reload(&mut self) -> Result<(), AppError> {
        let series = self.store.load_all()?.into_iter().map(scale_for_display).collect();
        self.series = order_by_registry(series, &self.registry);
        self.calendar = self.store.load_calendar()?;
        self.selected = self.selected.min(self.series.len().saturating_sub(1));
        self.status = format!(
            "Loaded {} series from {}",
            self.series.len(),
            self.store.dir().display()
        );
        Ok(())
    }

    fn event_loop<B: ratatui::backend::Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<(), AppError> {
        let mut needs_redraw = true;
        loop {
            if needs_redraw {
                terminal
                    .draw(|f| self.draw(f))
                    .map_err(|e| AppError::io(format!("Terminal draw error: {e}")))?;
                needs_redraw = false;
            }

            if !event::poll(Duration::from_millis(100))
                .map_err(|e| AppError::io(format!("Event poll error: {e}")))?
            {
                continue;
            }

            match event::read().map_err(|e| AppError::io(format!("Event read error: {e}")))? {
                Event::Key(key) => {
                    if key.kind != KeyEventKind::Press {
                        continue;
                    }
                    if self.handle_key(key.code) {
                        break;
                    }
                    needs_redraw = true;
                }
                Event::Resize(_, _) => {
                    needs_redraw = true;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Returns `true` when the user asked to quit.
    fn handle_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return true,
            KeyCode::Tab => self.tab = self.tab.next(),
            KeyCode::Up => match self.tab {
                Tab::DataLog => self.log_offset = self.log_offset.saturating_sub(1),
                _ => self.selected = self.selected.saturating_sub(1),
            },
            KeyCode::Down => match self.tab {
                Tab::DataLog => self.log_offset = self.log_offset.saturating_add(1),
                _ => {
                    if self.selected + 1 < self.series.len() {
                        self.selected += 1;
                    }
                }
            },
            KeyCode::Left => self.cycle_overlay(OVERLAY_ASSETS.len() - 1),
            KeyCode::Right => self.cycle_overlay(1),
            KeyCode::Char('r') => {
                if let Err(e) = self.reload() {
                    self.status = format!("Reload failed: {e}");
                }
            }
            _ => {}
        }
        false
    }

    fn cycle_overlay(&mut self, step: usize) {
        self.overlay = (self.overlay + step) % OVERLAY_ASSETS.len();
        let asset = OVERLAY_ASSETS[self.overlay];
        let Some(id) = asset.series_id else {
            self.status = "Overlay: none".to_string();
            return;
        };
        if self.overlay_cache.contains_key(id) {
            self.status = format!("Overlay: {}", asset.label);
            return;
        }
        match self.fred.fetch_points(id) {
            Ok(points) => {
                self.status = format!("Overlay: {} ({} points)", asset.label, points.len());
                self.overlay_cache.insert(id, points);
            }
            Err(e) => {
                self.status = format!("Overlay {} unavailable: {e}", asset.label);
            }
        }
    }

    fn overlay_points(&self) -> Option<&[(NaiveDate, f64)]> {
        let id = OVERLAY_ASSETS[self.overlay].series_id?;
        self.overlay_cache.get(id).map(Vec::as_slice)
    }

    fn current(&self) -> Option<&Series> {
        self.series.get(self.selected)
    }

    fn draw(&mut self, frame: &mut ratatui::Frame<'_>) {
        let size = frame.area();
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(3),
                Constraint::Length(4),
                Constraint::Min(0),
                Constraint::Length(3),
            ])
            .split(size);

        self.draw_header(frame, chunks[0]);
        self.draw_snapshots(frame, chunks[1]);
        match self.tab {
            Tab::Analytics => self.draw_analytics(frame, chunks[2]),
            Tab::DataLog => self.draw_data_log(frame, chunks[2]),
            Tab::Calendar => self.draw_calendar(frame, chunks[2]),
        }
        self.draw_footer(frame, chunks[3]);
    }

    fn draw_header(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let mut spans = vec![
            Span::styled("mtrack", Style::default().fg(Color::Cyan)),
            Span::raw(" macro dashboard   "),
        ];
        for tab in Tab::ALL {
            let style = if tab == self.tab {
                Style::default().fg(Color::Black).bg(Color::White)
            } else {
                Style::default().fg(Color::Gray)
            };
            spans.push(Span::styled(format!(" {} ", tab.title()), style));
            spans.push(Span::raw(" "));
        }

        let p = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_snapshots(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        if self.series.is_empty() {
            let p = Paragraph::new("No stored series.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default().borders(Borders::ALL));
            frame.render_widget(p, area);
            return;
        }

        let n = self.series.len() as u32;
        let constraints: Vec<Constraint> = (0..n).map(|_| Constraint::Ratio(1, n)).collect();
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(constraints)
            .split(area);

        for (i, series) in self.series.iter().enumerate() {
            let Some(snap) = Snapshot::of(series) else {
                continue;
            };
            let delta_color = match snap.delta {
                Some(d) if d > 0.0 => Color::Green,
                Some(d) if d < 0.0 => Color::Red,
                _ => Color::Gray,
            };
            let text = Text::from(vec![Line::from(vec![
                Span::styled(snap.value_text(), Style::default().add_modifier(Modifier::BOLD)),
                Span::raw(" "),
                Span::styled(snap.delta_text(), Style::default().fg(delta_color)),
            ])]);
            let border = if i == self.selected {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default()
            };
            let p = Paragraph::new(text).block(
                Block::default()
                    .title(snap.indicator)
                    .borders(Borders::ALL)
                    .border_style(border),
            );
            frame.render_widget(p, cells[i]);
        }
    }

    fn draw_analytics(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Min(0), Constraint::Length(34)])
            .split(area);

        self.draw_chart(frame, chunks[0]);

        let side = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(0), Constraint::Length(9)])
            .split(chunks[1]);
        self.draw_series_list(frame, side[0]);
        self.draw_stats(frame, side[1]);
    }

    fn draw_chart(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let title = self
            .current()
            .map(|s| format!("{} (last 10y)", s.indicator))
            .unwrap_or_else(|| "Chart".to_string());
        let block = Block::default().title(title).borders(Borders::ALL);
        let inner = block.inner(area);
        frame.render_widget(block, area);
        frame.render_widget(Clear, inner);

        let Some(data) = self.current().and_then(|s| chart_data(s, self.overlay_points())) else {
            let msg = Paragraph::new("No data for this indicator.")
                .style(Style::default().fg(Color::Yellow))
                .block(Block::default());
            frame.render_widget(msg, inner);
            return;
        };

        let (chart_rect, insets) = chart_layout(inner);
        let widget = MacroPlottersChart {
            series: &data.series,
            trend: &data.trend,
            overlay: &data.overlay,
            x_bounds: data.x_bounds,
            y_bounds: data.y_bounds,
            y_label: "value".to_string(),
            fmt_x: fmt_axis_date,
            fmt_y: fmt_axis_value,
        };

        frame.render_widget(widget, chart_rect);
        if let Some(insets) = insets {
            draw_axis_ticks(frame, inner, chart_rect, insets, data.x_bounds, data.y_bounds);
        }
    }

    fn draw_series_list(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let items: Vec<ListItem> = self
            .series
            .iter()
            .map(|s| ListItem::new(format!("{} [{}]", s.indicator, s.source)))
            .collect();

        let list = List::new(items)
            .block(Block::default().title("Indicators").borders(Borders::ALL))
            .highlight_style(Style::default().fg(Color::Black).bg(Color::White))
            .highlight_symbol("» ");

        let mut state = ListState::default();
        if !self.series.is_empty() {
            state.select(Some(self.selected));
        }
        frame.render_stateful_widget(list, area, &mut state);
    }

    fn draw_stats(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let asset = OVERLAY_ASSETS[self.overlay];
        let mut lines = Vec::new();

        match self.current().and_then(window_stats) {
            Some(stats) => {
                let vol = stats
                    .volatility
                    .map(|v| format!("{v:.3}"))
                    .unwrap_or_else(|| "N/A".to_string());
                lines.push(Line::from(format!("12m volatility: {vol}")));
                lines.push(Line::from(format!("12m high:       {:.2}", stats.high)));
                lines.push(Line::from(format!("12m low:        {:.2}", stats.low)));
            }
            None => lines.push(Line::from("No statistics.")),
        }

        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!("Overlay: {}", asset.label),
            Style::default().fg(Color::Gray),
        )));
        let corr = match (self.current(), self.overlay_points()) {
            (Some(series), Some(points)) => overlay_correlation(series, points),
            _ => None,
        };
        lines.push(Line::from(format!("Correlation: {}", format_correlation(corr))));

        let p = Paragraph::new(Text::from(lines))
            .block(Block::default().title("Stats").borders(Borders::ALL));
        frame.render_widget(p, area);
    }

    fn draw_data_log(&mut self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let rows = data_log(&self.series);
        let visible = area.height.saturating_sub(3) as usize;
        self.log_offset = self.log_offset.min(rows.len().saturating_sub(visible));

        let body: Vec<Row> = rows
            .iter()
            .skip(self.log_offset)
            .take(visible)
            .map(|r| {
                Row::new(vec![
                    Cell::from(r.date.format("%Y-%m-%d").to_string()),
                    Cell::from(format!("{:.3}", r.value)),
                    Cell::from(r.indicator.clone()),
                    Cell::from(r.source.clone()),
                ])
            })
            .collect();

        let header = Row::new(vec!["Date", "Value", "Indicator", "Source"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let table = Table::new(
            body,
            [
                Constraint::Length(12),
                Constraint::Length(14),
                Constraint::Min(20),
                Constraint::Length(8),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .title(format!("Data Log ({} rows)", rows.len()))
                .borders(Borders::ALL),
        );
        frame.render_widget(table, area);
    }

    fn draw_calendar(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let block = Block::default().title("Release Calendar").borders(Borders::ALL);
        let Some(rows) = &self.calendar else {
            let p = Paragraph::new("Calendar not found. Run `mtrack once` to build it.")
                .style(Style::default().fg(Color::Yellow))
                .block(block);
            frame.render_widget(p, area);
            return;
        };

        let body: Vec<Row> = rows
            .iter()
            .map(|r| {
                Row::new(vec![
                    r.indicator.clone(),
                    r.source.clone(),
                    r.next_release.clone(),
                    r.last_updated.clone(),
                ])
            })
            .collect();
        let header = Row::new(vec!["Indicator", "Source", "Next Release", "Last Updated"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let table = Table::new(
            body,
            [
                Constraint::Min(20),
                Constraint::Length(8),
                Constraint::Length(18),
                Constraint::Length(18),
            ],
        )
        .header(header)
        .block(block);
        frame.render_widget(table, area);
    }

    fn draw_footer(&self, frame: &mut ratatui::Frame<'_>, area: Rect) {
        let help = "Tab switch  ↑/↓ select  ←/→ overlay  r reload  q quit";
        let line = Line::from(vec![
            Span::styled(help, Style::default().fg(Color::Gray)),
            Span::raw(" | "),
            Span::styled(&self.status, Style::default().fg(Color::Yellow)),
        ]);
        let p = Paragraph::new(line).block(Block::default().borders(Borders::ALL));
        frame.render_widget(p, area);
    }
}

/// Plot-ready series for the analytics chart.
#[derive(Debug, Clone, PartialEq)]
struct ChartData {
    series: Vec<(f64, f64)>,
    trend: Vec<(f64, f64)>,
    overlay: Vec<(f64, f64)>,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
}

fn chart_data(series: &Series, overlay: Option<&[(NaiveDate, f64)]>) -> Option<ChartData> {
    let window = chart_window(series);
    let first = window.first()?.date;
    let last = window.last()?.date;

    let values: Vec<f64> = window.iter().map(|o| o.value).collect();
    let (y0, y1) = y_bounds(&values)?;

    let mut x_bounds = [date_to_x(first), date_to_x(last)];
    if x_bounds[1] <= x_bounds[0] {
        x_bounds = [x_bounds[0] - 15.0, x_bounds[1] + 15.0];
    }

    let points = window.iter().map(|o| (date_to_x(o.date), o.value)).collect();
    let trend = trend_points(window)
        .into_iter()
        .map(|(d, v)| (date_to_x(d), v))
        .collect();

    let overlay = overlay
        .map(|pts| {
            let in_range: Vec<(NaiveDate, f64)> = pts
                .iter()
                .copied()
                .filter(|(d, _)| *d >= first && *d <= last)
                .collect();
            rescale_onto(&in_range, y0, y1)
                .into_iter()
                .map(|(d, v)| (date_to_x(d), v))
                .collect()
        })
        .unwrap_or_default();

    Some(ChartData {
        series: points,
        trend,
        overlay,
        x_bounds,
        y_bounds: [y0, y1],
    })
}

fn fmt_axis_date(v: f64) -> String {
    x_to_date(v)
        .map(|d| d.format("%Y-%m").to_string())
        .unwrap_or_default()
}

fn fmt_axis_value(v: f64) -> String {
    format!("{v:.2}")
}

#[derive(Debug, Clone, Copy)]
struct AxisInsets {
    left: u16,
    right: u16,
    top: u16,
    bottom: u16,
}

fn chart_layout(inner: Rect) -> (Rect, Option<AxisInsets>) {
    let insets = AxisInsets {
        left: 9,
        right: 2,
        top: 1,
        bottom: 2,
    };

    if inner.width <= insets.left + insets.right + 10
        || inner.height <= insets.top + insets.bottom + 5
    {
        return (inner, None);
    }

    let rect = Rect {
        x: inner.x + insets.left,
        y: inner.y + insets.top,
        width: inner.width - insets.left - insets.right,
        height: inner.height - insets.top - insets.bottom,
    };

    (rect, Some(insets))
}

fn draw_axis_ticks(
    frame: &mut ratatui::Frame<'_>,
    inner: Rect,
    chart: Rect,
    insets: AxisInsets,
    x_bounds: [f64; 2],
    y_bounds: [f64; 2],
) {
    let ticks = 5usize;
    let style = Style::default().fg(Color::Gray);

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let x_val = x_bounds[0] + u * (x_bounds[1] - x_bounds[0]);
        let x = chart.x + ((chart.width - 1) as f64 * u).round() as u16;
        let label = fmt_axis_date(x_val);
        let label_len = label.len() as u16;
        let start = x.saturating_sub(label_len / 2);
        let y = chart.y + chart.height;
        if y >= inner.y + inner.height - 1 {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    for i in 0..ticks {
        let u = i as f64 / (ticks as f64 - 1.0);
        let y_val = y_bounds[0] + u * (y_bounds[1] - y_bounds[0]);
        let y = chart.y + (chart.height - 1) - ((chart.height - 1) as f64 * u).round() as u16;
        let label = fmt_axis_value(y_val);
        let label_len = label.len() as u16;
        let x = inner.x + insets.left.saturating_sub(1);
        let start = x.saturating_sub(label_len);
        if start < inner.x {
            continue;
        }
        frame.render_widget(
            Paragraph::new(label).style(style),
            Rect {
                x: start,
                y,
                width: label_len,
                height: 1,
            },
        );
    }

    let x_label = Paragraph::new("date")
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Gray));
    let x_rect = Rect {
        x: chart.x,
        y: chart.y + chart.height + 1,
        width: chart.width,
        height: 1,
    };
    if x_rect.y < inner.y + inner.height {
        frame.render_widget(x_label, x_rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Observation;

    fn d(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn monthly(n: u32) -> Series {
        Series {
            indicator: "US CPI".to_string(),
            source: "FRED".to_string(),
            observations: (0..n)
                .map(|i| Observation::new(d(2020 + (i / 12) as i32, i % 12 + 1), f64::from(i)))
                .collect(),
        }
    }

    #[test]
    fn chart_data_without_overlay() {
        let data = chart_data(&monthly(24), None).unwrap();
        assert_eq!(data.series.len(), 24);
        assert_eq!(data.trend.len(), 13);
        assert!(data.overlay.is_empty());
        assert_eq!(data.x_bounds, [date_to_x(d(2020, 1)), date_to_x(d(2021, 12))]);
        assert!(data.y_bounds[0] < 0.5 && data.y_bounds[1] > 22.5);
    }

    #[test]
    fn overlay_is_clipped_to_chart_dates_and_rescaled() {
        let overlay = vec![(d(2019, 1), 1.0), (d(2020, 6), 10.0), (d(2021, 6), 20.0)];
        let data = chart_data(&monthly(24), Some(&overlay)).unwrap();
        assert_eq!(data.overlay.len(), 2);
        assert_eq!(data.overlay[0].1, data.y_bounds[0]);
        assert!((data.overlay[1].1 - data.y_bounds[1]).abs() < 1e-9);
    }

    #[test]
    fn single_point_gets_a_nonzero_x_range() {
        let data = chart_data(&monthly(1), None).unwrap();
        assert!(data.x_bounds[1] > data.x_bounds[0]);
        assert!(data.y_bounds[1] > data.y_bounds[0]);
        assert!(chart_data(&Series::empty("X", "FRED"), None).is_none());
    }

    #[test]
    fn axis_dates_format_as_months() {
        assert_eq!(fmt_axis_date(date_to_x(d(2024, 3))), "2024-03");
    }

    #[test]
    fn tabs_cycle() {
        assert_eq!(Tab::Analytics.next(), Tab::DataLog);
        assert_eq!(Tab::Calendar.next(), Tab::Analytics);
    }
}
