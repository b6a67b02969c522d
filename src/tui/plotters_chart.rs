//! Plotters-powered time series chart widget for Ratatui.
//!
//! Dates are plotted as days since the common era (`NaiveDate::num_days_from_ce`)
//! so the chart can stay on a plain `f64` cartesian grid.

use chrono::{Datelike, NaiveDate};
use plotters::prelude::*;
use plotters_ratatui_backend::widget_fn;
use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

/// Render-only chart description; all series and bounds are computed by the caller.
pub struct MacroPlottersChart<'a> {
    /// The selected indicator.
    pub series: &'a [(f64, f64)],
    /// Moving-average trend line.
    pub trend: &'a [(f64, f64)],
    /// Optional market overlay, already rescaled onto the y bounds.
    pub overlay: &'a [(f64, f64)],
    pub x_bounds: [f64; 2],
    pub y_bounds: [f64; 2],
    pub y_label: String,
    pub fmt_x: fn(f64) -> String,
    pub fmt_y: fn(f64) -> String,
}

impl<'a> Widget for MacroPlottersChart<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        // Plotters can fail to lay out a chart in a tiny area.
        if area.width < 20 || area.height < 8 {
            buf.set_string(
                area.x,
                area.y,
                "Chart area too small (resize terminal).",
                Style::default().fg(Color::Yellow),
            );
            return;
        }

        let x0 = self.x_bounds[0];
        let x1 = self.x_bounds[1];
        let y0 = self.y_bounds[0];
        let y1 = self.y_bounds[1];

        if !(x0.is_finite() && x1.is_finite() && y0.is_finite() && y1.is_finite()) || x1 <= x0 || y1 <= y0 {
            return;
        }

        let widget = widget_fn(move |root| {
            let mut chart = ChartBuilder::on(&root)
                .margin(1)
                .set_label_area_size(LabelAreaPosition::Left, 6)
                .set_label_area_size(LabelAreaPosition::Bottom, 3)
                .build_cartesian_2d(x0..x1, y0..y1)?;

            chart
                .configure_mesh()
                .disable_x_mesh()
                .disable_y_mesh()
                .x_desc("date")
                .y_desc(&self.y_label)
                .x_labels(5)
                .y_labels(5)
                .x_label_formatter(&|v| (self.fmt_x)(*v))
                .y_label_formatter(&|v| (self.fmt_y)(*v))
                .label_style(("sans-serif", 10).into_font().color(&WHITE))
                .axis_style(&WHITE)
                .bold_line_style(&WHITE)
                .draw()?;

            let series_color = RGBColor(0, 255, 255); // cyan
            let trend_color = RGBColor(255, 165, 0); // orange
            let overlay_color = RGBColor(200, 200, 200);

            // Overlay first so the macro series stays on top.
            if !self.overlay.is_empty() {
                chart.draw_series(LineSeries::new(self.overlay.iter().copied(), &overlay_color))?;
            }
            chart.draw_series(LineSeries::new(self.trend.iter().copied(), &trend_color))?;
            chart.draw_series(LineSeries::new(self.series.iter().copied(), &series_color))?;

            Ok(())
        });

        widget.render(area, buf);
    }
}

pub fn date_to_x(date: NaiveDate) -> f64 {
    f64::from(date.num_days_from_ce())
}

pub fn x_to_date(x: f64) -> Option<NaiveDate> {
    if !x.is_finite() {
        return None;
    }
    NaiveDate::from_num_days_from_ce_opt(x.round() as i32)
}
