//! Live chart and connection details panel.

use std::time::Duration;

use chrono::{Local, TimeZone};
use ratatui::{
    layout::{Alignment, Rect},
    style::{Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Frame,
};

use crate::app::App;
use crate::data::duration::format_duration;
use crate::source::now_ms;
use crate::Series;

/// X span used when the window holds a single point.
const MIN_SPAN_MS: f64 = 1_000.0;

/// Format a Unix-millisecond timestamp as local `HH:MM:SS`.
pub fn clock_label(timestamp_ms: u64) -> String {
    Local
        .timestamp_millis_opt(timestamp_ms as i64)
        .single()
        .map(|t| t.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "--:--:--".to_string())
}

/// Format the current value for display.
pub fn format_value(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}", v),
        None => "--".to_string(),
    }
}

/// X axis bounds in Unix milliseconds, widened if the series has no span.
pub fn time_bounds(series: &Series) -> Option<[f64; 2]> {
    let (first, last) = series.time_span()?;
    let (lo, hi) = (first as f64, last as f64);
    if hi - lo < MIN_SPAN_MS {
        let mid = (lo + hi) / 2.0;
        return Some([mid - MIN_SPAN_MS / 2.0, mid + MIN_SPAN_MS / 2.0]);
    }
    Some([lo, hi])
}

/// Y axis bounds from the data range, padded by 10% on each side.
///
/// Not anchored at zero. A flat series gets a fixed margin of one unit.
pub fn value_bounds(series: &Series) -> Option<[f64; 2]> {
    let (min, max) = series.value_bounds()?;
    let pad = if max > min { (max - min) * 0.1 } else { 1.0 };
    Some([min - pad, max + pad])
}

/// Render the chart of the current window.
pub fn render(frame: &mut Frame, app: &App, area: Rect) {
    let series = app.snapshot();
    let current = format_value(series.latest().map(|r| r.value));

    let block = Block::default()
        .title(Line::from(vec![
            Span::styled(format!(" {} ", app.details.field), app.theme.header),
            Span::raw("│ current: "),
            Span::styled(current, Style::default().add_modifier(Modifier::BOLD)),
            Span::raw(" "),
        ]))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    let (Some(x_bounds), Some(y_bounds)) = (time_bounds(&series), value_bounds(&series)) else {
        let waiting = Paragraph::new("\nWaiting for data...")
            .alignment(Alignment::Center)
            .style(app.theme.muted)
            .block(block);
        frame.render_widget(waiting, area);
        return;
    };

    let points: Vec<(f64, f64)> = series
        .iter()
        .filter(|r| r.value.is_finite())
        .map(|r| (r.timestamp_ms as f64, r.value))
        .collect();

    let dataset = Dataset::default()
        .name(app.details.field.as_str())
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(app.theme.series))
        .data(&points);

    let axis_style = Style::default().fg(app.theme.border);
    let x_labels = vec![
        clock_label(x_bounds[0] as u64),
        clock_label(((x_bounds[0] + x_bounds[1]) / 2.0) as u64),
        clock_label(x_bounds[1] as u64),
    ];
    let y_labels = vec![
        format!("{:.1}", y_bounds[0]),
        format!("{:.1}", (y_bounds[0] + y_bounds[1]) / 2.0),
        format!("{:.1}", y_bounds[1]),
    ];

    let chart = Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .style(axis_style)
                .bounds(x_bounds)
                .labels(x_labels),
        )
        .y_axis(
            Axis::default()
                .style(axis_style)
                .bounds(y_bounds)
                .labels(y_labels),
        );

    frame.render_widget(chart, area);
}

/// Render the connection details panel.
pub fn render_details(frame: &mut Frame, app: &App, area: Rect) {
    let pipeline = app.pipeline();
    let state = pipeline.state();
    let stats = pipeline.stats();
    let label = |s: &'static str| Span::styled(s, app.theme.muted);

    let last_update = match pipeline.latest() {
        Some(reading) => {
            let age = Duration::from_millis(now_ms().saturating_sub(reading.timestamp_ms));
            format!(
                "{} ({} ago)",
                clock_label(reading.timestamp_ms),
                format_duration(age)
            )
        }
        None => "Waiting...".to_string(),
    };

    let lines = vec![
        Line::from(vec![label("Broker   "), Span::raw(app.details.broker.as_str())]),
        Line::from(vec![label("Topic    "), Span::raw(app.details.topic.as_str())]),
        Line::from(vec![label("Field    "), Span::raw(app.details.field.as_str())]),
        Line::from(vec![
            label("Status   "),
            Span::styled(state.label(), app.theme.state_style(state)),
        ]),
        Line::from(vec![label("Updated  "), Span::raw(last_update)]),
        Line::from(""),
        Line::from(vec![
            label("Window   "),
            Span::raw(format!("{}/{}", pipeline.len(), pipeline.window_size())),
        ]),
        Line::from(vec![label("Received "), Span::raw(stats.received.to_string())]),
        Line::from(vec![label("Appended "), Span::raw(stats.appended.to_string())]),
        Line::from(vec![label("Skipped  "), Span::raw(stats.skipped.to_string())]),
        Line::from(vec![label("Errors   "), Span::raw(stats.decode_errors.to_string())]),
    ];

    let block = Block::default()
        .title(Span::styled(" Connection Details ", app.theme.header))
        .borders(Borders::ALL)
        .border_type(app.theme.border_type)
        .border_style(Style::default().fg(app.theme.border));

    frame.render_widget(Paragraph::new(lines).block(block), area);
}
