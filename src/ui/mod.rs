//! Terminal rendering.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │ ● SENSORWATCH │ ek/sensor/3 │ Connected               │  header
//! ├────────────────────────────────────┬──────────────────┤
//! │ chart                              │ Connection       │
//! │                                    │ Details          │
//! ├────────────────────────────────────┴──────────────────┤
//! │ s:simulate c:clear R:reconnect e:export ?:help q:quit │  status bar
//! └───────────────────────────────────────────────────────┘
//! ```

pub mod chart;
pub mod common;
pub mod theme;

pub use theme::Theme;

use ratatui::{
    layout::{Alignment, Constraint, Layout, Rect},
    style::{Color, Style},
    widgets::Paragraph,
    Frame,
};

use crate::app::App;

/// Minimum terminal size for usable display
pub const MIN_WIDTH: u16 = 60;
pub const MIN_HEIGHT: u16 = 12;

/// Width of the connection details panel.
const DETAILS_WIDTH: u16 = 34;

/// Draw one full frame.
pub fn render(frame: &mut Frame, app: &App) {
    let area = frame.area();

    if area.width < MIN_WIDTH || area.height < MIN_HEIGHT {
        render_too_small(frame, area);
        return;
    }

    let rows = Layout::vertical([
        Constraint::Length(1), // Header bar
        Constraint::Min(8),    // Chart and details
        Constraint::Length(1), // Status bar
    ])
    .split(area);

    let body = Layout::horizontal([Constraint::Min(20), Constraint::Length(DETAILS_WIDTH)])
        .split(rows[1]);

    common::render_header(frame, app, rows[0]);
    chart::render(frame, app, body[0]);
    chart::render_details(frame, app, body[1]);
    common::render_status_bar(frame, app, rows[2]);

    if app.show_help {
        common::render_help(frame, app, area);
    }
}

fn render_too_small(frame: &mut Frame, area: Rect) {
    let msg = format!(
        "Terminal too small: {}x{}\nMinimum: {}x{}\n\nResize to continue",
        area.width, area.height, MIN_WIDTH, MIN_HEIGHT
    );
    let paragraph = Paragraph::new(msg)
        .alignment(Alignment::Center)
        .style(Style::default().fg(Color::Yellow));
    let top = area.height.saturating_sub(5) / 2;
    let centered = Rect::new(area.x, area.y + top, area.width, area.height.min(5));
    frame.render_widget(paragraph, centered);
}


#[cfg(test)]
mod tests {
    use super::test_support::{app, draw};

    #[test]
    fn small_terminal_shows_resize_hint() {
        let (_feed, app) = app();
        let text = draw(&app, 40, 10);
        assert!(text.contains("Terminal too small: 40x10"));
    }

    #[test]
    fn full_frame_has_all_panels() {
        let (_feed, app) = app();
        let text = draw(&app, 100, 24);
        assert!(text.contains("SENSORWATCH"));
        assert!(text.contains("Connection Details"));
        assert!(text.contains("q:quit"));
    }

    #[test]
    fn help_overlay_is_drawn_on_top() {
        let (_feed, mut app) = app();
        app.toggle_help();
        let text = draw(&app, 100, 30);
        assert!(text.contains("Keyboard Shortcuts"));
        assert!(text.contains("Simulate a reading"));
    }
}
