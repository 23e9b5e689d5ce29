//! Theme configuration for the TUI.
//!
//! Supports light and dark themes with automatic terminal detection.

use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::block::BorderType;

use crate::{ConnectionState, Indicator};

/// Color and style theme for the TUI.
///
/// Use [`Theme::auto_detect()`] for automatic theme selection based on
/// terminal background, or [`Theme::dark()`]/[`Theme::light()`] explicitly.
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent color for titles and active elements.
    pub highlight: Color,
    /// Color of the plotted series.
    pub series: Color,
    /// Color for a live connection.
    pub up: Color,
    /// Color while waiting on the broker.
    pub pending: Color,
    /// Color for a connection that will not deliver data.
    pub down: Color,
    /// Color for borders, axes and separators.
    pub border: Color,
    /// Style for panel titles and labels.
    pub header: Style,
    /// Style for secondary text.
    pub muted: Style,
    /// Border style (rounded, plain, etc.).
    pub border_type: BorderType,
}

impl Theme {
    /// Create a dark theme suitable for dark terminal backgrounds.
    pub fn dark() -> Self {
        Self {
            highlight: Color::Cyan,
            series: Color::LightGreen,
            up: Color::Green,
            pending: Color::Yellow,
            down: Color::Red,
            border: Color::Gray,
            header: Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::Gray),
            border_type: BorderType::Rounded,
        }
    }

    /// Create a light theme suitable for light terminal backgrounds.
    pub fn light() -> Self {
        Self {
            highlight: Color::Blue,
            series: Color::Green,
            up: Color::Green,
            pending: Color::Yellow,
            down: Color::Red,
            border: Color::DarkGray,
            header: Style::default().fg(Color::Blue).add_modifier(Modifier::BOLD),
            muted: Style::default().fg(Color::DarkGray),
            border_type: BorderType::Rounded,
        }
    }

    /// Auto-detect based on terminal background
    pub fn auto_detect() -> Self {
        match terminal_light::luma() {
            Ok(luma) if luma > 0.5 => Self::light(),
            _ => Self::dark(),
        }
    }

    /// Get style for a connection state
    pub fn state_style(&self, state: ConnectionState) -> Style {
        match state.indicator() {
            Indicator::Up => Style::default().fg(self.up),
            Indicator::Pending => Style::default().fg(self.pending),
            Indicator::Down => Style::default().fg(self.down).add_modifier(Modifier::BOLD),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_colors_follow_indicator() {
        let theme = Theme::dark();
        assert_eq!(theme.state_style(ConnectionState::Connected).fg, Some(Color::Green));
        assert_eq!(theme.state_style(ConnectionState::Connecting).fg, Some(Color::Yellow));
        assert_eq!(theme.state_style(ConnectionState::TransportError).fg, Some(Color::Red));
    }
}
