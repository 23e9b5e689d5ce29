use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};

use crate::app::App;

/// File the export key writes to, relative to the working directory.
pub const EXPORT_FILE: &str = "series_export.json";

/// Poll for events with a timeout
pub fn poll_event(timeout: Duration) -> Result<Option<Event>> {
    if event::poll(timeout)? {
        Ok(Some(event::read()?))
    } else {
        Ok(None)
    }
}

/// Handle a key event
pub fn handle_key_event(app: &mut App, key: KeyEvent) {
    // Windows reports releases too
    if key.kind == KeyEventKind::Release {
        return;
    }

    // If help is shown, any key closes it
    if app.show_help {
        app.show_help = false;
        return;
    }

    match key.code {
        KeyCode::Char('q') => app.quit(),

        KeyCode::Char('s') => {
            let value = app.simulate();
            app.set_status_message(format!("Simulated reading: {:.2}", value));
        }

        KeyCode::Char('c') => app.clear(),

        KeyCode::Char('R') => app.reconnect(),

        KeyCode::Char('?') => app.toggle_help(),

        KeyCode::Char('e') => {
            let export_path = PathBuf::from(EXPORT_FILE);
            match app.export_series(&export_path) {
                Ok(()) => {
                    app.set_status_message(format!("Exported to {}", export_path.display()));
                }
                Err(e) => {
                    app.set_status_message(format!("Export failed: {}", e));
                }
            }
        }

        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use crossterm::event::KeyModifiers;

    use super::*;
    use crate::app::ConnectionDetails;
    use crate::data::{PayloadDecoder, SeriesWindow};
    use crate::pipeline::Pipeline;
    use crate::source::ChannelSource;
    use crate::ui::Theme;

    fn app() -> App {
        let (_feed, source) = ChannelSource::create("t", "test");
        let pipeline = Pipeline::new(
            Box::new(source),
            PayloadDecoder::default(),
            SeriesWindow::new(4).unwrap(),
        );
        App::with_theme(pipeline, ConnectionDetails::default(), Theme::dark())
    }

    fn press(app: &mut App, c: char) {
        handle_key_event(app, KeyEvent::new(KeyCode::Char(c), KeyModifiers::NONE));
    }

    #[test]
    fn q_quits() {
        let mut app = app();
        press(&mut app, 'q');
        assert!(!app.running);
    }

    #[test]
    fn s_simulates_and_c_clears() {
        let mut app = app();
        press(&mut app, 's');
        press(&mut app, 's');
        assert_eq!(app.snapshot().len(), 2);
        assert!(app.get_status_message().unwrap().starts_with("Simulated reading"));

        press(&mut app, 'c');
        assert!(app.snapshot().is_empty());
    }

    #[test]
    fn help_swallows_next_key() {
        let mut app = app();
        press(&mut app, '?');
        assert!(app.show_help);

        press(&mut app, 'q');
        assert!(!app.show_help);
        assert!(app.running);
    }

    #[test]
    fn esc_closes_help() {
        let mut app = app();
        app.toggle_help();
        handle_key_event(&mut app, KeyEvent::new(KeyCode::Esc, KeyModifiers::NONE));
        assert!(!app.show_help);
    }

    #[test]
    fn key_release_is_ignored() {
        let mut app = app();
        let mut key = KeyEvent::new(KeyCode::Char('q'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        handle_key_event(&mut app, key);
        assert!(app.running);
    }

    #[test]
    fn unknown_keys_do_nothing() {
        let mut app = app();
        press(&mut app, 'x');
        assert!(app.running);
        assert!(app.snapshot().is_empty());
    }
}
