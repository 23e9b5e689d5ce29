//! Application state and user actions.

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rand::Rng;
use serde::Serialize;
use tracing::{info, warn};

use crate::pipeline::Pipeline;
use crate::source::TelemetrySource;
use crate::ui::Theme;
use crate::{ConnectionState, Series};

/// Range the simulate action draws values from.
pub const SIMULATED_RANGE: std::ops::Range<f64> = 20.0..30.0;

/// How long a status message stays on screen.
const STATUS_MESSAGE_TTL: Duration = Duration::from_secs(3);

/// Opens a fresh source for the configured broker and topic.
pub type Reopen = Box<dyn FnMut() -> Result<Box<dyn TelemetrySource>>>;

/// What the connection details panel shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionDetails {
    pub broker: String,
    pub topic: String,
    pub field: String,
}

/// Main application state.
pub struct App {
    pub running: bool,
    pub show_help: bool,

    pipeline: Pipeline,
    reopen: Option<Reopen>,
    pub details: ConnectionDetails,

    // UI
    pub theme: Theme,

    // Status message (temporary feedback)
    pub status_message: Option<(String, Instant)>,
}

impl App {
    /// Create an app around a running pipeline.
    pub fn new(pipeline: Pipeline, details: ConnectionDetails) -> Self {
        Self::with_theme(pipeline, details, Theme::auto_detect())
    }

    /// Create an app with an explicit theme (skips terminal detection).
    pub fn with_theme(pipeline: Pipeline, details: ConnectionDetails, theme: Theme) -> Self {
        Self {
            running: true,
            show_help: false,
            pipeline,
            reopen: None,
            details,
            theme,
            status_message: None,
        }
    }

    /// Set how [`App::reconnect`] obtains a replacement source.
    pub fn with_reopen(mut self, reopen: Reopen) -> Self {
        self.reopen = Some(reopen);
        self
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Returns a description of the current source.
    pub fn source_description(&self) -> &str {
        self.pipeline.source_description()
    }

    pub fn state(&self) -> ConnectionState {
        self.pipeline.state()
    }

    pub fn snapshot(&self) -> Series {
        self.pipeline.snapshot()
    }

    /// Set a temporary status message that will be shown for a few seconds.
    pub fn set_status_message(&mut self, message: String) {
        self.status_message = Some((message, Instant::now()));
    }

    /// Get the current status message if it hasn't expired.
    pub fn get_status_message(&self) -> Option<&str> {
        if let Some((msg, time)) = &self.status_message {
            if time.elapsed() < STATUS_MESSAGE_TTL {
                return Some(msg);
            }
        }
        None
    }

    /// Pull everything the source has delivered into the window.
    ///
    /// Returns the number of readings appended.
    pub fn tick(&mut self) -> usize {
        self.pipeline.pump()
    }

    /// Append a random reading, as if one had arrived.
    pub fn simulate(&mut self) -> f64 {
        let value = rand::thread_rng().gen_range(SIMULATED_RANGE);
        self.pipeline.inject(value);
        value
    }

    /// Drop every reading in the window.
    pub fn clear(&mut self) {
        self.pipeline.clear();
        self.set_status_message("Cleared".to_string());
    }

    /// Tear down the current source and open a new one.
    ///
    /// The old source is closed before the new one is opened. If opening
    /// fails the pipeline is left disconnected and `R` can be pressed again.
    pub fn reconnect(&mut self) {
        let Some(reopen) = self.reopen.as_mut() else {
            self.set_status_message("Reconnect not available for this source".to_string());
            return;
        };

        match self.pipeline.reconfigure_with(|| reopen()) {
            Ok(()) => {
                info!(source = self.pipeline.source_description(), "reconnecting");
                self.set_status_message("Reconnecting...".to_string());
            }
            Err(e) => {
                warn!(error = %e, "reconnect failed");
                self.set_status_message(format!("Reconnect failed: {}", e));
            }
        }
    }

    /// Toggle the help overlay.
    pub fn toggle_help(&mut self) {
        self.show_help = !self.show_help;
    }

    /// Signal the application to quit.
    pub fn quit(&mut self) {
        self.running = false;
    }

    /// Write the current window to `path` as pretty JSON.
    pub fn export_series(&self, path: &Path) -> Result<()> {
        let export = SeriesExport {
            topic: &self.details.topic,
            field: self.pipeline.field(),
            window_size: self.pipeline.window_size(),
            state: self.pipeline.state(),
            points: self.pipeline.snapshot(),
        };

        let json = serde_json::to_string_pretty(&export)?;
        std::fs::write(path, json)
            .with_context(|| format!("failed to write {}", path.display()))?;

        info!(path = %path.display(), points = export.points.len(), "exported series");
        Ok(())
    }
}

#[derive(Serialize)]
struct SeriesExport<'a> {
    topic: &'a str,
    field: &'a str,
    window_size: usize,
    state: ConnectionState,
    points: Series,
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use crate::data::{PayloadDecoder, SeriesWindow};
    use crate::source::{ChannelFeed, ChannelSource};

    const TOPIC: &str = "ek/sensor/3";

    fn app(window: usize) -> (ChannelFeed, App) {
        let (feed, source) = ChannelSource::create(TOPIC, "test");
        let pipeline = Pipeline::new(
            Box::new(source),
            PayloadDecoder::new("3T0"),
            SeriesWindow::new(window).unwrap(),
        );
        let details = ConnectionDetails {
            broker: "ws://localhost:9001".into(),
            topic: TOPIC.into(),
            field: "3T0".into(),
        };
        (feed, App::with_theme(pipeline, details, Theme::dark()))
    }

    #[test]
    fn tick_pumps_the_pipeline() {
        let (feed, mut app) = app(5);
        feed.publish(TOPIC, r#"{"3T0": 21.5}"#);
        feed.publish(TOPIC, "oops");

        assert_eq!(app.tick(), 1);
        assert_eq!(app.snapshot().values().collect::<Vec<_>>(), vec![21.5]);
    }

    #[test]
    fn simulate_appends_value_in_range() {
        let (_feed, mut app) = app(5);
        for _ in 0..20 {
            let v = app.simulate();
            assert!(SIMULATED_RANGE.contains(&v));
        }
        assert_eq!(app.snapshot().len(), 5);
        assert_eq!(app.pipeline().stats().appended, 20);
    }

    #[test]
    fn clear_empties_window_and_sets_message() {
        let (_feed, mut app) = app(5);
        app.simulate();
        app.clear();

        assert!(app.snapshot().is_empty());
        assert_eq!(app.get_status_message(), Some("Cleared"));
    }

    #[test]
    fn reconnect_without_reopen_reports() {
        let (_feed, mut app) = app(5);
        app.simulate();
        app.reconnect();

        assert_eq!(app.snapshot().len(), 1);
        assert!(app.get_status_message().unwrap().contains("not available"));
    }

    #[test]
    fn reconnect_swaps_source_and_resets_window() {
        let (_old_feed, app) = app(5);
        let opened = Rc::new(Cell::new(0));
        let counter = opened.clone();
        let mut app = app.with_reopen(Box::new(move || -> Result<Box<dyn TelemetrySource>> {
            counter.set(counter.get() + 1);
            let (feed, source) = ChannelSource::create(TOPIC, "reopened");
            feed.set_state(ConnectionState::Connected);
            feed.publish(TOPIC, r#"{"3T0": 3}"#);
            Ok(Box::new(source))
        }));
        app.simulate();

        app.reconnect();

        assert_eq!(opened.get(), 1);
        assert!(app.snapshot().is_empty());
        assert_eq!(app.source_description(), "channel: reopened [ek/sensor/3]");
        assert_eq!(app.state(), ConnectionState::Connected);
    }

    #[test]
    fn reconnect_closes_old_source_before_opening_new() {
        let (old_feed, app) = app(5);
        let old_open_at_reopen = Rc::new(Cell::new(None));
        let seen = old_open_at_reopen.clone();
        let mut app = app.with_reopen(Box::new(move || -> Result<Box<dyn TelemetrySource>> {
            seen.set(Some(old_feed.publish(TOPIC, r#"{"3T0": 1}"#)));
            let (_feed, source) = ChannelSource::create(TOPIC, "reopened");
            Ok(Box::new(source))
        }));

        app.reconnect();

        assert_eq!(old_open_at_reopen.get(), Some(false));
    }

    #[test]
    fn failed_reconnect_leaves_pipeline_disconnected() {
        let (feed, app) = app(5);
        feed.set_state(ConnectionState::Connected);
        let mut app = app.with_reopen(Box::new(|| -> Result<Box<dyn TelemetrySource>> {
            anyhow::bail!("broker unreachable")
        }));
        app.simulate();
        app.reconnect();

        assert_eq!(app.state(), ConnectionState::Disconnected);
        assert!(app.snapshot().is_empty());
        assert!(!feed.publish(TOPIC, r#"{"3T0": 1}"#));
        assert_eq!(
            app.get_status_message(),
            Some("Reconnect failed: broker unreachable")
        );
    }

    #[test]
    fn export_writes_points_and_metadata() {
        let (feed, mut app) = app(3);
        feed.set_state(ConnectionState::Connected);
        for (i, v) in [10.0, 20.0, 30.0, 40.0].into_iter().enumerate() {
            feed.publish_at(TOPIC, format!(r#"{{"3T0": {v}}}"#), 1_000 + i as u64);
        }
        app.tick();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("series_export.json");
        app.export_series(&path).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(json["topic"], TOPIC);
        assert_eq!(json["field"], "3T0");
        assert_eq!(json["window_size"], 3);
        assert_eq!(json["state"], "Connected");

        let points = json["points"].as_array().unwrap();
        assert_eq!(points.len(), 3);
        assert_eq!(points[0]["value"], 20.0);
        assert_eq!(points[0]["timestamp_ms"], 1_001);
    }

    #[test]
    fn export_to_missing_directory_fails() {
        let (_feed, app) = app(3);
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("out.json");
        assert!(app.export_series(&path).is_err());
    }

    #[test]
    fn quit_and_help_toggle() {
        let (_feed, mut app) = app(3);
        app.toggle_help();
        assert!(app.show_help);
        app.quit();
        assert!(!app.running);
    }
}
