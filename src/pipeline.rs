//! The ingestion pipeline: source, decoder and window glued together.
//!
//! [`Pipeline`] is the single consumer of a [`TelemetrySource`]. Each call to
//! [`Pipeline::pump`] takes up to one batch of what the transport has
//! delivered, decodes every payload and appends the resulting readings to the
//! window. Decode
//! failures are logged and counted here; they never reach the caller, and
//! they never touch the window or the connection state.

use tracing::{debug, info, trace, warn};

use crate::data::{PayloadDecoder, SeriesWindow};
use crate::source::{now_ms, TelemetrySource};
use crate::{ConnectionState, Reading, Series};

/// Default upper bound on messages taken by one [`Pipeline::pump`].
pub const DEFAULT_MAX_BATCH: usize = 256;

/// Counters describing what the pipeline has done with its input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Raw messages taken from the source.
    pub received: u64,
    /// Readings appended to the window, injected ones included.
    pub appended: u64,
    /// Well-formed payloads without a numeric value for the tracked field.
    pub skipped: u64,
    /// Payloads that were not a JSON object.
    pub decode_errors: u64,
}

/// Drives raw messages from a source into a bounded window.
///
/// # Example
///
/// ```
/// use sensorwatch::{ChannelSource, PayloadDecoder, Pipeline, SeriesWindow};
///
/// let (feed, source) = ChannelSource::create("ek/sensor/3", "demo");
/// let mut pipeline = Pipeline::new(
///     Box::new(source),
///     PayloadDecoder::new("3T0"),
///     SeriesWindow::new(3).unwrap(),
/// );
///
/// for payload in [r#"{"3T0": 10}"#, "garbage", r#"{"3T0": 20}"#] {
///     feed.publish("ek/sensor/3", payload);
/// }
///
/// assert_eq!(pipeline.pump(), 2);
/// assert_eq!(pipeline.stats().decode_errors, 1);
/// assert_eq!(pipeline.snapshot().values().collect::<Vec<_>>(), vec![10.0, 20.0]);
/// ```
#[derive(Debug)]
pub struct Pipeline {
    source: Box<dyn TelemetrySource>,
    decoder: PayloadDecoder,
    window: SeriesWindow,
    stats: PipelineStats,
    max_batch: usize,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn TelemetrySource>,
        decoder: PayloadDecoder,
        window: SeriesWindow,
    ) -> Self {
        info!(
            source = source.description(),
            field = decoder.field(),
            window = window.capacity(),
            "pipeline started"
        );
        Self {
            source,
            decoder,
            window,
            stats: PipelineStats::default(),
            max_batch: DEFAULT_MAX_BATCH,
        }
    }

    /// Limit how many messages one [`pump`](Self::pump) takes (minimum 1).
    pub fn with_max_batch(mut self, max_batch: usize) -> Self {
        self.max_batch = max_batch.max(1);
        self
    }

    /// Take up to one batch of waiting messages.
    ///
    /// Anything beyond the batch stays queued for the next call, so a source
    /// that keeps delivering cannot hold the caller here indefinitely.
    /// Returns the number of readings appended.
    pub fn pump(&mut self) -> usize {
        let mut appended = 0;

        for _ in 0..self.max_batch {
            let Some(message) = self.source.poll_message() else {
                break;
            };
            self.stats.received += 1;

            match self.decoder.decode(&message) {
                Ok(Some(reading)) => {
                    debug!(value = reading.value, topic = %message.topic, "accepted reading");
                    self.append(reading);
                    appended += 1;
                }
                Ok(None) => {
                    trace!(field = self.decoder.field(), "payload has no numeric value, skipped");
                    self.stats.skipped += 1;
                }
                Err(e) => {
                    warn!(error = %e, topic = %message.topic, "dropping undecodable payload");
                    self.stats.decode_errors += 1;
                }
            }
        }

        appended
    }

    /// Append a synthetic value stamped with the current time.
    pub fn inject(&mut self, value: f64) {
        self.inject_reading(Reading::new(now_ms(), value));
    }

    /// Append a synthetic reading through the same path decoded ones take.
    pub fn inject_reading(&mut self, reading: Reading) {
        debug!(value = reading.value, "injected reading");
        self.append(reading);
    }

    fn append(&mut self, reading: Reading) {
        self.window.append(reading);
        self.stats.appended += 1;
    }

    /// The source's current connection state.
    pub fn state(&self) -> ConnectionState {
        self.source.state()
    }

    /// An immutable copy of the window, oldest first.
    pub fn snapshot(&self) -> Series {
        self.window.snapshot()
    }

    /// The most recent reading, if any.
    pub fn latest(&self) -> Option<Reading> {
        self.window.latest()
    }

    pub fn stats(&self) -> PipelineStats {
        self.stats
    }

    /// Number of readings the window currently holds.
    pub fn len(&self) -> usize {
        self.window.len()
    }

    pub fn is_empty(&self) -> bool {
        self.window.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window.capacity()
    }

    pub fn field(&self) -> &str {
        self.decoder.field()
    }

    pub fn source_description(&self) -> &str {
        self.source.description()
    }

    /// Drop all readings and zero the counters. The source is untouched.
    pub fn clear(&mut self) {
        self.window.reset();
        self.stats = PipelineStats::default();
    }

    /// Replace the source.
    ///
    /// The old source is closed before the new one is installed, and the
    /// window is reset, so readings from two subscriptions never mix.
    pub fn reconfigure(&mut self, source: Box<dyn TelemetrySource>) {
        info!(
            from = self.source.description(),
            to = source.description(),
            "replacing source"
        );
        self.source.close();
        self.source = source;
        self.clear();
    }

    /// Close the current source, then build its replacement with `open`.
    ///
    /// The old source is fully torn down before `open` runs, so two
    /// subscriptions are never live at once. The window and counters are
    /// reset either way. If `open` fails the closed source stays installed
    /// and reports [`ConnectionState::Disconnected`] until the next attempt.
    pub fn reconfigure_with<E>(
        &mut self,
        open: impl FnOnce() -> Result<Box<dyn TelemetrySource>, E>,
    ) -> Result<(), E> {
        info!(from = self.source.description(), "closing source for replacement");
        self.source.close();
        self.clear();

        let source = open()?;
        info!(to = source.description(), "replacement source installed");
        self.source = source;
        Ok(())
    }

    /// Close the source and drop all readings.
    ///
    /// Safe to call more than once.
    pub fn shutdown(&mut self) {
        self.source.close();
        self.window.reset();
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use super::*;
    use crate::source::{ChannelFeed, ChannelSource, RawMessage};

    const TOPIC: &str = "ek/sensor/3";

    fn pipeline(window: usize) -> (ChannelFeed, Pipeline) {
        let (feed, source) = ChannelSource::create(TOPIC, "test");
        let pipeline = Pipeline::new(
            Box::new(source),
            PayloadDecoder::new("3T0"),
            SeriesWindow::new(window).unwrap(),
        );
        (feed, pipeline)
    }

    fn values(p: &Pipeline) -> Vec<f64> {
        p.snapshot().values().collect()
    }

    /// Source that records how many times it was closed.
    #[derive(Debug)]
    struct CountingSource {
        closes: Arc<AtomicUsize>,
        queued: Vec<RawMessage>,
    }

    impl TelemetrySource for CountingSource {
        fn poll_message(&mut self) -> Option<RawMessage> {
            if self.queued.is_empty() {
                None
            } else {
                Some(self.queued.remove(0))
            }
        }

        fn state(&self) -> ConnectionState {
            ConnectionState::Connected
        }

        fn description(&self) -> &str {
            "counting"
        }

        fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
            self.queued.clear();
        }
    }

    #[test]
    fn pump_appends_valid_readings_in_order() {
        let (feed, mut p) = pipeline(50);
        for v in [1.0, 2.0, 3.0] {
            feed.publish(TOPIC, format!(r#"{{"3T0": {v}}}"#));
        }

        assert_eq!(p.pump(), 3);
        assert_eq!(values(&p), vec![1.0, 2.0, 3.0]);
        assert_eq!(p.pump(), 0);
    }

    #[test]
    fn bad_payloads_leave_series_untouched() {
        let (feed, mut p) = pipeline(50);
        feed.publish(TOPIC, r#"{"3T0": 22.5}"#);
        p.pump();
        let before = p.snapshot();

        feed.publish(TOPIC, "{not json");
        feed.publish(TOPIC, r#"{"other": 5}"#);
        feed.publish(TOPIC, r#"{"3T0": "bad"}"#);
        feed.publish(TOPIC, "[1, 2]");

        assert_eq!(p.pump(), 0);
        assert_eq!(p.snapshot(), before);
        assert_eq!(
            p.stats(),
            PipelineStats {
                received: 5,
                appended: 1,
                skipped: 2,
                decode_errors: 2,
            }
        );
    }

    #[test]
    fn decode_errors_do_not_change_state() {
        let (feed, mut p) = pipeline(5);
        feed.set_state(ConnectionState::Connected);
        feed.publish(TOPIC, "garbage");
        p.pump();
        assert_eq!(p.state(), ConnectionState::Connected);
    }

    #[test]
    fn state_changes_do_not_touch_series() {
        let (feed, mut p) = pipeline(5);
        feed.publish(TOPIC, r#"{"3T0": 1}"#);
        p.pump();

        for state in ConnectionState::ALL {
            feed.set_state(state);
            p.pump();
            assert_eq!(p.state(), state);
            assert_eq!(values(&p), vec![1.0]);
        }
    }

    #[test]
    fn readings_are_stamped_at_receipt() {
        let (feed, mut p) = pipeline(5);
        feed.publish_at(TOPIC, r#"{"3T0": 4.5}"#, 12_345);
        p.pump();
        assert_eq!(p.latest(), Some(Reading::new(12_345, 4.5)));
    }

    #[test]
    fn inject_shares_the_append_path() {
        let (feed, mut p) = pipeline(3);
        feed.publish(TOPIC, r#"{"3T0": 10}"#);
        p.pump();
        p.inject(20.0);
        p.inject_reading(Reading::new(7, 30.0));
        p.inject(40.0);

        assert_eq!(values(&p), vec![20.0, 30.0, 40.0]);
        assert_eq!(p.stats().appended, 4);
        assert_eq!(p.stats().received, 1);
    }

    #[test]
    fn clear_resets_window_and_stats() {
        let (_feed, mut p) = pipeline(3);
        p.inject(1.0);
        p.clear();

        assert!(p.is_empty());
        assert_eq!(p.stats(), PipelineStats::default());
        assert_eq!(p.window_size(), 3);
    }

    #[test]
    fn reconfigure_closes_old_source_first() {
        let closes = Arc::new(AtomicUsize::new(0));
        let old = CountingSource {
            closes: closes.clone(),
            queued: vec![RawMessage::at(TOPIC, r#"{"3T0": 99}"#, 1)],
        };
        let mut p = Pipeline::new(
            Box::new(old),
            PayloadDecoder::default(),
            SeriesWindow::new(5).unwrap(),
        );
        p.inject(1.0);

        let (feed, source) = ChannelSource::create(TOPIC, "replacement");
        p.reconfigure(Box::new(source));

        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(p.is_empty());
        assert_eq!(p.source_description(), "channel: replacement [ek/sensor/3]");

        feed.publish(TOPIC, r#"{"3T0": 2}"#);
        assert_eq!(p.pump(), 1);
        assert_eq!(values(&p), vec![2.0]);
    }

    #[test]
    fn reconfigure_with_closes_before_opening() {
        let (old_feed, mut p) = pipeline(5);
        p.inject(1.0);

        let (new_feed, replacement) = ChannelSource::create(TOPIC, "replacement");
        let result: Result<(), &str> = p.reconfigure_with(|| {
            // The old subscription must already be gone here
            assert!(!old_feed.publish(TOPIC, r#"{"3T0": 99}"#));
            Ok(Box::new(replacement))
        });

        assert!(result.is_ok());
        assert!(p.is_empty());
        new_feed.publish(TOPIC, r#"{"3T0": 2}"#);
        assert_eq!(p.pump(), 1);
        assert_eq!(values(&p), vec![2.0]);
    }

    #[test]
    fn failed_reconfigure_with_leaves_closed_source() {
        let closes = Arc::new(AtomicUsize::new(0));
        let old = CountingSource {
            closes: closes.clone(),
            queued: Vec::new(),
        };
        let mut p = Pipeline::new(
            Box::new(old),
            PayloadDecoder::default(),
            SeriesWindow::new(5).unwrap(),
        );
        p.inject(1.0);

        let result = p.reconfigure_with(|| Err("broker unreachable"));

        assert_eq!(result.unwrap_err(), "broker unreachable");
        assert_eq!(closes.load(Ordering::SeqCst), 1);
        assert!(p.is_empty());
        assert_eq!(p.source_description(), "counting");
    }

    #[test]
    fn pump_takes_at_most_one_batch() {
        let (feed, p) = pipeline(50);
        let mut p = p.with_max_batch(4);
        for v in 0..10 {
            feed.publish(TOPIC, format!(r#"{{"3T0": {v}}}"#));
        }

        assert_eq!(p.pump(), 4);
        assert_eq!(p.pump(), 4);
        assert_eq!(p.pump(), 2);
        assert_eq!(p.pump(), 0);
        assert_eq!(values(&p), (0..10).map(f64::from).collect::<Vec<_>>());
    }

    #[test]
    fn batch_limit_counts_skipped_payloads() {
        let (feed, p) = pipeline(50);
        let mut p = p.with_max_batch(2);
        feed.publish(TOPIC, "garbage");
        feed.publish(TOPIC, r#"{"other": 1}"#);
        feed.publish(TOPIC, r#"{"3T0": 3}"#);

        assert_eq!(p.pump(), 0);
        assert_eq!(p.stats().received, 2);
        assert_eq!(p.pump(), 1);
    }

    #[test]
    fn drop_closes_the_source() {
        let closes = Arc::new(AtomicUsize::new(0));
        let source = CountingSource {
            closes: closes.clone(),
            queued: Vec::new(),
        };
        let mut p = Pipeline::new(
            Box::new(source),
            PayloadDecoder::default(),
            SeriesWindow::new(5).unwrap(),
        );
        p.shutdown();
        drop(p);

        assert_eq!(closes.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn shutdown_stops_delivery() {
        let (feed, mut p) = pipeline(5);
        p.inject(1.0);
        p.shutdown();

        assert!(!feed.publish(TOPIC, r#"{"3T0": 2}"#) || p.pump() == 0);
        assert!(p.is_empty());
        assert_eq!(p.state(), ConnectionState::Disconnected);
    }
}
