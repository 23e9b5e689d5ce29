//! # sensorwatch
//!
//! A terminal dashboard and library for charting one numeric field of a live
//! MQTT sensor topic.
//!
//! Payloads arrive on a single subscribed topic, are decoded as JSON objects,
//! and the configured field (e.g. `"3T0"`) is appended to a bounded rolling
//! window. The window and the connection state are then drawn as a live
//! chart.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │  tokio task                          UI thread                   │
//! │  ┌────────────┐   mpsc    ┌──────────────────────────────────┐   │
//! │  │ MQTT event │──────────▶│ Pipeline                         │   │
//! │  │ loop       │  payloads │  poll ─▶ PayloadDecoder ─▶ Series│   │
//! │  │            │   watch   │                          Window  │   │
//! │  │            │──────────▶│  state                           │   │
//! │  └────────────┘  state    └───────────────┬──────────────────┘   │
//! │                                           ▼                      │
//! │                                   app ─▶ ui ─▶ Terminal          │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **[`source`]**: transport adapters ([`TelemetrySource`] trait) for MQTT
//!   brokers and in-process channels
//! - **[`data`]**: payload decoding and the bounded [`SeriesWindow`]
//! - **[`pipeline`]**: the single consumer gluing source, decoder and window
//! - **[`config`]**: layered settings (defaults, file, environment, CLI)
//! - **[`app`]** / **[`ui`]**: interactive state and ratatui rendering
//!
//! ## Usage
//!
//! ### As a CLI tool
//!
//! ```bash
//! # Chart field 3T0 of ek/sensor/3 on the default broker
//! sensorwatch
//!
//! # Another broker, topic and field
//! sensorwatch --broker ws://localhost:9001/mqtt --topic plant/line1 --field temp
//! ```
//!
//! ### As a library with a channel source
//!
//! ```
//! use sensorwatch::{ChannelSource, PayloadDecoder, Pipeline, SeriesWindow};
//!
//! let (feed, source) = ChannelSource::create("ek/sensor/3", "bridge");
//! let mut pipeline = Pipeline::new(
//!     Box::new(source),
//!     PayloadDecoder::new("3T0"),
//!     SeriesWindow::new(50).unwrap(),
//! );
//!
//! feed.publish("ek/sensor/3", r#"{"3T0": 22.5}"#);
//! pipeline.pump();
//! assert_eq!(pipeline.latest().map(|r| r.value), Some(22.5));
//! ```
//!
//! ### As a library with an MQTT source
//!
//! ```no_run
//! use sensorwatch::{MqttSource, PayloadDecoder, Pipeline, SeriesWindow};
//!
//! # tokio_test::block_on(async {
//! let source = MqttSource::builder()
//!     .broker("ws://damoa.io:9002")
//!     .topic("ek/sensor/3")
//!     .open()
//!     .unwrap();
//! let pipeline = Pipeline::new(
//!     Box::new(source),
//!     PayloadDecoder::default(),
//!     SeriesWindow::new(50).unwrap(),
//! );
//! # });
//! ```

pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod source;
pub mod ui;

// Re-export main types for convenience
pub use app::{App, ConnectionDetails};
pub use config::{Overrides, PipelineConfig, Settings};
pub use data::{PayloadDecoder, SeriesWindow, DEFAULT_WINDOW_SIZE};
pub use error::{ConfigError, DecodeError};
pub use pipeline::{Pipeline, PipelineStats, DEFAULT_MAX_BATCH};
pub use sensorwatch_types::{ConnectionState, Indicator, Reading, Series};
pub use source::{
    BrokerEndpoint, ChannelFeed, ChannelSource, MqttSource, MqttSourceBuilder, RawMessage,
    TelemetrySource, TransportKind,
};
