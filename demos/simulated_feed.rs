//! Example: Feeding the pipeline from a channel
//!
//! Demonstrates embedding the pipeline behind a transport of your own by
//! publishing payloads through a [`ChannelSource`] instead of an MQTT broker.
//!
//! A background thread publishes a slowly drifting temperature every 250ms,
//! with the odd malformed payload and unrelated message mixed in. The main
//! thread pumps the pipeline and prints the window.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example simulated_feed
//! ```

use std::thread;
use std::time::Duration;

use rand::Rng;
use sensorwatch::{ChannelSource, ConnectionState, PayloadDecoder, Pipeline, SeriesWindow};

const TOPIC: &str = "ek/sensor/3";

fn main() {
    println!("Simulated feed example");
    println!("Publishing synthetic readings on {}...\n", TOPIC);

    let (feed, source) = ChannelSource::create(TOPIC, "simulated");
    let mut pipeline = Pipeline::new(
        Box::new(source),
        PayloadDecoder::new("3T0"),
        SeriesWindow::new(10).expect("window size is non-zero"),
    );

    thread::spawn(move || {
        let mut rng = rand::thread_rng();
        let mut temperature = 25.0;
        feed.set_state(ConnectionState::Connected);

        for counter in 0u64.. {
            temperature += rng.gen_range(-0.5..0.5);

            let payload = match counter % 7 {
                3 => "{truncated".to_string(),
                5 => r#"{"humidity": 40}"#.to_string(),
                _ => format!(r#"{{"3T0": {:.2}, "seq": {}}}"#, temperature, counter),
            };

            if !feed.publish(TOPIC, payload) {
                break; // Source closed
            }

            thread::sleep(Duration::from_millis(250));
        }
    });

    println!("Pumping the pipeline (press Ctrl+C to stop):\n");

    loop {
        let appended = pipeline.pump();
        if appended > 0 {
            let values: Vec<String> = pipeline
                .snapshot()
                .values()
                .map(|v| format!("{:.2}", v))
                .collect();
            let stats = pipeline.stats();
            println!(
                "[{}] window {}/{}: {}",
                pipeline.state(),
                pipeline.len(),
                pipeline.window_size(),
                values.join(" ")
            );
            println!(
                "  received {} appended {} skipped {} errors {}",
                stats.received, stats.appended, stats.skipped, stats.decode_errors
            );
        }

        thread::sleep(Duration::from_secs(1));
    }
}
