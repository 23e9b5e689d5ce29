//! # sensorwatch-types
//!
//! Value types shared between the sensorwatch ingestion pipeline and
//! anything that renders or exports its output.
//!
//! - [`Reading`]: one decoded sample, stamped with its receipt time
//! - [`ConnectionState`]: the transport's current status, broadcast read-only
//! - [`Series`]: an immutable, arrival-ordered snapshot of the rolling window
//!
//! ## Features
//!
//! - `serde`: JSON (or any serde format) support for all types
//!
//! ## Example
//!
//! ```rust
//! use sensorwatch_types::{ConnectionState, Reading, Series};
//!
//! let series = Series::from(vec![
//!     Reading::new(1_000, 21.5),
//!     Reading::new(2_000, 22.0),
//! ]);
//!
//! assert_eq!(series.len(), 2);
//! assert_eq!(series.latest().map(|r| r.value), Some(22.0));
//! assert_eq!(ConnectionState::SubscriptionError.label(), "Subscription Error");
//! ```

mod reading;
mod series;
mod state;

pub use reading::*;
pub use series::*;
pub use state::*;
