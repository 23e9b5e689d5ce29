//! Decoding and aggregation of sensor readings.
//!
//! ## Submodules
//!
//! - [`decode`]: payload to [`Reading`](crate::Reading) ([`PayloadDecoder`])
//! - [`window`]: the bounded rolling window ([`SeriesWindow`])
//! - [`duration`]: parsing and formatting of duration strings (e.g., "1s", "500ms")
//!
//! ## Data Flow
//!
//! ```text
//! RawMessage (bytes + receipt time)
//!        │
//!        ▼
//! PayloadDecoder::decode()
//!        │
//!        ├──▶ Err(DecodeError)  logged, counted, dropped
//!        ├──▶ Ok(None)          field absent or not numeric, skipped
//!        │
//!        ▼
//! SeriesWindow::append()  ──▶  SeriesWindow::snapshot() ──▶ Series (read-only)
//! ```

pub mod decode;
pub mod duration;
pub mod window;

pub use decode::{PayloadDecoder, DEFAULT_FIELD};
pub use window::{SeriesWindow, DEFAULT_WINDOW_SIZE};
