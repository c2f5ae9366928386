//! Domain types for the band signal engine.

pub mod bar;
pub mod position;
pub mod signal;
pub mod trade;

pub use bar::{validate_series, Bar, BarError};
pub use position::SimulatedPosition;
pub use signal::{LastSignalRecord, Side, Signal};
pub use trade::{ExitReason, TradeRecord};
