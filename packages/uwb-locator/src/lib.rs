//! # uwb-locator
//!
//! Range-only positioning for UWB tags. Given anchors with known positions and
//! a measured distance to each, produce the best locus the data supports:
//!
//! | valid anchors | result                                   |
//! |---------------|------------------------------------------|
//! | 0             | `Empty`                                  |
//! | 1             | `SinglePoint` (sphere)                   |
//! | 2             | `Circle`                                 |
//! | 3             | `TwoCandidate` (mirror pair about plane) |
//! | 4             | `Resolved` by the fourth range           |
//! | 5+            | `Resolved` by combination search         |
//!
//! `LocationEngine` is the pure calculation core. `Receiver` wraps one engine
//! with anchor bookkeeping (staleness, events, automatic recalculation).
//! No I/O, no global state, no locking.

pub mod config;
pub mod engine;
pub mod error;
pub mod receiver;
pub mod solvers;
pub mod sparse;

pub use config::LocatorConfig;
pub use engine::{filter_valid, LocationEngine};
pub use error::{ConfigError, IngestError};
pub use receiver::{AnchorEvent, AnchorRecord, RangeSample, Receiver, ReceiverUpdate};
pub use solvers::{linear_four, Disambiguation};
pub use sparse::Combinations4;

pub use uwb_types::{
    AnchorSample, CalculationLevel, CalculationResult, Circle, ResultKind, UpdateLevel, Vec3,
};
