//! proctor-core: data model and pure state machines for a proctored test attempt.
//! No tokio, no IO. Time is always passed in or read through the `Clock` seam.

pub mod answers;
pub mod clock;
pub mod content;
pub mod draft;
pub mod error;
pub mod integrity;
pub mod lifecycle;
pub mod types;

pub use answers::VivaSheet;
pub use clock::{Clock, SystemClock, format_countdown, remaining_seconds};
pub use draft::TestDraft;
pub use error::{Capability, ProctorError};
pub use integrity::{KeyChord, ThresholdPolicy, WarningLedger, WarningOutcome, is_blocked_shortcut};
pub use lifecycle::{Lifecycle, SubmitGate};
pub use types::*;
