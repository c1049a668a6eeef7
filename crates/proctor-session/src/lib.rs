//! proctor-session: the Proctored Test Session Controller.
//! Composes the permission gate, session clock, integrity monitor, draft
//! persistence, viva recording, and the submission transition on tokio.
//! Every browser capability and hosted service is an injected port.

use std::sync::{Mutex, MutexGuard, PoisonError};

pub mod account;
pub mod admin;
pub mod clock;
pub mod controller;
pub mod dashboard;
pub mod editor;
pub mod generation;
pub mod integrity;
pub mod permission;
pub mod policy;
pub mod ports;
pub mod sim;
pub mod store;
pub mod strategy;
pub mod submission;
pub mod viva;

pub use account::AccountService;
pub use admin::{AdminService, AssignOutcome};
pub use clock::{SessionClock, TokioClock};
pub use controller::{Services, SessionController, SessionSnapshot, SubmitOutcome};
pub use dashboard::{DashboardEntry, DashboardService, ReportView};
pub use generation::ContentService;
pub use permission::{PermissionGate, PermissionStatus};
pub use policy::SessionPolicy;
pub use store::Collections;
pub use strategy::ProctoringStrategy;

pub use proctor_core as core;

/// Lock a std mutex, recovering the data if a holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
