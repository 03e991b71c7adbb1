//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger
//!
//! Shutdown (shutdown.rs):
//!     broadcast → server stops accepting, maintenance tasks exit
//!
//! Maintenance (maintenance.rs):
//!     interval → cache sweep, idle bucket sweep
//! ```

pub mod maintenance;
pub mod shutdown;
pub mod signals;

pub use maintenance::MaintenanceTask;
pub use shutdown::Shutdown;
