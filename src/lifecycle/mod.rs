//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Init logging/metrics → Build chains → Serve
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop serving → Drain background tasks (tasks.rs) → Exit
//! ```
//!
//! # Design Decisions
//! - Detached log tasks are tracked, never left unmanaged
//! - Shutdown waits for pending log records before exit

pub mod shutdown;
pub mod tasks;

pub use shutdown::Shutdown;
pub use tasks::BackgroundTasks;
