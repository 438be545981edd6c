// src/control/mod.rs
//! Run control surface
//!
//! ```text
//!   bot / CLI frontends
//!          |
//!          v
//!   +---------------------+     +------------------------+
//!   |     ControlApi      |<----|  FileSystemControlApi  |  read-only
//!   |  (trait, async)     |     +------------------------+
//!   +----------+----------+     +------------------------+
//!              ^----------------|    EngineControlApi    |  live runs
//!                               |  ScanDriver + DashMap  |
//!                               +------------------------+
//! ```

pub mod api;
pub mod fs_api;
pub mod run_control;

pub use api::{ControlApi, FileEntry, FileMetadata, RunInfo};
pub use fs_api::FileSystemControlApi;
pub use run_control::{EngineControlApi, ScanDriver};
