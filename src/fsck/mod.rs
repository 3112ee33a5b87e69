//! Offline consistency check of a volume.

pub mod fsck;
pub mod fsck_backend;
pub mod fsck_types;
pub mod mock;

pub use fsck::run_fsck;
pub use fsck_backend::{FsckBackend, MediumBackend};
pub use fsck_types::FsckReport;
