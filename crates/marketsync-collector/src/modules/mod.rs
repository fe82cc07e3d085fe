//! 동기화 모듈.

pub mod bar_sync;
pub mod enumerate;

pub use bar_sync::{run_sync, CancelFlag, SyncContext, SyncOptions};
pub use enumerate::{enumerate_work, Priority, WorkItem};
