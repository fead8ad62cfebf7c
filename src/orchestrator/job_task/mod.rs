//! Execution of one downloader invocation, split into focused submodules:
//! - [`context`] - Shared per-job state and event emission
//! - [`orchestration`] - Launch, supervision, and terminal computation
//! - [`finalization`] - Artwork and subtitle discovery for completed jobs

mod context;
mod finalization;
mod orchestration;

pub use finalization::{ArtworkGenerator, CliArtworkGenerator, NoOpArtworkGenerator};
pub(crate) use orchestration::spawn_job_task;
