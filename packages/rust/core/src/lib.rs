//! Import pipeline core: run state, pacing, staging, the bounded upload
//! queue, and the orchestrator that drives one run end to end.

pub mod orchestrator;
pub mod pacer;
pub mod queue;
pub mod run_state;
pub mod staging;

pub use orchestrator::{
    ImportConfig, ProgressReporter, ProgressSnapshot, RunProgress, SilentProgress, run_import,
};
pub use pacer::Pacer;
pub use queue::{DrainStats, UploadQueue};
pub use run_state::RunState;
pub use staging::{StageOutcome, StagingWriter, UploadTask};
