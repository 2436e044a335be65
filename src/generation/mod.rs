// Generation - Hand the pattern to an external generator and take back one track

pub mod job;
pub mod snapshot;

pub use job::{GenerationJob, Generator, JobStatus};
pub use snapshot::{GenerationRequest, PatternSnapshot, TrackPolicy};
