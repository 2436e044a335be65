// Generation job - Runs a generator off the tick thread and reports back once
//
// The engine polls the job every tick; polling never blocks. A cancelled job's
// result is discarded, so the target slot keeps whatever it had.

use crate::error::{EngineError, EngineResult};
use crate::generation::snapshot::GenerationRequest;
use crate::sequencer::track::Track;
use crossbeam_channel::{Receiver, TryRecvError, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

/// Produces a replacement track from a pattern snapshot
pub trait Generator: Send + Sync {
    fn generate(&self, request: &GenerationRequest) -> EngineResult<Track>;
}

impl<F> Generator for F
where
    F: Fn(&GenerationRequest) -> EngineResult<Track> + Send + Sync,
{
    fn generate(&self, request: &GenerationRequest) -> EngineResult<Track> {
        self(request)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobStatus {
    Pending,
    Finished(Track),
    Failed(EngineError),
    Cancelled,
}

pub struct GenerationJob {
    target_slot: usize,
    cancelled: Arc<AtomicBool>,
    result_rx: Receiver<EngineResult<Track>>,
}

impl GenerationJob {
    /// Start `generator` on its own thread. The result is meant for `target_slot`.
    pub fn spawn(
        generator: Arc<dyn Generator>,
        request: GenerationRequest,
        target_slot: usize,
    ) -> EngineResult<Self> {
        let (result_tx, result_rx) = bounded(1);
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancel_flag = cancelled.clone();

        thread::Builder::new()
            .name("generation".to_string())
            .spawn(move || {
                let result = generator.generate(&request);
                if cancel_flag.load(Ordering::Acquire) {
                    return;
                }
                // Receiver gone means the job handle was dropped
                let _ = result_tx.send(result);
            })
            .map_err(|e| {
                EngineError::GenerationJobFailure(format!("cannot start generation thread: {}", e))
            })?;

        log::info!("Generation started for slot {}", target_slot);

        Ok(Self {
            target_slot,
            cancelled,
            result_rx,
        })
    }

    pub fn target_slot(&self) -> usize {
        self.target_slot
    }

    /// Safe to call at any time, including after completion
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    /// Non-blocking completion check
    pub fn poll(&self) -> JobStatus {
        if self.is_cancelled() {
            return JobStatus::Cancelled;
        }

        match self.result_rx.try_recv() {
            Ok(Ok(track)) => JobStatus::Finished(track),
            Ok(Err(e)) => JobStatus::Failed(e),
            Err(TryRecvError::Empty) => JobStatus::Pending,
            Err(TryRecvError::Disconnected) => {
                JobStatus::Failed(EngineError::GenerationJobFailure(
                    "generator exited without a result".to_string(),
                ))
            }
        }
    }
}

impl std::fmt::Debug for GenerationJob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationJob")
            .field("target_slot", &self.target_slot)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::snapshot::PatternSnapshot;
    use crossbeam_channel::Sender;
    use std::time::{Duration, Instant};

    fn request() -> GenerationRequest {
        GenerationRequest {
            piece: PatternSnapshot {
                ticks_per_beat: 480,
                beats_per_loop: 16,
                bars: 4,
                tracks: Vec::new(),
            },
            status: Vec::new(),
        }
    }

    fn wait_for(job: &GenerationJob) -> JobStatus {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let status = job.poll();
            if status != JobStatus::Pending || Instant::now() > deadline {
                return status;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    #[test]
    fn test_job_finishes_with_track() {
        let generator = |_: &GenerationRequest| -> EngineResult<Track> {
            Ok(Track::empty(480).with_name("generated"))
        };
        let job = GenerationJob::spawn(Arc::new(generator), request(), 2).unwrap();

        assert_eq!(job.target_slot(), 2);
        match wait_for(&job) {
            JobStatus::Finished(track) => assert_eq!(track.name(), Some("generated")),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_job_failure_is_reported() {
        let generator = |_: &GenerationRequest| -> EngineResult<Track> {
            Err(EngineError::GenerationJobFailure("model crashed".to_string()))
        };
        let job = GenerationJob::spawn(Arc::new(generator), request(), 0).unwrap();

        match wait_for(&job) {
            JobStatus::Failed(reason) => assert!(reason.to_string().contains("model crashed")),
            other => panic!("unexpected status {:?}", other),
        }
    }

    #[test]
    fn test_cancelled_job_discards_result() {
        let (release_tx, release_rx): (Sender<()>, Receiver<()>) = bounded(1);
        let generator = move |_: &GenerationRequest| -> EngineResult<Track> {
            let _ = release_rx.recv();
            Ok(Track::empty(480))
        };
        let job = GenerationJob::spawn(Arc::new(generator), request(), 0).unwrap();

        assert_eq!(job.poll(), JobStatus::Pending);
        job.cancel();
        release_tx.send(()).unwrap();

        assert_eq!(wait_for(&job), JobStatus::Cancelled);
        // Cancelling twice is harmless
        job.cancel();
        assert!(job.is_cancelled());
    }
}
