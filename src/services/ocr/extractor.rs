use super::engine::OcrEngine;
use super::preprocessing::PreprocessingService;
use crate::error::OcrError;
use crate::models::region::AbsoluteRegion;
use image::{DynamicImage, GenericImageView};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

const DEFAULT_MAX_STALLED: usize = 4;

/// Crops a region, preprocesses it and runs OCR.
///
/// Failures never escape: an engine error, panic or timeout yields empty text.
/// At most `max_stalled` timed-out workers may linger; past that, calls fail
/// fast instead of spawning more threads.
pub struct TextExtractor {
    engine: Arc<dyn OcrEngine>,
    preprocessing: PreprocessingService,
    timeout: Option<Duration>,
    max_stalled: usize,
    stalled: Arc<AtomicUsize>,
}

#[derive(PartialEq)]
enum JobState {
    Running,
    Abandoned,
    Done,
}

/// Shared between a caller and its worker thread
struct Job {
    state: Mutex<JobState>,
    stalled: Arc<AtomicUsize>,
}

impl Job {
    /// Caller gave up waiting; counted as stalled unless already done
    fn abandon(&self) {
        let mut state = self.state.lock();
        if *state == JobState::Running {
            *state = JobState::Abandoned;
            self.stalled.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Marks the job finished when the worker exits, panics included
struct WorkerExit(Arc<Job>);

impl Drop for WorkerExit {
    fn drop(&mut self) {
        let mut state = self.0.state.lock();
        if *state == JobState::Abandoned {
            self.0.stalled.fetch_sub(1, Ordering::SeqCst);
        }
        *state = JobState::Done;
    }
}

impl TextExtractor {
    pub fn new(
        engine: Arc<dyn OcrEngine>,
        preprocessing: PreprocessingService,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            engine,
            preprocessing,
            timeout,
            max_stalled: DEFAULT_MAX_STALLED,
            stalled: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Limit on lingering timed-out workers (at least 1)
    pub fn with_max_stalled(mut self, max_stalled: usize) -> Self {
        self.max_stalled = max_stalled.max(1);
        self
    }

    /// Timed-out workers that are still running
    pub fn stalled_workers(&self) -> usize {
        self.stalled.load(Ordering::SeqCst)
    }

    pub fn extract_text(&self, image: &DynamicImage, region: &AbsoluteRegion) -> String {
        let crop = crop(image, region);
        let prepared = self.preprocessing.preprocess(&crop);

        match self.recognize(prepared) {
            Ok(text) => {
                tracing::debug!(region = %region.name, engine = self.engine.name(), text = %text, "OCR text");
                text
            }
            Err(e) => {
                tracing::warn!(
                    region = %region.name,
                    engine = self.engine.name(),
                    error = %e,
                    "OCR failed, treating region text as empty"
                );
                String::new()
            }
        }
    }

    fn recognize(&self, image: DynamicImage) -> Result<String, OcrError> {
        let Some(timeout) = self.timeout else {
            let engine = &self.engine;
            return panic::catch_unwind(AssertUnwindSafe(|| engine.recognize(&image)))
                .unwrap_or_else(|_| Err(OcrError::Engine("OCR engine panicked".to_string())));
        };

        let stalled = self.stalled_workers();
        if stalled >= self.max_stalled {
            return Err(OcrError::Stalled(stalled));
        }

        let job = Arc::new(Job {
            state: Mutex::new(JobState::Running),
            stalled: Arc::clone(&self.stalled),
        });

        let (tx, rx) = mpsc::sync_channel(1);
        let engine = Arc::clone(&self.engine);
        let exit = WorkerExit(Arc::clone(&job));
        thread::Builder::new()
            .name("ocr-worker".to_string())
            .spawn(move || {
                let _exit = exit;
                let _ = tx.send(engine.recognize(&image));
            })
            .map_err(|e| OcrError::Engine(format!("Failed to spawn OCR worker: {}", e)))?;

        match rx.recv_timeout(timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                job.abandon();
                Err(OcrError::Timeout(timeout))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(OcrError::WorkerLost),
        }
    }
}

fn crop(image: &DynamicImage, region: &AbsoluteRegion) -> DynamicImage {
    let (width, height) = image.dimensions();
    let x = region.x.min(width);
    let y = region.y.min(height);
    image.crop_imm(
        x,
        y,
        region.width.min(width - x),
        region.height.min(height - y),
    )
}
