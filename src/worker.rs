//! Background analysis
//!
//! [`AnalysisWorker`] owns one analysis thread. Each submitted buffer becomes
//! a job whose results arrive on separate channels as the stages finish: the
//! waveform first, then the formants, then the frequency response. Submitting
//! a new buffer cancels the job before it, so a slow analysis of an old
//! recording can never overwrite the results of a newer one. Cancellation is
//! cooperative and is noticed between stages and between root extractions.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, unbounded, Receiver, Sender};
use tracing::debug;

use crate::analysis::Analyzer;
use crate::formant::FormantList;
use crate::response::FrequencyResponseCurve;
use crate::{AnalysisError, Result, SampleBuffer};

/// Result of one stage; the error is shared when it stops several stages
pub type StageResult<T> = std::result::Result<T, Arc<AnalysisError>>;

struct Job {
    buffer: Arc<SampleBuffer>,
    cancel: Arc<AtomicBool>,
    waveform_tx: Sender<StageResult<Vec<i16>>>,
    formants_tx: Sender<StageResult<FormantList>>,
    response_tx: Sender<StageResult<FrequencyResponseCurve>>,
}

/// Runs analyses on a dedicated thread
pub struct AnalysisWorker {
    jobs: Option<Sender<Job>>,
    current: Option<Arc<AtomicBool>>,
    thread: Option<JoinHandle<()>>,
}

impl AnalysisWorker {
    /// Start the analysis thread
    pub fn new(analyzer: Analyzer) -> Result<Self> {
        let (jobs, rx) = unbounded::<Job>();
        let thread = thread::Builder::new()
            .name("formant-analysis".to_string())
            .spawn(move || {
                for job in rx.iter() {
                    run_job(&analyzer, job);
                }
                debug!("analysis thread exiting");
            })?;

        Ok(Self {
            jobs: Some(jobs),
            current: None,
            thread: Some(thread),
        })
    }

    /// Queue `buffer` for analysis, cancelling the previous job
    pub fn submit(&mut self, buffer: Arc<SampleBuffer>) -> Result<AnalysisHandle> {
        if let Some(previous) = self.current.take() {
            previous.store(true, Ordering::Relaxed);
        }

        let cancel = Arc::new(AtomicBool::new(false));
        let (waveform_tx, waveform) = bounded(1);
        let (formants_tx, formants) = bounded(1);
        let (response_tx, response) = bounded(1);

        let job = Job {
            buffer,
            cancel: Arc::clone(&cancel),
            waveform_tx,
            formants_tx,
            response_tx,
        };

        self.jobs
            .as_ref()
            .ok_or_else(|| AnalysisError::Analysis("analysis worker has stopped".to_string()))?
            .send(job)
            .map_err(|_| AnalysisError::Analysis("analysis thread is gone".to_string()))?;

        self.current = Some(Arc::clone(&cancel));
        Ok(AnalysisHandle {
            cancel,
            waveform,
            formants,
            response,
        })
    }
}

impl Drop for AnalysisWorker {
    fn drop(&mut self) {
        if let Some(current) = self.current.take() {
            current.store(true, Ordering::Relaxed);
        }
        // Closing the job channel ends the thread's loop
        self.jobs.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn run_job(analyzer: &Analyzer, job: Job) {
    let Job {
        buffer,
        cancel,
        waveform_tx,
        formants_tx,
        response_tx,
    } = job;
    let cancelled = || cancel.load(Ordering::Relaxed);

    debug!(samples = buffer.num_samples(), "analysis job started");

    let waveform = if cancelled() {
        Err(Arc::new(AnalysisError::Cancelled))
    } else {
        Ok(analyzer.waveform(&buffer))
    };
    let _ = waveform_tx.send(waveform);

    let lpc = if cancelled() {
        Err(AnalysisError::Cancelled)
    } else {
        analyzer.lpc(&buffer)
    };

    let lpc = match lpc {
        Ok(lpc) => lpc,
        Err(e) => {
            debug!("analysis job stopped before LPC: {}", e);
            let e = Arc::new(e);
            let _ = formants_tx.send(Err(Arc::clone(&e)));
            let _ = response_tx.send(Err(e));
            return;
        }
    };

    let rate = analyzer.analysis_rate(&buffer);
    let formants = analyzer
        .formants_from_lpc(&lpc, rate, &cancel)
        .map_err(Arc::new);
    let _ = formants_tx.send(formants);

    let response = if cancelled() {
        Err(Arc::new(AnalysisError::Cancelled))
    } else {
        analyzer.response_from_lpc(&lpc, rate).map_err(Arc::new)
    };
    let _ = response_tx.send(response);

    debug!(cancelled = cancelled(), "analysis job finished");
}

/// Results of one submitted buffer
///
/// Each result is delivered once; waiting for it a second time returns an error.
pub struct AnalysisHandle {
    cancel: Arc<AtomicBool>,
    waveform: Receiver<StageResult<Vec<i16>>>,
    formants: Receiver<StageResult<FormantList>>,
    response: Receiver<StageResult<FrequencyResponseCurve>>,
}

impl AnalysisHandle {
    /// Ask the worker to stop this job
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// True once the job was cancelled, by this handle or by a newer submission
    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Relaxed)
    }

    /// Block until the display waveform is ready
    pub fn wait_waveform(&self) -> StageResult<Vec<i16>> {
        self.receive(&self.waveform)
    }

    /// Block until the formants are ready
    pub fn wait_formants(&self) -> StageResult<FormantList> {
        self.receive(&self.formants)
    }

    /// Block until the frequency response is ready
    pub fn wait_response(&self) -> StageResult<FrequencyResponseCurve> {
        self.receive(&self.response)
    }

    fn receive<T>(&self, rx: &Receiver<StageResult<T>>) -> StageResult<T> {
        rx.recv().unwrap_or_else(|_| {
            let e = if self.is_cancelled() {
                AnalysisError::Cancelled
            } else {
                AnalysisError::Analysis("result was already received".to_string())
            };
            Err(Arc::new(e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formant::Formant;
    use crate::AnalysisConfig;

    fn voiced_buffer() -> Arc<SampleBuffer> {
        let formants = [
            Formant { frequency: 300.0, bandwidth: 60.0 },
            Formant { frequency: 2300.0, bandwidth: 100.0 },
            Formant { frequency: 3000.0, bandwidth: 120.0 },
            Formant { frequency: 3700.0, bandwidth: 150.0 },
        ];
        let vowel = SampleBuffer::synthesize_vowel(&formants, 120.0, 16384, 44100, 12000.0);
        let mut samples = vec![0i16; 4096];
        samples.extend_from_slice(vowel.samples());
        samples.extend(vec![0i16; 4096]);
        Arc::new(SampleBuffer::from_samples_owned(samples, 44100))
    }

    #[test]
    fn test_stages_are_delivered() {
        let mut worker = AnalysisWorker::new(Analyzer::default()).unwrap();
        let handle = worker.submit(voiced_buffer()).unwrap();

        let waveform = handle.wait_waveform().unwrap();
        assert_eq!(waveform.len(), AnalysisConfig::default().display_samples);

        let formants = handle.wait_formants().unwrap();
        assert!(formants.is_complete());

        let response = handle.wait_response().unwrap();
        assert!(!response.is_empty());
        assert!(!handle.is_cancelled());
    }

    #[test]
    fn test_silence_fails_both_spectral_stages() {
        let mut worker = AnalysisWorker::new(Analyzer::default()).unwrap();
        let handle = worker
            .submit(Arc::new(SampleBuffer::create_silence(10000, 44100)))
            .unwrap();

        assert!(matches!(*handle.wait_formants().unwrap_err(), AnalysisError::NoSignal));
        assert!(matches!(*handle.wait_response().unwrap_err(), AnalysisError::NoSignal));
    }

    #[test]
    fn test_cancelled_before_start() {
        let mut worker = AnalysisWorker::new(Analyzer::default()).unwrap();
        let handle = worker.submit(voiced_buffer()).unwrap();
        handle.cancel();
        // The job may already be running; results are either complete or Cancelled
        if let Err(e) = handle.wait_response() {
            assert!(matches!(*e, AnalysisError::Cancelled));
        }
        assert!(handle.is_cancelled());
    }

    #[test]
    fn test_new_submission_cancels_previous() {
        let mut worker = AnalysisWorker::new(Analyzer::default()).unwrap();
        let first = worker.submit(voiced_buffer()).unwrap();
        let second = worker.submit(voiced_buffer()).unwrap();

        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
        assert!(second.wait_response().is_ok());
    }

    #[test]
    fn test_result_is_delivered_once() {
        let mut worker = AnalysisWorker::new(Analyzer::default()).unwrap();
        let handle = worker.submit(voiced_buffer()).unwrap();
        assert!(handle.wait_waveform().is_ok());
        // Wait for the job to finish so the senders are dropped
        let _ = handle.wait_response();
        assert!(handle.wait_waveform().is_err());
    }
}
