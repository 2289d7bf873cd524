use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum JobState {
    Idle,
    Uploading,
    Converting {
        percent: f64,
        eta: Option<Duration>,
    },
    Done {
        bytes: usize,
    },
    Failed {
        message: String,
    },
}

impl JobState {
    pub fn is_finished(&self) -> bool {
        matches!(self, JobState::Done { .. } | JobState::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    State(JobState),
    Log(String),
}

#[derive(Debug)]
pub struct InvalidTransition {
    from: JobState,
    to: &'static str,
}

impl std::fmt::Display for InvalidTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "Cannot move video job from {:?} to {}", self.from, self.to)
    }
}

impl std::error::Error for InvalidTransition {}

/// Estimated time left when `fraction` of the work took `elapsed`.
///
/// None until some progress has been reported.
pub fn estimate_remaining(fraction: f64, elapsed: Duration) -> Option<Duration> {
    if !fraction.is_finite() || fraction <= 0.0 {
        return None;
    }
    let fraction = fraction.min(1.0);
    let total = elapsed.as_secs_f64() / fraction;
    Some(Duration::from_secs_f64((total - elapsed.as_secs_f64()).max(0.0)))
}

/// Receiving end of a job's progress events. A job feeds one stream at a
/// time; subscribing again or finishing the job closes the previous one.
pub struct ProgressStream {
    rx: Receiver<JobEvent>,
}

impl ProgressStream {
    pub fn recv(&self) -> Option<JobEvent> {
        self.rx.recv().ok()
    }

    pub fn try_recv(&self) -> Option<JobEvent> {
        self.rx.try_recv().ok()
    }

    /// Stop listening. Later events are dropped by the job.
    pub fn unsubscribe(self) {}
}

impl Iterator for ProgressStream {
    type Item = JobEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.recv()
    }
}

/// Lifecycle of one video conversion: Idle, Uploading, Converting, then
/// Done or Failed.
#[derive(Debug)]
pub struct VideoJob {
    state: JobState,
    started: Option<Instant>,
    log: Vec<String>,
    subscriber: Option<Sender<JobEvent>>,
}

impl Default for VideoJob {
    fn default() -> Self {
        Self::new()
    }
}

impl VideoJob {
    pub fn new() -> Self {
        Self {
            state: JobState::Idle,
            started: None,
            log: Vec::new(),
            subscriber: None,
        }
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn log(&self) -> &[String] {
        &self.log
    }

    pub fn subscribe(&mut self) -> ProgressStream {
        let (tx, rx) = mpsc::channel();
        self.subscriber = Some(tx);
        ProgressStream { rx }
    }

    pub fn push_log(&mut self, line: impl Into<String>) {
        let line = line.into();
        log::debug!("video job: {line}");
        self.emit(JobEvent::Log(line.clone()));
        self.log.push(line);
    }

    pub fn start_upload(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            JobState::Idle | JobState::Done { .. } | JobState::Failed { .. } => {
                self.log.clear();
                self.started = None;
                self.set_state(JobState::Uploading);
                Ok(())
            }
            _ => Err(self.invalid("Uploading")),
        }
    }

    pub fn start_converting(&mut self) -> Result<(), InvalidTransition> {
        match self.state {
            JobState::Uploading => {
                self.started = Some(Instant::now());
                self.set_state(JobState::Converting {
                    percent: 0.0,
                    eta: None,
                });
                Ok(())
            }
            _ => Err(self.invalid("Converting")),
        }
    }

    /// Record progress as a fraction in `0..=1`, measured against the
    /// time conversion started.
    pub fn report(&mut self, fraction: f64) -> Result<(), InvalidTransition> {
        let elapsed = self.started.map(|s| s.elapsed()).unwrap_or_default();
        self.report_at(fraction, elapsed)
    }

    pub fn report_at(&mut self, fraction: f64, elapsed: Duration) -> Result<(), InvalidTransition> {
        let JobState::Converting { percent, .. } = self.state else {
            return Err(self.invalid("Converting"));
        };

        let fraction = if fraction.is_finite() {
            fraction.clamp(0.0, 1.0)
        } else {
            0.0
        };
        // ffmpeg occasionally reports a timestamp behind the previous one
        let next = (fraction * 100.0).max(percent);
        self.set_state(JobState::Converting {
            percent: next,
            eta: estimate_remaining(next / 100.0, elapsed),
        });
        Ok(())
    }

    pub fn finish(&mut self, bytes: usize) -> Result<(), InvalidTransition> {
        match self.state {
            JobState::Uploading | JobState::Converting { .. } => {
                self.set_state(JobState::Done { bytes });
                self.subscriber = None;
                Ok(())
            }
            _ => Err(self.invalid("Done")),
        }
    }

    /// Any running job may fail; the message also lands in the job log.
    pub fn fail(&mut self, message: impl Into<String>) {
        let message = message.into();
        self.push_log(format!("error: {message}"));
        self.set_state(JobState::Failed { message });
        self.subscriber = None;
    }

    fn set_state(&mut self, state: JobState) {
        self.state = state.clone();
        self.emit(JobEvent::State(state));
    }

    fn emit(&mut self, event: JobEvent) {
        if let Some(tx) = &self.subscriber {
            if tx.send(event).is_err() {
                self.subscriber = None;
            }
        }
    }

    fn invalid(&self, to: &'static str) -> InvalidTransition {
        InvalidTransition {
            from: self.state.clone(),
            to,
        }
    }
}
