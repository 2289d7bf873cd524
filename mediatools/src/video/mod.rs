//! Video conversion: preset tables, ffmpeg argument building and the job
//! lifecycle, with a local ffmpeg backend and an HTTP fallback.

pub mod command;
pub mod ffmpeg;
pub mod job;
pub mod preset;
pub mod remote;

pub use command::ConversionRequest;
pub use ffmpeg::{is_ffmpeg_available, FfmpegTranscoder};
pub use job::{estimate_remaining, JobEvent, JobState, ProgressStream, VideoJob};
pub use preset::{PresetKey, QualityPreset, ResolutionPreset};
pub use remote::RemoteTranscoder;

use anyhow::Result;

use std::path::{Path, PathBuf};
use std::thread::JoinHandle;

/// What a backend reports while it works
#[derive(Debug, Clone, PartialEq)]
pub enum TranscodeEvent {
    /// Input has been handed over and encoding started
    Converting,
    /// Fraction of the input encoded so far
    Progress(f64),
    Log(String),
}

pub trait Transcoder {
    fn name(&self) -> &'static str;

    fn transcode(
        &self,
        input: &Path,
        request: &ConversionRequest,
        on_event: &mut dyn FnMut(TranscodeEvent),
    ) -> Result<Vec<u8>>;
}

/// Local ffmpeg when it is installed, otherwise the remote endpoint.
pub fn select_transcoder(remote_endpoint: &str) -> Result<Box<dyn Transcoder + Send>> {
    if is_ffmpeg_available() {
        return Ok(Box::new(FfmpegTranscoder));
    }
    log::warn!("ffmpeg not found, converting through {remote_endpoint}");
    Ok(Box::new(RemoteTranscoder::new(remote_endpoint)?))
}

/// Drive `job` through one conversion. Failures end in `JobState::Failed`
/// with the error in the job log; nothing is retried.
pub fn run(
    job: &mut VideoJob,
    transcoder: &dyn Transcoder,
    input: &Path,
    request: &ConversionRequest,
) -> Result<Vec<u8>> {
    job.start_upload()?;
    job.push_log(format!(
        "{} via {} at {}x{}",
        request.preset.key.as_str(),
        transcoder.name(),
        request.output_dimensions().0,
        request.output_dimensions().1
    ));

    let result = transcoder.transcode(input, request, &mut |event| {
        let transition = match event {
            TranscodeEvent::Converting => job.start_converting(),
            TranscodeEvent::Progress(fraction) => job.report(fraction),
            TranscodeEvent::Log(line) => {
                job.push_log(line);
                Ok(())
            }
        };
        if let Err(e) = transition {
            log::debug!("{e}");
        }
    });

    match result {
        Ok(bytes) => {
            job.finish(bytes.len())?;
            Ok(bytes)
        }
        Err(e) => {
            job.fail(format!("{e:#}"));
            Err(e)
        }
    }
}

/// Run a conversion on its own thread, returning the job's progress stream
/// and a handle resolving to the converted bytes.
pub fn spawn(
    transcoder: Box<dyn Transcoder + Send>,
    input: PathBuf,
    request: ConversionRequest,
) -> (ProgressStream, JoinHandle<Result<Vec<u8>>>) {
    let mut job = VideoJob::new();
    let stream = job.subscribe();
    let handle =
        std::thread::spawn(move || run(&mut job, transcoder.as_ref(), &input, &request));
    (stream, handle)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeTranscoder {
        fail: bool,
    }

    impl Transcoder for FakeTranscoder {
        fn name(&self) -> &'static str {
            "fake"
        }

        fn transcode(
            &self,
            _input: &Path,
            _request: &ConversionRequest,
            on_event: &mut dyn FnMut(TranscodeEvent),
        ) -> Result<Vec<u8>> {
            on_event(TranscodeEvent::Converting);
            on_event(TranscodeEvent::Progress(0.5));
            if self.fail {
                anyhow::bail!("encoder crashed");
            }
            on_event(TranscodeEvent::Progress(1.0));
            Ok(vec![0; 16])
        }
    }

    fn request() -> ConversionRequest {
        ConversionRequest::new(PresetKey::Low, ResolutionPreset::Hd)
    }

    #[test]
    fn successful_run_ends_done() {
        let mut job = VideoJob::new();
        let bytes = run(
            &mut job,
            &FakeTranscoder { fail: false },
            Path::new("clip.mov"),
            &request(),
        )
        .unwrap();
        assert_eq!(bytes.len(), 16);
        assert_eq!(job.state(), &JobState::Done { bytes: 16 });
        assert_eq!(job.log(), ["low via fake at 1280x720"]);
    }

    #[test]
    fn failed_run_is_logged() {
        let mut job = VideoJob::new();
        let result = run(
            &mut job,
            &FakeTranscoder { fail: true },
            Path::new("clip.mov"),
            &request(),
        );
        assert!(result.is_err());
        assert_eq!(
            job.state(),
            &JobState::Failed {
                message: "encoder crashed".into()
            }
        );
        assert_eq!(job.log().last().unwrap(), "error: encoder crashed");
    }

    #[test]
    fn spawned_run_streams_progress() {
        let (stream, handle) = spawn(
            Box::new(FakeTranscoder { fail: false }),
            PathBuf::from("clip.mov"),
            request(),
        );

        let percents: Vec<f64> = stream
            .filter_map(|event| match event {
                JobEvent::State(JobState::Converting { percent, .. }) => Some(percent),
                _ => None,
            })
            .collect();
        assert_eq!(percents, [0.0, 50.0, 100.0]);
        assert_eq!(handle.join().unwrap().unwrap().len(), 16);
    }
}
