use anyhow::{Context, Result};

use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Duration;

use super::command::ConversionRequest;
use super::{TranscodeEvent, Transcoder};

const OUTPUT_NAME: &str = "output.mp4";

/// One `key=value` line from ffmpeg's `-progress` output that matters here
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressLine {
    OutTime(Duration),
    End,
}

pub fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        "out_time_us" | "out_time_ms" => {
            // both keys carry microseconds; negative values show up before the first frame
            let us: i64 = value.parse().ok()?;
            Some(ProgressLine::OutTime(Duration::from_micros(us.max(0) as u64)))
        }
        "progress" if value == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

/// Local conversion with the `ffmpeg` binary on PATH.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfmpegTranscoder;

impl Transcoder for FfmpegTranscoder {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn transcode(
        &self,
        input: &Path,
        request: &ConversionRequest,
        on_event: &mut dyn FnMut(TranscodeEvent),
    ) -> Result<Vec<u8>> {
        if !is_ffmpeg_available() {
            anyhow::bail!("ffmpeg is not found in PATH. Please install ffmpeg.");
        }

        let dir = tempfile::tempdir().context("Failed to create temporary directory")?;
        let input_name = match input.extension() {
            Some(ext) => format!("input.{}", ext.to_string_lossy()),
            None => "input".to_string(),
        };
        std::fs::copy(input, dir.path().join(&input_name))
            .with_context(|| format!("Failed to stage {}", input.display()))?;
        on_event(TranscodeEvent::Log(format!("staged {}", input.display())));

        let duration = media_duration(&dir.path().join(&input_name));
        if duration.is_none() {
            log::debug!("Could not read the duration of {}", input.display());
        }

        let mut child = Command::new("ffmpeg")
            .args(["-y", "-nostats", "-progress", "pipe:1"])
            .args(request.build_args(&input_name, OUTPUT_NAME))
            .current_dir(dir.path())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .context("Failed to execute ffmpeg")?;

        on_event(TranscodeEvent::Converting);

        // drained on a side thread so a chatty ffmpeg never blocks on a full pipe
        let stderr = child.stderr.take().map(|mut stderr| {
            std::thread::spawn(move || {
                let mut text = String::new();
                if let Err(e) = stderr.read_to_string(&mut text) {
                    log::trace!("Failed to read ffmpeg stderr: {e}");
                }
                text
            })
        });

        let read_result = match child.stdout.take() {
            Some(stdout) => read_progress(BufReader::new(stdout), duration, on_event),
            None => Ok(()),
        };
        if read_result.is_err() {
            if let Err(e) = child.kill() {
                log::debug!("Failed to kill ffmpeg: {e}");
            }
        }

        let status = child.wait().context("Failed to wait for ffmpeg")?;
        let stderr = stderr
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        read_result.context("Failed to read ffmpeg progress")?;

        if !status.success() {
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            let tail: Vec<&str> = tail.into_iter().rev().collect();
            anyhow::bail!(
                "ffmpeg failed with code {:?}: {}",
                status.code(),
                tail.join("\n")
            );
        }

        let bytes = std::fs::read(dir.path().join(OUTPUT_NAME))
            .context("ffmpeg produced no output file")?;

        log::debug!(
            "ffmpeg converted {} ({} bytes)",
            input.display(),
            bytes.len()
        );

        Ok(bytes)
    }
}

/// Forward `-progress` output as fractions of `duration` until the pipe closes.
fn read_progress<R: BufRead>(
    reader: R,
    duration: Option<Duration>,
    on_event: &mut dyn FnMut(TranscodeEvent),
) -> std::io::Result<()> {
    for line in reader.lines() {
        match parse_progress_line(&line?) {
            Some(ProgressLine::OutTime(time)) => {
                if let Some(total) = duration.filter(|d| !d.is_zero()) {
                    on_event(TranscodeEvent::Progress(
                        time.as_secs_f64() / total.as_secs_f64(),
                    ));
                }
            }
            Some(ProgressLine::End) => on_event(TranscodeEvent::Progress(1.0)),
            None => {}
        }
    }
    Ok(())
}

/// Container duration as reported by `ffprobe`
fn media_duration(path: &Path) -> Option<Duration> {
    let output = Command::new("ffprobe")
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration",
            "-of",
            "default=noprint_wrappers=1:nokey=1",
        ])
        .arg(path)
        .output()
        .ok()?;

    if !output.status.success() {
        return None;
    }

    parse_duration(&String::from_utf8_lossy(&output.stdout))
}

fn parse_duration(text: &str) -> Option<Duration> {
    let seconds: f64 = text.trim().parse().ok()?;
    (seconds.is_finite() && seconds > 0.0).then(|| Duration::from_secs_f64(seconds))
}

pub fn is_ffmpeg_available() -> bool {
    Command::new("ffmpeg").arg("-version").output().is_ok()
}
