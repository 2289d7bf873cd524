use anyhow::{Context, Result};
use reqwest::blocking::{multipart, Client};

use std::path::Path;
use std::time::Duration;

use super::command::ConversionRequest;
use super::{TranscodeEvent, Transcoder};

/// Conversion delegated to a server exposing `POST /api/convert`.
///
/// The request is multipart with the video under `file` and the preset as
/// JSON under `preset`; the response body is the converted MP4. No
/// progress is reported between upload and response.
#[derive(Debug, Clone)]
pub struct RemoteTranscoder {
    endpoint: String,
    client: Client,
}

impl RemoteTranscoder {
    pub fn new(endpoint: &str) -> Result<Self> {
        // conversions can take minutes; the blocking client defaults to 30s
        let client = Client::builder()
            .timeout(None::<Duration>)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self::with_client(endpoint, client))
    }

    pub fn with_client(endpoint: &str, client: Client) -> Self {
        Self {
            endpoint: endpoint.to_string(),
            client,
        }
    }

    pub fn convert_url(&self) -> String {
        format!("{}/api/convert", self.endpoint.trim_end_matches('/'))
    }
}

impl Transcoder for RemoteTranscoder {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn transcode(
        &self,
        input: &Path,
        request: &ConversionRequest,
        on_event: &mut dyn FnMut(TranscodeEvent),
    ) -> Result<Vec<u8>> {
        let url = self.convert_url();
        let preset = serde_json::to_string(&request.preset.to_json())?;

        let form = multipart::Form::new()
            .file("file", input)
            .with_context(|| format!("Failed to read {}", input.display()))?
            .text("preset", preset);

        on_event(TranscodeEvent::Log(format!("uploading to {url}")));

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .with_context(|| format!("Failed to reach {url}"))?;

        on_event(TranscodeEvent::Converting);

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            anyhow::bail!("Remote conversion failed with {status}: {}", body.trim());
        }

        let bytes = response
            .bytes()
            .context("Failed to read converted video")?
            .to_vec();
        on_event(TranscodeEvent::Progress(1.0));

        log::debug!("Remote conversion returned {} bytes", bytes.len());

        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::video::{JobState, ResolutionPreset, VideoJob};

    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::thread::JoinHandle;

    // Accept one connection, answer with `status` and `body`, hand back the raw request.
    fn serve_once(status: &'static str, body: &'static [u8]) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let request = read_request(&mut stream);
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            stream.write_all(head.as_bytes()).unwrap();
            stream.write_all(body).unwrap();
            request
        });
        (endpoint, handle)
    }

    fn read_request(stream: &mut TcpStream) -> String {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = stream.read(&mut buf).unwrap();
            if n == 0 {
                break;
            }
            data.extend_from_slice(&buf[..n]);

            let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let content_length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|value| value.trim().parse::<usize>().ok());
            let complete = match content_length {
                Some(len) => data.len() - (end + 4) >= len,
                None => data.ends_with(b"0\r\n\r\n"),
            };
            if complete {
                break;
            }
        }
        String::from_utf8_lossy(&data).into_owned()
    }

    fn local(endpoint: &str) -> RemoteTranscoder {
        let client = Client::builder().no_proxy().build().unwrap();
        RemoteTranscoder::with_client(endpoint, client)
    }

    fn clip() -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("clip.mp4");
        std::fs::write(&input, b"not really a video").unwrap();
        (dir, input)
    }

    #[test]
    fn posts_file_and_preset_and_returns_body() {
        let (_dir, input) = clip();
        let (endpoint, server) = serve_once("200 OK", b"converted-mp4");

        let remote = local(&endpoint);
        let request = ConversionRequest::main_download(ResolutionPreset::Hd);
        let mut events = Vec::new();
        let bytes = remote
            .transcode(&input, &request, &mut |event| events.push(event))
            .unwrap();

        assert_eq!(bytes, b"converted-mp4");
        assert!(events.contains(&TranscodeEvent::Converting));
        assert_eq!(events.last(), Some(&TranscodeEvent::Progress(1.0)));

        let raw = server.join().unwrap();
        assert!(raw.starts_with("POST /api/convert HTTP/1.1"));
        assert!(raw.to_ascii_lowercase().contains("multipart/form-data"));
        assert!(raw.contains(r#"name="file""#));
        assert!(raw.contains("not really a video"));
        assert!(raw.contains(r#"name="preset""#));
        assert!(raw.contains(r#""key":"medium""#));
        assert!(raw.contains(r#""resolution":"1280x720""#));
    }

    #[test]
    fn server_error_fails_the_job() {
        let (_dir, input) = clip();
        let (endpoint, server) = serve_once("500 Internal Server Error", b"boom");

        let remote = local(&endpoint);
        let request = ConversionRequest::main_download(ResolutionPreset::Hd);
        let mut job = VideoJob::new();
        let result = crate::video::run(&mut job, &remote, &input, &request);
        server.join().unwrap();

        assert!(result.is_err());
        let JobState::Failed { message } = job.state() else {
            panic!("expected a failed job, got {:?}", job.state());
        };
        assert!(message.contains("500"));
        let last = job.log().last().unwrap();
        assert!(last.starts_with("error:"));
        assert!(last.contains("boom"));
    }

    #[test]
    fn url_ignores_trailing_slash() {
        let remote = RemoteTranscoder::new("http://localhost:3001/").unwrap();
        assert_eq!(remote.convert_url(), "http://localhost:3001/api/convert");
    }

    #[test]
    fn unreachable_server_is_an_error() {
        let (_dir, input) = clip();

        // port 9 (discard) is never an HTTP server
        let remote = local("http://127.0.0.1:9");
        let request = ConversionRequest::main_download(ResolutionPreset::Hd);
        let mut events = Vec::new();
        let result = remote.transcode(&input, &request, &mut |event| events.push(event));

        assert!(result.is_err());
        assert!(!events.contains(&TranscodeEvent::Converting));
    }
}
