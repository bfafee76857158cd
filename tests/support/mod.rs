//! Shared helpers for integration tests: a tiny blocking HTTP server and a
//! sample DASH manifest.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

/// One request seen by the server.
#[derive(Debug, Clone)]
pub struct SeenRequest {
    /// Path without the query string.
    pub path: String,
    pub user_agent: Option<String>,
}

/// HTTP/1.1 server on an ephemeral port, one thread per connection.
///
/// The handler receives the request path (query stripped) and how many
/// times that path has been requested so far, including this request.
pub struct TestServer {
    base_url: String,
    requests: Arc<Mutex<Vec<SeenRequest>>>,
}

impl TestServer {
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, usize) -> (u16, Vec<u8>) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind test server");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler = Arc::new(handler);

        let seen = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { continue };
                let handler = Arc::clone(&handler);
                let seen = Arc::clone(&seen);
                thread::spawn(move || serve(stream, handler.as_ref(), &seen));
            }
        });

        Self { base_url, requests }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Number of requests for `path`.
    pub fn hits(&self, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.path == path)
            .count()
    }

    pub fn requests(&self) -> Vec<SeenRequest> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve<F>(mut stream: TcpStream, handler: &F, seen: &Mutex<Vec<SeenRequest>>)
where
    F: Fn(&str, usize) -> (u16, Vec<u8>),
{
    let Ok(clone) = stream.try_clone() else { return };
    let mut reader = BufReader::new(clone);

    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }

    let mut user_agent = None;
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line) {
            Ok(0) | Err(_) => break,
            Ok(_) if line.trim().is_empty() => break,
            Ok(_) => {
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("user-agent") {
                        user_agent = Some(value.trim().to_string());
                    }
                }
            }
        }
    }

    let target = request_line.split_whitespace().nth(1).unwrap_or("/");
    let path = target.split('?').next().unwrap_or(target).to_string();
    let count = {
        let mut seen = seen.lock().unwrap();
        seen.push(SeenRequest {
            path: path.clone(),
            user_agent,
        });
        seen.iter().filter(|request| request.path == path).count()
    };

    let (status, body) = handler(&path, count);
    let reason = match status {
        200 => "OK",
        403 => "Forbidden",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown",
    };
    let header = format!(
        "HTTP/1.1 {status} {reason}\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    );
    let _ = stream.write_all(header.as_bytes());
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

/// A two-track manifest whose templates point at `base`.
pub fn sample_manifest(base: &str, duration: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<MPD xmlns="urn:mpeg:dash:schema:mpd:2011" type="static" mediaPresentationDuration="{duration}" minBufferTime="PT2S" profiles="urn:mpeg:dash:profile:isoff-live:2011">
  <Period id="0" start="PT0S">
    <AdaptationSet id="0" mimeType="video/mp4" segmentAlignment="true">
      <Representation id="v0" codecs="avc1.64001f" bandwidth="800000" width="1280" height="720">
        <SegmentTemplate timescale="1000" duration="4000" startNumber="0" initialization="{base}/video/init.mp4?token=abc&amp;sig=1" media="{base}/video/seg-$Number$.m4s?token=abc&amp;sig=1"/>
      </Representation>
    </AdaptationSet>
    <AdaptationSet id="1" mimeType="audio/mp4" lang="en">
      <Representation id="a0" codecs="mp4a.40.2" bandwidth="96000" audioSamplingRate="48000">
        <SegmentTemplate timescale="1000" duration="4000" startNumber="0" initialization="{base}/audio/init.mp4?token=abc&amp;sig=1" media="{base}/audio/seg-$Number$.m4s?token=abc&amp;sig=1"/>
      </Representation>
    </AdaptationSet>
  </Period>
</MPD>
"#
    )
}

/// Serve `manifest` at `/lecture/GenerateVideoSource.mpd`, init segments for
/// both tracks, and media segments `0..segments` for both tracks.
pub fn lecture_handler(
    manifest: Arc<Mutex<String>>,
    segments: u64,
) -> impl Fn(&str, usize) -> (u16, Vec<u8>) + Send + Sync + 'static {
    move |path, _count| {
        if path == "/lecture/GenerateVideoSource.mpd" {
            return (200, manifest.lock().unwrap().clone().into_bytes());
        }
        if path.ends_with("/init.mp4") {
            return (200, b"ftypinit".to_vec());
        }
        let index = path
            .rsplit_once("seg-")
            .and_then(|(_, tail)| tail.strip_suffix(".m4s"))
            .and_then(|number| number.parse::<u64>().ok());
        match index {
            Some(index) if index < segments => (200, format!("moof{index}").into_bytes()),
            _ => (404, Vec::new()),
        }
    }
}
