//! HTTP console: the operator page, the MJPEG live stream and the control
//! endpoints. Handlers only touch the shared [`PipelineContext`]; all heavy
//! lifting happens in the ingest loop.

use std::convert::Infallible;
use std::sync::Arc;

use anyhow::Context;
use axum::body::Body;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{Html, IntoResponse, Response};
use axum::{Json, Router};
use axum::routing::get;
use bytes::{Bytes, BytesMut};
use serde::Serialize;
use tracing::info;

use crate::context::PipelineContext;
use crate::error::SnapshotError;

pub fn router(ctx: Arc<PipelineContext>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/video_feed", get(video_feed))
        .route("/capture_trigger", get(capture_trigger))
        .route("/toggle_recording", get(toggle_recording))
        .route("/recording_status", get(recording_status))
        .with_state(ctx)
}

/// Binds the console listener and serves until process termination. A bind
/// failure is the one fatal error of the whole program.
pub async fn serve(ctx: Arc<PipelineContext>, addr: &str) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding console listener on {addr}"))?;
    info!(addr = %addr, "console listening");
    axum::serve(listener, router(ctx))
        .await
        .context("serving console")?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(PAGE)
}

/// Wraps one JPEG into one part of the multipart stream.
fn multipart_part(jpeg: &Bytes) -> Bytes {
    let mut part = BytesMut::with_capacity(jpeg.len() + 64);
    part.extend_from_slice(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n");
    part.extend_from_slice(jpeg);
    part.extend_from_slice(b"\r\n");
    part.freeze()
}

/// Long-lived multipart/x-mixed-replace stream of annotated frames. Each
/// viewer holds its own tap onto the frame bus, so a stalled connection skips
/// frames without affecting anyone else. The response ends when the ingest
/// side of the bus is gone.
async fn video_feed(State(ctx): State<Arc<PipelineContext>>) -> impl IntoResponse {
    let mut tap = ctx.frames.subscribe();
    let stream = async_stream::stream! {
        while let Some(frame) = tap.next().await {
            yield Ok::<Bytes, Infallible>(multipart_part(&frame));
        }
    };
    (
        [
            (
                header::CONTENT_TYPE,
                "multipart/x-mixed-replace; boundary=frame",
            ),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
}

/// Saves one raw photo to the dataset directory. 503 until the first frame
/// has arrived; disk problems come back as 500 with the error text.
async fn capture_trigger(State(ctx): State<Arc<PipelineContext>>) -> Response {
    let result = tokio::task::spawn_blocking(move || ctx.snapshots.capture()).await;
    match result {
        Ok(Ok(name)) => format!("Saved: {name}").into_response(),
        Ok(Err(SnapshotError::Unavailable)) => {
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
        Ok(Err(e)) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("capture task failed: {e}"),
        )
            .into_response(),
    }
}

/// Flips the desired recording state. The reply reflects the request; the
/// actual writer transition happens on the ingest loop's next iteration.
async fn toggle_recording(State(ctx): State<Arc<PipelineContext>>) -> &'static str {
    if ctx.toggle_recording() {
        info!("recording start requested");
        "Recording started"
    } else {
        info!("recording stop requested");
        "Recording stopped"
    }
}

#[derive(Debug, Serialize)]
struct RecordingStatus {
    recording: bool,
}

/// Recording state as mirrored by the ingest loop; the page polls this to
/// keep its button and indicator in sync.
async fn recording_status(State(ctx): State<Arc<PipelineContext>>) -> Json<RecordingStatus> {
    Json(RecordingStatus {
        recording: ctx.is_recording(),
    })
}

const PAGE: &str = r##"
<html>
<head>
    <title>Jetson Pilot</title>
    <style>
        body { background: #222; color: #eee; text-align: center; font-family: monospace; overflow: hidden; }
        #container { position: relative; display: inline-block; border: 2px solid #444; margin-top: 20px; }
        img { width: 672px; image-rendering: pixelated; display: block; }
        #flash {
            position: absolute; top: 0; left: 0; width: 100%; height: 100%;
            background: white; opacity: 0; pointer-events: none; transition: opacity 0.1s;
        }
        #log { margin-top: 15px; color: #4CAF50; font-weight: bold; height: 20px; }
        .controls { margin-top: 20px; }
        button {
            background: #333; color: #eee; border: 1px solid #555; padding: 10px 20px;
            margin: 5px; cursor: pointer; font-size: 14px; border-radius: 4px;
        }
        button:hover { background: #444; }
        button.active { background: #4CAF50; }
        #recording-indicator {
            display: inline-block; width: 12px; height: 12px; border-radius: 50%;
            background: #666; margin-left: 10px; vertical-align: middle;
        }
        #recording-indicator.active { background: #ff4444; animation: blink 0.5s infinite; }
        @keyframes blink { 0%, 50% { opacity: 1; } 51%, 100% { opacity: 0.5; } }
    </style>
</head>
<body>
    <h1>Jetson Pilot</h1>
    <div style="color: #aaa;">[SPACE] or CLICK to Save Raw Photo</div>

    <div id="container" onclick="capture()">
        <div id="flash"></div>
        <img src="/video_feed" />
    </div>
    <div id="log">Ready.</div>

    <div class="controls">
        <button id="recordBtn" onclick="toggleRecording()">Start Recording</button>
        <span id="recording-indicator"></span>
    </div>

    <script>
        function capture() {
            const flash = document.getElementById('flash');
            flash.style.opacity = 0.8;
            setTimeout(() => { flash.style.opacity = 0; }, 100);

            fetch('/capture_trigger')
                .then(response => response.text())
                .then(msg => {
                    const log = document.getElementById('log');
                    log.innerText = msg;
                    log.style.opacity = 1;
                    setTimeout(() => { log.style.opacity = 0.5; }, 2000);
                })
                .catch(err => console.error(err));
        }

        function toggleRecording() {
            fetch('/toggle_recording')
                .then(response => response.text())
                .then(msg => {
                    const log = document.getElementById('log');
                    log.innerText = msg;
                    log.style.opacity = 1;
                    setTimeout(() => { log.style.opacity = 0.5; }, 2000);
                    updateRecordingButton();
                })
                .catch(err => console.error(err));
        }

        function updateRecordingButton() {
            fetch('/recording_status')
                .then(response => response.json())
                .then(data => {
                    const btn = document.getElementById('recordBtn');
                    const indicator = document.getElementById('recording-indicator');
                    if (data.recording) {
                        btn.innerText = 'Stop Recording';
                        btn.classList.add('active');
                        indicator.classList.add('active');
                    } else {
                        btn.innerText = 'Start Recording';
                        btn.classList.remove('active');
                        indicator.classList.remove('active');
                    }
                })
                .catch(err => console.error(err));
        }

        updateRecordingButton();
        setInterval(updateRecordingButton, 500);

        document.addEventListener('keydown', function(event) {
            if (event.code === 'Space') {
                event.preventDefault();
                capture();
            }
        });
    </script>
</body>
</html>
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use clap::Parser;

    fn context(dir: &std::path::Path) -> Arc<PipelineContext> {
        let dataset = dir.join("dataset");
        std::fs::create_dir_all(&dataset).unwrap();
        let config = Config::parse_from([
            "jetson_pilot",
            "--dataset-dir",
            dataset.to_str().unwrap(),
            "--recording-dir",
            dir.to_str().unwrap(),
        ]);
        PipelineContext::new(config).0
    }

    #[test]
    fn multipart_parts_carry_the_boundary_framing() {
        let part = multipart_part(&Bytes::from_static(b"\xFF\xD8jpeg\xFF\xD9"));
        assert!(part.starts_with(b"--frame\r\nContent-Type: image/jpeg\r\n\r\n"));
        assert!(part.ends_with(b"\xFF\xD8jpeg\xFF\xD9\r\n"));
    }

    #[tokio::test]
    async fn capture_before_any_frame_is_service_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        let response = capture_trigger(State(ctx)).await;
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn capture_reports_the_saved_file_name() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        ctx.store.set_raw(Bytes::from_static(b"\xFF\xD8fake\xFF\xD9"));
        let response = capture_trigger(State(Arc::clone(&ctx))).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"Saved: 0.jpg");
        assert!(tmp.path().join("dataset").join("0.jpg").exists());
    }

    #[tokio::test]
    async fn toggle_replies_with_the_requested_state() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        assert_eq!(
            toggle_recording(State(Arc::clone(&ctx))).await,
            "Recording started"
        );
        assert_eq!(
            toggle_recording(State(Arc::clone(&ctx))).await,
            "Recording stopped"
        );
    }

    #[tokio::test]
    async fn status_mirrors_the_loop_side_state_not_the_request() {
        let tmp = tempfile::tempdir().unwrap();
        let ctx = context(tmp.path());
        toggle_recording(State(Arc::clone(&ctx))).await;
        // The ingest loop has not applied the toggle yet.
        let status = recording_status(State(ctx)).await;
        assert!(!status.0.recording);
    }

    #[test]
    fn page_references_every_endpoint_it_depends_on() {
        for endpoint in ["/video_feed", "/capture_trigger", "/toggle_recording", "/recording_status"] {
            assert!(PAGE.contains(endpoint), "page is missing {endpoint}");
        }
    }
}
