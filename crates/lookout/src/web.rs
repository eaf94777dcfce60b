//! Live viewing over HTTP.
//!
//! Serves a sliding HLS-style playlist over the segment ring plus the
//! raw segment bodies. The oldest held segment is next in line for
//! eviction, so when more than one is held it is left out of the
//! playlist; everything advertised stays resolvable until at least the
//! next push.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::segment::{Segment, SegmentRing};

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html>
<head><title>lookout</title></head>
<body style="margin:0;background:#000">
<video id="v" controls autoplay muted style="width:100%;height:100vh"></video>
<script src="https://cdn.jsdelivr.net/npm/hls.js@1"></script>
<script>
var video = document.getElementById('v');
if (Hls.isSupported()) {
  var hls = new Hls({liveSyncDurationCount: 1});
  hls.loadSource('/playlist.m3u8');
  hls.attachMedia(video);
} else {
  video.src = '/playlist.m3u8';
}
</script>
</body>
</html>
"#;

#[derive(Clone)]
struct AppState {
    ring: Arc<SegmentRing>,
}

pub fn router(ring: Arc<SegmentRing>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/playlist.m3u8", get(playlist))
        .route("/segment/{id}", get(segment_body))
        .with_state(AppState { ring })
}

/// Bind and serve until cancellation.
pub async fn serve(
    ring: Arc<SegmentRing>,
    addr: &str,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("live view listening on {addr}");
    axum::serve(listener, router(ring))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn playlist(State(state): State<AppState>) -> impl IntoResponse {
    let segments = state.ring.snapshot();
    (
        [(header::CONTENT_TYPE, "application/vnd.apple.mpegurl")],
        render_playlist(&segments),
    )
}

fn render_playlist(segments: &[Segment]) -> String {
    let advertised = if segments.len() > 1 {
        &segments[1..]
    } else {
        segments
    };

    let target = advertised
        .iter()
        .map(|s| s.duration_secs().ceil() as u64)
        .max()
        .unwrap_or(10);

    let mut out = String::new();
    out.push_str("#EXTM3U\n");
    out.push_str("#EXT-X-VERSION:3\n");
    out.push_str("#EXT-X-MEDIA-SEQUENCE:0\n");
    out.push_str(&format!("#EXT-X-TARGETDURATION:{target}\n"));
    for seg in advertised {
        out.push_str(&format!("#EXTINF:{:.3},\n", seg.duration_secs()));
        out.push_str(&format!("/segment/{}\n", seg.id()));
    }
    out
}

async fn segment_body(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let id: i64 = match id.trim_end_matches(".ts").parse() {
        Ok(id) => id,
        Err(_) => return (StatusCode::BAD_REQUEST, "bad segment id").into_response(),
    };

    match state.ring.find(id) {
        Some(seg) => ([(header::CONTENT_TYPE, "video/mp2t")], seg.data).into_response(),
        None => (StatusCode::NOT_FOUND, "segment not found").into_response(),
    }
}
