use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::SystemTime;

use fieldtrace_core::config::ServiceConfig;
use fieldtrace_core::service::{
    HttpProcessingService, ProcessingService, ServiceError, ServiceReply, StageRequest,
};
use fieldtrace_core::session::{Artifact, ImageSource};
use fieldtrace_core::stages::{ArtifactKind, RequestMethod, StageId};

/// Accept one connection per canned response, in order; the join handle
/// yields the raw request texts.
fn serve(responses: Vec<String>) -> (String, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let handle = thread::spawn(move || {
        let mut requests = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().unwrap();
            requests.push(read_request(&mut stream));
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();
        }
        requests
    });
    (format!("http://{addr}"), handle)
}

fn response(status: &str, content_type: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
        body.len()
    )
}

/// Serve exactly one HTTP request with a fixed plain-text reply.
fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
    let (url, handle) = serve(vec![response(status, "text/plain", body)]);
    let handle = thread::spawn(move || handle.join().unwrap().remove(0));
    (url, handle)
}

fn read_request(stream: &mut TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        let n = stream.read(&mut chunk).unwrap();
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
            continue;
        };
        let head = String::from_utf8_lossy(&buf[..end]).to_ascii_lowercase();
        let length = head
            .lines()
            .find_map(|l| l.strip_prefix("content-length:"))
            .map(|v| v.trim().parse::<usize>().unwrap())
            .unwrap_or(0);
        if buf.len() >= end + 4 + length {
            break;
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn service(base_url: &str) -> HttpProcessingService {
    HttpProcessingService::new(&ServiceConfig {
        base_url: base_url.to_string(),
        timeout_secs: 10,
    })
}

fn density_request() -> StageRequest {
    StageRequest {
        stage: StageId::DensityMask,
        operation: "process_step4",
        method: RequestMethod::Form,
        fields: vec![("windowSize", "7".to_string())],
        image: None,
    }
}

// ---------------------------------------------------------------------------
// invoke
// ---------------------------------------------------------------------------

#[test]
fn test_invoke_success_token() {
    let (url, server) = serve_once("200 OK", "success\n");
    let reply = service(&url).invoke(&density_request()).unwrap();
    assert_eq!(reply, ServiceReply::Success);

    let raw = server.join().unwrap();
    assert!(raw.starts_with("POST /process_step4 HTTP/1.1"), "got: {raw}");
    assert!(raw.to_ascii_lowercase().contains("application/x-www-form-urlencoded"));
    assert!(raw.ends_with("windowSize=7"), "got: {raw}");
}

#[test]
fn test_invoke_failure_message() {
    let (url, server) = serve_once("200 OK", "Selected point is not inside a field");
    let reply = service(&url).invoke(&density_request()).unwrap();
    assert_eq!(
        reply,
        ServiceReply::Failure("Selected point is not inside a field".into())
    );
    server.join().unwrap();
}

#[test]
fn test_invoke_http_error_status() {
    let (url, server) = serve_once("500 Internal Server Error", "traceback");
    let err = service(&url).invoke(&density_request()).unwrap_err();
    assert_eq!(
        err,
        ServiceError::Status {
            code: 500,
            body: "traceback".into()
        }
    );
    server.join().unwrap();
}

fn crop_request(image: ImageSource) -> StageRequest {
    StageRequest {
        stage: StageId::Crop,
        operation: "process_step2",
        method: RequestMethod::Upload,
        fields: vec![
            ("pointX", "320".into()),
            ("pointY", "321".into()),
            ("radiusSize", "50".into()),
        ],
        image: Some(image),
    }
}

/// Boundary from a `multipart/form-data` content type header.
fn boundary(raw: &str) -> String {
    let head = raw.split("\r\n\r\n").next().unwrap();
    let line = head
        .lines()
        .find(|l| l.to_ascii_lowercase().starts_with("content-type:"))
        .unwrap();
    assert!(line.contains("multipart/form-data"), "got: {line}");
    line.split("boundary=").nth(1).unwrap().trim().to_string()
}

fn part(raw: &str, name: &str) -> String {
    let marker = format!("name=\"{name}\"");
    let start = raw.find(&marker).unwrap_or_else(|| panic!("no part {name} in {raw}"));
    let rest = &raw[start..];
    let body = &rest[rest.find("\r\n\r\n").unwrap() + 4..];
    body[..body.find("\r\n--").unwrap()].to_string()
}

#[test]
fn test_invoke_uploads_image_as_multipart() {
    let (url, server) = serve_once("200 OK", "success");
    let image = ImageSource::Bytes {
        data: Arc::from(&b"not really a png"[..]),
        mime: "image/png",
    };
    let reply = service(&url).invoke(&crop_request(image)).unwrap();
    assert_eq!(reply, ServiceReply::Success);

    let raw = server.join().unwrap();
    assert!(raw.starts_with("POST /process_step2 HTTP/1.1"), "got: {raw}");
    let boundary = boundary(&raw);
    assert!(raw.trim_end().ends_with(&format!("--{boundary}--")), "got: {raw}");
    assert!(raw.contains("name=\"image\"; filename=\"raster.png\"\r\nContent-Type: image/png"));
    assert_eq!(part(&raw, "image"), "not really a png");
    assert_eq!(part(&raw, "pointX"), "320");
    assert_eq!(part(&raw, "pointY"), "321");
    assert_eq!(part(&raw, "radiusSize"), "50");
}

#[test]
fn test_invoke_uploads_downloaded_static_map() {
    let (url, server) = serve(vec![
        response("200 OK", "image/jpeg", "JPEGCAPTURE"),
        response("200 OK", "text/plain", "success"),
    ]);
    let image = ImageSource::StaticMapUrl(format!("{url}/staticmap?center=32.9,35.12"));
    let reply = service(&url).invoke(&crop_request(image)).unwrap();
    assert_eq!(reply, ServiceReply::Success);

    let raw = server.join().unwrap();
    assert!(
        raw[0].starts_with("GET /staticmap?center=32.9,35.12 HTTP/1.1"),
        "got: {}",
        raw[0]
    );
    assert!(raw[1].starts_with("POST /process_step2 HTTP/1.1"), "got: {}", raw[1]);
    boundary(&raw[1]);
    assert_eq!(part(&raw[1], "image"), "JPEGCAPTURE");
    assert!(raw[1].contains("filename=\"raster.jpg\"\r\nContent-Type: image/jpeg"));
    assert!(!raw[1].contains("staticMapUrl"));
}

#[test]
fn test_static_map_download_failure_is_reported() {
    let (url, server) = serve(vec![response("403 Forbidden", "text/plain", "bad key")]);
    let image = ImageSource::StaticMapUrl(format!("{url}/staticmap"));
    let err = service(&url).invoke(&crop_request(image)).unwrap_err();
    assert_eq!(
        err,
        ServiceError::Status {
            code: 403,
            body: "bad key".into()
        }
    );
    assert_eq!(server.join().unwrap().len(), 1);
}

#[test]
fn test_upload_without_raster_is_rejected() {
    let mut request = crop_request(ImageSource::StaticMapUrl(String::new()));
    request.image = None;
    let err = service("http://127.0.0.1:9").invoke(&request).unwrap_err();
    assert!(matches!(err, ServiceError::Request(_)), "got: {err}");
}

#[test]
fn test_invoke_get_stage_sends_no_body() {
    let (url, server) = serve_once("200 OK", "success");
    let request = StageRequest {
        stage: StageId::ColorMask,
        operation: "process_step3",
        method: RequestMethod::Get,
        fields: Vec::new(),
        image: None,
    };
    assert_eq!(service(&url).invoke(&request).unwrap(), ServiceReply::Success);

    let raw = server.join().unwrap();
    assert!(raw.starts_with("GET /process_step3 HTTP/1.1"), "got: {raw}");
    assert!(raw.ends_with("\r\n\r\n"), "got: {raw}");
}

#[test]
fn test_error_status_with_truncated_body_keeps_read_error() {
    let truncated = "HTTP/1.1 502 Bad Gateway\r\nContent-Type: text/plain\r\nContent-Length: 100\r\nConnection: close\r\n\r\npartial".to_string();
    let (url, server) = serve(vec![truncated]);
    let err = service(&url).invoke(&density_request()).unwrap_err();
    match err {
        ServiceError::Status { code, body } => {
            assert_eq!(code, 502);
            assert!(body.starts_with("<unreadable response body"), "got: {body}");
        }
        other => panic!("unexpected error: {other}"),
    }
    server.join().unwrap();
}

#[test]
fn test_invoke_transport_error() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let err = service(&format!("http://127.0.0.1:{port}"))
        .invoke(&density_request())
        .unwrap_err();
    assert!(matches!(err, ServiceError::Transport(_)), "got: {err}");
}

// ---------------------------------------------------------------------------
// fetch_artifact
// ---------------------------------------------------------------------------

#[test]
fn test_fetch_artifact_uses_generation_url() {
    let (url, server) = serve_once("200 OK", "JPEGDATA");
    let artifact = Artifact {
        stage: StageId::ColorMask,
        name: "step3_green_mask.jpg",
        kind: ArtifactKind::Image,
        preview: None,
        generation: 7,
        generated_at: SystemTime::now(),
    };
    let bytes = service(&url).fetch_artifact(&artifact).unwrap();
    assert_eq!(bytes, b"JPEGDATA");

    let raw = server.join().unwrap();
    assert!(
        raw.starts_with("GET /display/step3_green_mask.jpg?v=7 HTTP/1.1"),
        "got: {raw}"
    );
}

#[test]
fn test_base_url_is_trimmed() {
    let svc = service("http://127.0.0.1:5000/");
    assert_eq!(svc.base_url(), Some("http://127.0.0.1:5000"));
}
