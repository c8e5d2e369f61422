use std::io::Read;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tracing::debug;

use crate::config::ServiceConfig;
use crate::session::{Artifact, ImageSource};
use crate::stages::RequestMethod;

use super::{ProcessingService, ServiceError, ServiceReply, StageRequest};

/// Processing service reached over HTTP.
///
/// Each stage maps to `<base>/<operation>`. Stages without inputs are plain
/// `GET`s, parameterized stages `POST` a url-encoded form, and the upload
/// stage `POST`s `multipart/form-data` with the raster in the `image` part.
/// A static-map raster is downloaded first and uploaded the same way.
#[derive(Debug, Clone)]
pub struct HttpProcessingService {
    base_url: String,
    agent: ureq::Agent,
}

impl HttpProcessingService {
    pub fn new(config: &ServiceConfig) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("fieldtrace/", env!("CARGO_PKG_VERSION")))
            .build();
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            agent,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn get(&self, url: &str) -> Result<Vec<u8>, ServiceError> {
        let response = self.agent.get(url).call().map_err(map_ureq_error)?;
        read_body(response)
    }

    /// Download a static map capture; returns the bytes and their MIME type.
    fn download_capture(&self, url: &str) -> Result<(Vec<u8>, String), ServiceError> {
        debug!(url = %url, "Downloading static map capture");
        let response = self.agent.get(url).call().map_err(map_ureq_error)?;
        let mime = response
            .header("Content-Type")
            .and_then(|v| v.split(';').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .unwrap_or("image/jpeg")
            .to_string();
        Ok((read_body(response)?, mime))
    }

    fn upload(
        &self,
        url: &str,
        request: &StageRequest,
    ) -> Result<ureq::Response, ServiceError> {
        let (data, mime) = match &request.image {
            Some(ImageSource::Bytes { data, mime }) => (data.to_vec(), mime.to_string()),
            Some(ImageSource::StaticMapUrl(map_url)) => self.download_capture(map_url)?,
            None => {
                return Err(ServiceError::Request(format!(
                    "{} uploads a raster but none was supplied",
                    request.operation
                )))
            }
        };

        let mut form = Multipart::new(&data);
        form.file("image", &upload_filename(&mime), &mime, &data);
        for (key, value) in &request.fields {
            form.text(key, value);
        }
        let (content_type, body) = form.finish();
        self.agent
            .post(url)
            .set("Content-Type", &content_type)
            .send_bytes(&body)
            .map_err(map_ureq_error)
    }
}

fn map_ureq_error(err: ureq::Error) -> ServiceError {
    match err {
        ureq::Error::Status(code, response) => ServiceError::Status {
            code,
            body: response
                .into_string()
                .unwrap_or_else(|e| format!("<unreadable response body: {e}>")),
        },
        ureq::Error::Transport(transport) => ServiceError::Transport(transport.to_string()),
    }
}

fn read_body(response: ureq::Response) -> Result<Vec<u8>, ServiceError> {
    let mut bytes = Vec::new();
    response
        .into_reader()
        .read_to_end(&mut bytes)
        .map_err(|e| ServiceError::Body(e.to_string()))?;
    Ok(bytes)
}

fn upload_filename(mime: &str) -> String {
    let ext = match mime {
        "image/jpeg" => "jpg",
        other => other.rsplit('/').next().unwrap_or("bin"),
    };
    format!("raster.{ext}")
}

/// `multipart/form-data` body builder.
struct Multipart {
    boundary: String,
    body: Vec<u8>,
}

impl Multipart {
    /// Pick a boundary that does not occur in `payload`.
    fn new(payload: &[u8]) -> Self {
        let seed = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();
        let mut attempt = 0u32;
        let boundary = loop {
            let candidate = format!("fieldtrace-{seed:x}-{attempt}");
            let needle = candidate.as_bytes();
            if !payload.windows(needle.len()).any(|w| w == needle) {
                break candidate;
            }
            attempt += 1;
        };
        Self {
            boundary,
            body: Vec::new(),
        }
    }

    fn text(&mut self, name: &str, value: &str) {
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n",
            self.boundary
        );
        self.body.extend_from_slice(head.as_bytes());
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
    }

    fn file(&mut self, name: &str, filename: &str, mime: &str, data: &[u8]) {
        let head = format!(
            "--{}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {mime}\r\n\r\n",
            self.boundary
        );
        self.body.extend_from_slice(head.as_bytes());
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
    }

    /// Close the body; returns the `Content-Type` header value and the bytes.
    fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

impl ProcessingService for HttpProcessingService {
    fn invoke(&self, request: &StageRequest) -> Result<ServiceReply, ServiceError> {
        let url = self.endpoint(request.operation);
        debug!(
            stage = %request.stage,
            url = %url,
            method = ?request.method,
            "Invoking processing service"
        );

        let response = match request.method {
            RequestMethod::Get => {
                let mut call = self.agent.get(&url);
                for (key, value) in &request.fields {
                    call = call.query(key, value);
                }
                call.call().map_err(map_ureq_error)?
            }
            RequestMethod::Form => {
                let form: Vec<(&str, &str)> = request
                    .fields
                    .iter()
                    .map(|(k, v)| (*k, v.as_str()))
                    .collect();
                self.agent.post(&url).send_form(&form).map_err(map_ureq_error)?
            }
            RequestMethod::Upload => self.upload(&url, request)?,
        };

        let body = response
            .into_string()
            .map_err(|e| ServiceError::Body(e.to_string()))?;
        Ok(ServiceReply::from_token(&body))
    }

    fn fetch_artifact(&self, artifact: &Artifact) -> Result<Vec<u8>, ServiceError> {
        let url = artifact.url(&self.base_url);
        debug!(stage = %artifact.stage, url = %url, "Fetching artifact");
        self.get(&url)
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}
