use std::time::Duration;

use reqwest::blocking::multipart::{Form, Part};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;

use crate::detection::domain::gaze_detector::{DetectError, Detection, GazeDetector};
use crate::gaze::domain::face_measurement::{
    BoundingBox, EyeDirection, HeadPose, RawFaceMeasurement,
};
use crate::shared::constants::MAX_IMAGE_BYTES;
use crate::shared::encoded_image::EncodedImage;

/// Multipart field the analysis service reads the frame from.
const IMAGE_FIELD: &str = "image";

/// Client for the face-analysis HTTP service.
///
/// Posts each frame as `multipart/form-data` and maps the service's
/// Rekognition-style face details onto `RawFaceMeasurement`.
pub struct HttpGazeDetector {
    client: Client,
    endpoint: Url,
}

impl HttpGazeDetector {
    pub fn new(endpoint: &str) -> Result<Self, DetectError> {
        Self::build(endpoint, None)
    }

    pub fn with_timeout(endpoint: &str, timeout: Duration) -> Result<Self, DetectError> {
        Self::build(endpoint, Some(timeout))
    }

    fn build(endpoint: &str, timeout: Option<Duration>) -> Result<Self, DetectError> {
        let url = Url::parse(endpoint)
            .map_err(|e| DetectError::InvalidEndpoint(format!("{endpoint}: {e}")))?;

        let mut builder = Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder.build().map_err(|e| DetectError::Transport {
            endpoint: endpoint.to_string(),
            source: Box::new(e),
        })?;

        Ok(Self {
            client,
            endpoint: url,
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    /// The service's health URL, a sibling of the analyze endpoint.
    pub fn health_url(&self) -> Result<Url, DetectError> {
        self.endpoint
            .join("health")
            .map_err(|e| DetectError::InvalidEndpoint(e.to_string()))
    }

    /// Queries the health endpoint and returns its raw JSON body.
    pub fn check_health(&self) -> Result<serde_json::Value, DetectError> {
        let url = self.health_url()?;
        let response = self
            .client
            .get(url.clone())
            .send()
            .map_err(|e| transport_error(url.as_str(), e))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| transport_error(url.as_str(), e))?;
        if !status.is_success() {
            return Err(provider_error(status.as_u16(), &body));
        }
        serde_json::from_str(&body).map_err(|e| DetectError::InvalidResponse(e.to_string()))
    }
}

impl GazeDetector for HttpGazeDetector {
    fn detect(&self, image: &EncodedImage) -> Result<Detection, DetectError> {
        if image.len() > MAX_IMAGE_BYTES {
            return Err(DetectError::ImageTooLarge {
                size: image.len(),
                max: MAX_IMAGE_BYTES,
            });
        }

        let endpoint = self.endpoint.as_str();
        let part = Part::bytes(image.bytes().to_vec())
            .file_name(image.file_name())
            .mime_str(image.mime_type())
            .map_err(|e| transport_error(endpoint, e))?;
        let form = Form::new().part(IMAGE_FIELD, part);

        log::debug!("Submitting {} byte frame to {endpoint}", image.len());
        let response = self
            .client
            .post(self.endpoint.clone())
            .multipart(form)
            .send()
            .map_err(|e| transport_error(endpoint, e))?;

        let status = response.status();
        let body = response.text().map_err(|e| transport_error(endpoint, e))?;
        if !status.is_success() {
            return Err(provider_error(status.as_u16(), &body));
        }

        parse_analysis(&body)
    }
}

fn transport_error(endpoint: &str, e: reqwest::Error) -> DetectError {
    DetectError::Transport {
        endpoint: endpoint.to_string(),
        source: Box::new(e),
    }
}

/// Builds a provider error from the service's `{error, details}` body,
/// falling back to the raw body text.
fn provider_error(status: u16, body: &str) -> DetectError {
    let message = match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            error,
            details: Some(details),
        }) => format!("{error}: {details}"),
        Ok(ErrorBody { error, .. }) => error,
        Err(_) => body.trim().to_string(),
    };
    DetectError::Provider { status, message }
}

// ── Wire format ──────────────────────────────────────────────────────

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
    details: Option<String>,
}

#[derive(Deserialize)]
struct AnalysisResponse {
    processed: ProcessedFaces,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessedFaces {
    faces_detected: usize,
    #[serde(default)]
    faces: Vec<WireFace>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireFace {
    confidence: f64,
    bounding_box: Option<WireBoundingBox>,
    head_pose: Option<WirePose>,
    eye_direction: Option<WireEyeDirection>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireBoundingBox {
    left: f64,
    top: f64,
    width: f64,
    height: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WirePose {
    yaw: f64,
    pitch: f64,
    roll: f64,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct WireEyeDirection {
    yaw: f64,
    pitch: f64,
    confidence: f64,
}

impl From<WireFace> for RawFaceMeasurement {
    fn from(face: WireFace) -> Self {
        RawFaceMeasurement {
            confidence: face.confidence,
            bounding_box: face.bounding_box.map(|b| BoundingBox {
                left: b.left,
                top: b.top,
                width: b.width,
                height: b.height,
            }),
            head_pose: face.head_pose.map(|p| HeadPose {
                yaw: p.yaw,
                pitch: p.pitch,
                roll: p.roll,
            }),
            eye_direction: face.eye_direction.map(|e| EyeDirection {
                yaw: e.yaw,
                pitch: e.pitch,
                confidence: e.confidence,
            }),
        }
    }
}

/// Parses the analyze endpoint's JSON body.
pub fn parse_analysis(body: &str) -> Result<Detection, DetectError> {
    let response: AnalysisResponse =
        serde_json::from_str(body).map_err(|e| DetectError::InvalidResponse(e.to_string()))?;
    let processed = response.processed;

    if processed.faces_detected > 0 && processed.faces.is_empty() {
        return Err(DetectError::InvalidResponse(format!(
            "facesDetected is {} but no faces were returned",
            processed.faces_detected
        )));
    }

    Ok(Detection {
        faces_detected: processed.faces_detected,
        faces: processed.faces.into_iter().map(Into::into).collect(),
    })
}
