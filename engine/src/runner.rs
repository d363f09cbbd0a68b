//! JSON lines request runner
//!
//! Reads one request object per line and writes one response object per
//! line, in order. Evaluation runs on the blocking pool; a bad line produces
//! an error response and the runner moves on.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use shared::{BatchVerdict, LonLat, PhotoReport, PlotVerdict};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use uuid::Uuid;

use crate::engine::VerificationEngine;
use crate::error::{EngineError, ErrorDetail};

/// One submission
#[derive(Debug, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Request {
    Plot {
        request_id: Option<String>,
        plot_id: String,
        owner_id: String,
        boundary: Vec<LonLat>,
        /// Base64-encoded evidence photos
        #[serde(default)]
        photos: Vec<String>,
    },
    PlotKml {
        request_id: Option<String>,
        plot_id: String,
        owner_id: String,
        kml: String,
    },
    PlotGeojson {
        request_id: Option<String>,
        plot_id: String,
        owner_id: String,
        geojson: serde_json::Value,
    },
    Batch {
        request_id: Option<String>,
        biomass_in: f64,
        char_out: f64,
        category: String,
    },
    Photo {
        request_id: Option<String>,
        image_base64: String,
        #[serde(default)]
        known_hashes: Vec<String>,
    },
}

impl Request {
    fn request_id(&self) -> Option<&str> {
        match self {
            Request::Plot { request_id, .. }
            | Request::PlotKml { request_id, .. }
            | Request::PlotGeojson { request_id, .. }
            | Request::Batch { request_id, .. }
            | Request::Photo { request_id, .. } => request_id.as_deref(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseBody {
    Plot(Box<PlotVerdict>),
    Batch(Box<BatchVerdict>),
    Photo(Box<PhotoReport>),
    Error(ErrorDetail),
}

#[derive(Debug, Serialize)]
pub struct Response {
    pub request_id: String,
    #[serde(flatten)]
    pub body: ResponseBody,
}

/// Counts of processed lines
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub processed: usize,
    pub failed: usize,
}

/// Undecodable payloads are passed through as empty and reported unreadable
fn decode_image(encoded: &str) -> Vec<u8> {
    STANDARD.decode(encoded.trim()).unwrap_or_else(|e| {
        tracing::warn!("Photo payload is not valid base64: {}", e);
        Vec::new()
    })
}

/// Evaluate one request synchronously
pub fn handle_request(engine: &VerificationEngine, request: Request) -> Response {
    let request_id = request
        .request_id()
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let result = match request {
        Request::Plot {
            plot_id,
            owner_id,
            boundary,
            photos,
            ..
        } => {
            let photos: Vec<Vec<u8>> = photos.iter().map(|p| decode_image(p)).collect();
            engine
                .plot_verdict(&boundary, &owner_id, &plot_id, &photos)
                .map(|v| ResponseBody::Plot(Box::new(v)))
        }
        Request::PlotKml {
            plot_id,
            owner_id,
            kml,
            ..
        } => engine
            .verify_plot_kml(&kml, &owner_id, &plot_id)
            .map(|v| ResponseBody::Plot(Box::new(v))),
        Request::PlotGeojson {
            plot_id,
            owner_id,
            geojson,
            ..
        } => engine
            .verify_plot_geojson(&geojson.to_string(), &owner_id, &plot_id)
            .map(|v| ResponseBody::Plot(Box::new(v))),
        Request::Batch {
            biomass_in,
            char_out,
            category,
            ..
        } => engine
            .evaluate_batch(biomass_in, char_out, &category)
            .map(|v| ResponseBody::Batch(Box::new(v))),
        Request::Photo {
            image_base64,
            known_hashes,
            ..
        } => Ok(ResponseBody::Photo(Box::new(
            engine.analyze_photo(&decode_image(&image_base64), &known_hashes),
        ))),
    };

    Response {
        body: result.unwrap_or_else(|e| ResponseBody::Error(e.to_response().error)),
        request_id,
    }
}

fn parse_line(line: &str) -> Result<Request, EngineError> {
    serde_json::from_str(line).map_err(|e| EngineError::InvalidRequest(e.to_string()))
}

/// Process requests until the reader is exhausted
pub async fn run<R, W>(engine: Arc<VerificationEngine>, reader: R, mut writer: W) -> anyhow::Result<RunSummary>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();
    let mut summary = RunSummary::default();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match parse_line(&line) {
            Ok(request) => {
                let engine = engine.clone();
                tokio::task::spawn_blocking(move || handle_request(&engine, request)).await?
            }
            Err(e) => Response {
                request_id: Uuid::new_v4().to_string(),
                body: ResponseBody::Error(e.to_response().error),
            },
        };

        summary.processed += 1;
        if matches!(response.body, ResponseBody::Error(_)) {
            summary.failed += 1;
        }

        let mut encoded = serde_json::to_vec(&response)?;
        encoded.push(b'\n');
        writer.write_all(&encoded).await?;
    }

    writer.flush().await?;
    Ok(summary)
}
