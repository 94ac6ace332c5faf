//! `GET /ponctualite/<region>`
//!
//! Answers with a reference to the region's chart, rendering it on the first
//! request. Image bytes are never inlined; the client fetches `img` from the
//! static fallback.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};
use serde::Serialize;

use super::request::ParsedRequest;
use crate::config::AppState;
use crate::error::AppError;
use crate::http;
use crate::logger;

const MISSING_REGION: &str = "Nom de région manquant";

#[derive(Debug, Serialize)]
struct PunctualityChart {
    title: String,
    img: String,
}

pub async fn handle(
    req: &ParsedRequest,
    state: &AppState,
) -> Result<Response<Full<Bytes>>, AppError> {
    let region = match req.segment(1) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(AppError::BadRequest(MISSING_REGION.to_string())),
    };

    if state.store.find_region(region)?.is_none() {
        return Err(AppError::NotFound(format!(
            "{region} : nom de région inconnu"
        )));
    }

    let artifact = state.charts.ensure(region).await?;
    logger::log_chart_served(region, &artifact.path, artifact.outcome);

    let body = PunctualityChart {
        title: format!("Régularité TER {region}"),
        img: artifact.url,
    };
    Ok(http::build_json_response(StatusCode::OK, &body))
}
