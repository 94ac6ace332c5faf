//! `GET /regions`

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use crate::config::AppState;
use crate::error::AppError;
use crate::http;

/// Every region as `{nom, lat, lon}`, in store order
pub fn handle(state: &AppState) -> Result<Response<Full<Bytes>>, AppError> {
    let regions = state.store.list_regions()?;
    Ok(http::build_json_response(StatusCode::OK, &regions))
}
