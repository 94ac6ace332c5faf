//! Request handling errors
//!
//! Handlers return `AppError`; the router turns it into a status and a plain
//! text body, so no error travels past a request.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::{Response, StatusCode};

use crate::cache::CacheError;
use crate::chart::ChartError;
use crate::handler::request::RequestError;
use crate::http;
use crate::logger;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    /// Known region without a single measured month
    #[error("{0} : aucune donnée de régularité")]
    NoData(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Cache(CacheError),
}

impl From<CacheError> for AppError {
    fn from(e: CacheError) -> Self {
        match e {
            CacheError::Render(ChartError::NoData(region)) => Self::NoData(region),
            other => Self::Cache(other),
        }
    }
}

impl From<RequestError> for AppError {
    fn from(e: RequestError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl AppError {
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) | Self::NoData(_) => StatusCode::NOT_FOUND,
            Self::Store(_) | Self::Cache(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client errors carry their message; server errors are logged and hidden
    pub fn into_response(self) -> Response<Full<Bytes>> {
        let status = self.status();
        if status.is_server_error() {
            logger::log_error(&format!("Request failed: {self}"));
            return http::build_500_response();
        }
        logger::log_warning(&format!("{} {self}", status.as_u16()));
        http::build_text_response(status, &self.to_string())
    }
}
