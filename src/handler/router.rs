//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: method validation, body size
//! check, request decomposition and dispatch on the first path segment.

use http_body_util::{BodyExt, Full};
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderValue, CONTENT_LENGTH, CONTENT_TYPE, IF_NONE_MATCH, REFERER, SERVER, USER_AGENT,
};
use hyper::{Method, Request, Response};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use super::request::{ParsedRequest, RequestError};
use super::{punctuality, regions, static_files};
use crate::config::AppState;
use crate::error::AppError;
use crate::http;
use crate::logger::{self, AccessLogEntry};

const ALLOWED_METHODS: &str = "GET, HEAD, POST, OPTIONS";
const STATIC_METHODS: &str = "GET, HEAD, OPTIONS";

/// Route keys, matched exactly against the first path segment
const REGIONS_ROUTE: &str = "regions";
const PUNCTUALITY_ROUTE: &str = "ponctualite";

/// Request information the handlers need besides the parsed request
pub struct RequestContext {
    pub method: Method,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    state: Arc<AppState>,
    peer_addr: SocketAddr,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    let started = Instant::now();
    let mut entry = access_log_entry(&req, peer_addr);

    let mut response = process_request(req, &state).await;
    set_server_header(&mut response, &state.config.http.server_name);

    let logging = &state.config.logging;
    if logging.access_log {
        entry.status = response.status().as_u16();
        entry.body_bytes = response
            .body()
            .size_hint()
            .exact()
            .and_then(|n| usize::try_from(n).ok())
            .unwrap_or(0);
        entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        logger::log_access(&entry, &logging.access_log_format);
    }

    Ok(response)
}

async fn process_request<B>(req: Request<B>, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body<Data = Bytes>,
    B::Error: std::fmt::Display,
{
    // 1. Check HTTP method
    if let Some(resp) = check_http_method(req.method(), state.config.http.enable_cors) {
        return resp;
    }

    // 2. Check body size
    if let Some(resp) = check_body_size(&req, state.config.http.max_body_size) {
        return resp;
    }

    // 3. Decompose
    let (parts, body) = req.into_parts();
    let has_content_length = parts.headers.contains_key(CONTENT_LENGTH);
    let raw_body = if has_content_length {
        match body.collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(e) => {
                return AppError::from(RequestError::Body(e.to_string())).into_response();
            }
        }
    } else {
        Bytes::new()
    };

    let parsed = match ParsedRequest::from_parts(
        parts.uri.path(),
        parts.uri.query(),
        header_str(&parts.headers, CONTENT_TYPE),
        has_content_length,
        raw_body,
    ) {
        Ok(parsed) => parsed,
        Err(e) => return AppError::from(e).into_response(),
    };
    logger::log_parsed_request(&parsed);

    let ctx = RequestContext {
        method: parts.method,
        if_none_match: header_str(&parts.headers, IF_NONE_MATCH).map(ToString::to_string),
    };

    // 4. Dispatch
    let response = route_request(&parsed, &ctx, state).await;

    if ctx.method == Method::HEAD {
        let (parts, _) = response.into_parts();
        return Response::from_parts(parts, Full::new(Bytes::new()));
    }
    response
}

/// Dispatch on the first path segment
async fn route_request(
    req: &ParsedRequest,
    ctx: &RequestContext,
    state: &AppState,
) -> Response<Full<Bytes>> {
    let result = match req.route() {
        REGIONS_ROUTE => regions::handle(state),
        PUNCTUALITY_ROUTE => punctuality::handle(req, state).await,
        _ if ctx.method == Method::POST => return http::build_405_response(STATIC_METHODS),
        _ => return static_files::serve(req, ctx, &state.config.site).await,
    };
    result.unwrap_or_else(AppError::into_response)
}

/// Return a response for methods that are not dispatched
fn check_http_method(method: &Method, enable_cors: bool) -> Option<Response<Full<Bytes>>> {
    match *method {
        Method::GET | Method::HEAD | Method::POST => None,
        Method::OPTIONS => Some(http::build_options_response(ALLOWED_METHODS, enable_cors)),
        _ => {
            logger::log_warning(&format!("Method not allowed: {method}"));
            Some(http::build_405_response(ALLOWED_METHODS))
        }
    }
}

/// Validate Content-Length header and return 413 if exceeded
fn check_body_size<B>(req: &Request<B>, max_body_size: u64) -> Option<Response<Full<Bytes>>> {
    let size_str = header_str(req.headers(), CONTENT_LENGTH)?;
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            logger::log_warning(&format!(
                "Request body too large: {size} bytes (max: {max_body_size})"
            ));
            Some(http::build_413_response())
        }
        Err(_) => {
            logger::log_warning(&format!("Invalid Content-Length value: '{size_str}'"));
            Some(
                AppError::BadRequest("Invalid Content-Length".to_string()).into_response(),
            )
        }
        _ => None,
    }
}

fn set_server_header(response: &mut Response<Full<Bytes>>, server_name: &str) {
    if let Ok(value) = HeaderValue::from_str(server_name) {
        response.headers_mut().insert(SERVER, value);
    }
}

fn header_str(
    headers: &hyper::HeaderMap,
    name: hyper::header::HeaderName,
) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn access_log_entry<B>(req: &Request<B>, peer_addr: SocketAddr) -> AccessLogEntry {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        req.method().to_string(),
        req.uri().path().to_string(),
    );
    entry.query = req.uri().query().map(ToString::to_string);
    entry.http_version = format!("{:?}", req.version())
        .trim_start_matches("HTTP/")
        .to_string();
    entry.referer = header_str(req.headers(), REFERER).map(ToString::to_string);
    entry.user_agent = header_str(req.headers(), USER_AGENT).map(ToString::to_string);
    entry
}
