//! Static file serving module
//!
//! Fallback for every path no API route claims. Serves the document root,
//! including the chart cache directory.

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::Response;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::request::ParsedRequest;
use super::router::RequestContext;
use crate::config::SiteConfig;
use crate::http::{self, etag, mime};
use crate::logger;

/// Serve the file the request path designates under the document root
pub async fn serve(
    req: &ParsedRequest,
    ctx: &RequestContext,
    site: &SiteConfig,
) -> Response<Full<Bytes>> {
    match load_from_directory(&site.document_root, &req.path_segments, &site.index_files).await {
        Some((content, content_type)) => {
            build_static_file_response(content, content_type, ctx.if_none_match.as_deref())
        }
        None => http::build_404_response(),
    }
}

/// Load a file from the document root, trying index files for directories
pub async fn load_from_directory(
    static_dir: &str,
    segments: &[String],
    index_files: &[String],
) -> Option<(Vec<u8>, &'static str)> {
    let Some(relative_path) = relative_path(segments) else {
        logger::log_warning(&format!(
            "Path traversal attempt blocked: /{}",
            segments.join("/")
        ));
        return None;
    };

    let static_dir_canonical = match fs::canonicalize(static_dir).await {
        Ok(p) => p,
        Err(e) => {
            logger::log_warning(&format!(
                "Static directory not found or inaccessible '{static_dir}': {e}"
            ));
            return None;
        }
    };

    let mut file_path = Path::new(static_dir).join(relative_path);

    if fs::metadata(&file_path).await.is_ok_and(|m| m.is_dir()) {
        for index_file in index_files {
            let index_path = file_path.join(index_file);
            if fs::metadata(&index_path).await.is_ok_and(|m| m.is_file()) {
                file_path = index_path;
                break;
            }
        }
    }

    // File not found is common (404), no need to log at warning level
    let Ok(file_path_canonical) = fs::canonicalize(&file_path).await else {
        return None;
    };
    if !file_path_canonical.starts_with(&static_dir_canonical) {
        logger::log_warning(&format!(
            "Path escapes document root: {}",
            file_path_canonical.display()
        ));
        return None;
    }
    if !file_path_canonical.is_file() {
        return None;
    }

    let content = match fs::read(&file_path_canonical).await {
        Ok(c) => c,
        Err(e) => {
            logger::log_error(&format!(
                "Failed to read file '{}': {}",
                file_path.display(),
                e
            ));
            return None;
        }
    };

    let content_type = mime::get_content_type(file_path.extension().and_then(|e| e.to_str()));
    Some((content, content_type))
}

/// Rebuild a relative path from decoded segments.
///
/// `None` when a segment is `..` or smuggles a separator (`%2F`).
fn relative_path(segments: &[String]) -> Option<PathBuf> {
    let mut path = PathBuf::new();
    for segment in segments {
        if segment == ".." || segment.contains(['/', '\\']) {
            return None;
        }
        if !segment.is_empty() && segment != "." {
            path.push(segment);
        }
    }
    Some(path)
}

/// Build static file response with `ETag` support
fn build_static_file_response(
    data: Vec<u8>,
    content_type: &str,
    if_none_match: Option<&str>,
) -> Response<Full<Bytes>> {
    let etag = etag::generate_etag(&data);

    // Check if client has cached version
    if etag::check_etag_match(if_none_match, &etag) {
        return http::build_304_response(&etag);
    }

    http::build_file_response(Bytes::from(data), content_type, &etag)
}
