//! HTTP protocol layer module
//!
//! Response builders, content types and `ETag` handling, decoupled from the
//! punctuality handlers.

pub mod etag;
pub mod mime;
pub mod response;

// Re-export commonly used builders
pub use response::{
    build_304_response, build_404_response, build_405_response, build_413_response,
    build_500_response, build_file_response, build_json_response, build_options_response,
    build_text_response,
};
