//! Request handler module
//!
//! Responsible for request decomposition, routing dispatch and the
//! punctuality API handlers. Requests no API route claims fall back to static
//! files from the document root.

pub mod punctuality;
pub mod regions;
pub mod request;
pub mod router;
pub mod static_files;

// Re-export main entry point
pub use request::ParsedRequest;
pub use router::handle_request;
