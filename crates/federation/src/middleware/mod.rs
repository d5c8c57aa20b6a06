//! Federation middleware for content negotiation and response headers.

mod headers;
mod negotiation;

pub use headers::federation_headers;
pub use negotiation::{HtmlFallbackLayer, HtmlFallbackService};
