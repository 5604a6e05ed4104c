pub mod client;
pub mod request;
pub mod response;
pub mod size;

pub use client::{ArkClient, ReqwestTransport, Transport, TransportResponse};
pub use request::{build_image_to_image_body, build_text_to_image_body};
pub use response::extract_image;
pub use size::{normalize, validate_pixel_size};
