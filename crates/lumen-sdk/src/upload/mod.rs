//! Image upload and albums

mod model;
mod service;

pub use model::{Album, Image, ImageUpload};
pub use service::ImageUploadService;
