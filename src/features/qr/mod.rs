pub mod handler;
pub mod service;
pub mod style;

pub use handler::create_qr_router;
pub use service::{create_directory, delete_qr_code, generate_qr_code, list_qr_codes};
pub use style::QrStyle;
