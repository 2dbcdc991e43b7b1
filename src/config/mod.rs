mod server;

pub use server::{DEFAULT_DATABASE_NAME, DEFAULT_MAX_UPLOAD_BYTES, ServerConfig};
