//! CLIP query encoder.
//!
//! Turns a text string, an uploaded image, or an image URL into one vector in
//! the shared CLIP embedding space. The same image pixels always yield the
//! same vector regardless of how they arrived.
//!
//! Model weights are loaded once at startup from `<MODELS_DIR>/<MODEL_ID>/`
//! and shared read-only by all requests; inference runs on tokio's blocking
//! pool.

pub mod config;
pub mod encoder;
pub mod errors;
pub mod fetch;
pub mod model;
pub mod preprocess;
pub mod query;

pub use config::EncoderConfig;
pub use encoder::{ClipEncoder, QueryEncoder};
pub use errors::EncodeError;
pub use fetch::ImageFetcher;
pub use model::{ClipModel, Projection};
pub use preprocess::PreprocessConfig;
pub use query::{EmbeddingVector, Query};
