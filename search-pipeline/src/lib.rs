//! Webcam similarity search orchestration.
//!
//! [`SearchPipeline`] validates the requested count, encodes the query,
//! searches the index, and maps each match into an [`OutputRecord`]. It holds
//! no per-request state, so one instance serves all requests concurrently.

pub mod errors;
pub mod mapper;
pub mod output_record;
pub mod pipeline;

pub use errors::{MapError, SearchError};
pub use mapper::{MappingPolicy, ResultMapper};
pub use output_record::{Links, Location, OutputRecord, Urls, WebcamId};
pub use pipeline::{SearchPipeline, SearchRequest};
