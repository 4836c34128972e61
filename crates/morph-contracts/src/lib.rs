pub mod aspect;
pub mod error;
pub mod events;
pub mod image;
pub mod workflow;

pub use aspect::AspectRatioTag;
pub use error::{TransformError, TransportFailure};
pub use events::{EventLog, WorkflowEvent};
pub use image::{EncodedImage, GeneratedImage, SourceImage, SourceSummary};
pub use workflow::{AttemptId, WorkflowSnapshot, WorkflowState};
