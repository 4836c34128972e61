//! Photo-to-manga transformation pipeline.
//!
//! A photo goes through [`estimator`] and [`encoder`], one request is made by a
//! [`client::TransformProvider`], and the outcome drives the [`workflow`]
//! state machine. [`session::Session`] wires these together for a shell.

pub mod client;
pub mod config;
pub mod encoder;
pub mod estimator;
pub mod preview;
pub mod session;
pub mod source;
pub mod workflow;

pub use client::{
    interpret_response, DryrunTransformer, GeminiTransformer, TransformProvider, TransformRequest,
    STYLE_PROMPT,
};
pub use config::TransformConfig;
pub use encoder::{encode, encode_reader};
pub use estimator::{estimate, estimate_dimensions, read_dimensions};
pub use session::{run_attempt, Session};
pub use source::{load_source, open_source};
pub use workflow::{Attempt, Workflow};
