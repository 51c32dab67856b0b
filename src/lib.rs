//! Tissue microarray de-arraying: find the cores on a slide mask and give every
//! one of them a row and column.
//!
//! The flow is segmentation (optional, when starting from a mask) → proximity
//! graph → orientation sweep → traveling row assembly → column alignment. The
//! [`pipeline::Session`] type ties the stages together.

pub mod cores;
pub mod edits;
pub mod geometry;
pub mod graph;
pub mod normalize;
pub mod params;
pub mod pipeline;
pub mod plot_grid;
pub mod segmentation;
pub mod travel;

pub use cores::Core;
pub use params::{Hyperparameters, SegmentationConfig};
pub use pipeline::{PipelineError, Session};
