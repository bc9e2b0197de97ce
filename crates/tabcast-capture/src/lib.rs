//! Capture pipeline — exchanges a single-use stream token for a live media
//! stream, drives an incremental encoder, and bridges encoder and stream
//! events into one channel for the session to consume.

pub mod encoder;
pub mod pipeline;
pub mod stream;
pub mod synthetic;

pub use encoder::{Encoder, EncoderEvent, EncoderHandle, EncoderSettings};
pub use pipeline::{CaptureEvent, CapturePipeline};
pub use stream::{MediaSource, MediaStream, TrackKind};
pub use synthetic::{SyntheticEncoder, SyntheticSource};
