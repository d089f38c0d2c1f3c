//! Voice capture and container writing.

pub mod processor;
pub mod recorder;

pub use processor::AudioProcessor;
pub use recorder::{MeetingRecorder, RecordedTrack};
