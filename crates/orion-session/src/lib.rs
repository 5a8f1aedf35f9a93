/// Rebuild a timeline from persisted memory records.
pub mod history;
/// The ordered, de-duplicated message view of one session.
pub mod timeline;

pub use history::reconstruct;
pub use timeline::{StreamingBuffer, Timeline};
