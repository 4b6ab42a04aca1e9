//! Voice design through an external helper process.

mod designer;
pub mod protocol;

pub use designer::ProcessVoiceDesigner;
