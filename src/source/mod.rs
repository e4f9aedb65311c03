pub mod line_buffer;
pub mod tailer;

pub use line_buffer::{LineBuffer, Record};
pub use tailer::{TailError, TailStats, Tailer, TailerHandle, TailerOptions};
