pub mod channel;
pub mod runner;

pub use channel::{create_channel, ErrorSink, Receiver, RecordReceiver, RecordSender, Sender};
pub use runner::{Pipeline, PipelineError, RunningPipeline};
