use crate::source::line_buffer::Record;
use tokio::sync::mpsc;

/// Producer side of the record queue. One per tailer.
pub type RecordSender = mpsc::Sender<Record>;
/// Consumer side of the record queue. Owned by the uploader.
pub type RecordReceiver = mpsc::Receiver<Record>;

pub type Sender<T> = mpsc::Sender<T>;
pub type Receiver<T> = mpsc::Receiver<T>;

/// Create a bounded channel with the specified buffer size
pub fn create_channel<T>(buffer_size: usize) -> (Sender<T>, Receiver<T>) {
    mpsc::channel(buffer_size.max(1))
}

/// Non-blocking sink for steady-state errors.
///
/// Reporting never waits on the consumer: when the channel is full or nobody
/// took the receiver, the error is logged and dropped.
#[derive(Debug)]
pub struct ErrorSink<E> {
    component: String,
    tx: Sender<E>,
}

impl<E: std::fmt::Display> ErrorSink<E> {
    pub fn new(component: impl Into<String>, capacity: usize) -> (Self, Receiver<E>) {
        let (tx, rx) = create_channel(capacity);
        (
            Self {
                component: component.into(),
                tx,
            },
            rx,
        )
    }

    pub fn report(&self, error: E) {
        if let Err(e) = self.tx.try_send(error) {
            let error = match e {
                mpsc::error::TrySendError::Full(error) => error,
                mpsc::error::TrySendError::Closed(error) => error,
            };
            tracing::warn!(
                component = %self.component,
                error = %error,
                "Error sink unavailable, dropping error"
            );
        }
    }
}

impl<E> Clone for ErrorSink<E> {
    fn clone(&self) -> Self {
        Self {
            component: self.component.clone(),
            tx: self.tx.clone(),
        }
    }
}
