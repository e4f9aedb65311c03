use crate::pipeline::channel::{create_channel, ErrorSink, Receiver, RecordReceiver, RecordSender};
use crate::source::line_buffer::Record;
use crate::upload::client::{parse_server_config, CollectorTransport, ServerConfig, UploadError};
use crate::upload::session::SessionIdentity;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone)]
pub struct UploaderOptions {
    /// POST attempts per batch before it is deferred to the next pass.
    pub retry_attempts: u32,
    pub retry_interval: Duration,
    pub queue_capacity: usize,
    pub error_capacity: usize,
}

impl Default for UploaderOptions {
    fn default() -> Self {
        Self {
            retry_attempts: 3,
            retry_interval: Duration::from_secs(1),
            queue_capacity: 1024,
            error_capacity: 16,
        }
    }
}

/// Bytes of every record dequeued since the last confirmed delivery.
#[derive(Debug, Default)]
pub struct OutboundBatch {
    bytes: Vec<u8>,
    records: usize,
}

impl OutboundBatch {
    pub fn push(&mut self, record: Record) {
        self.bytes.extend_from_slice(record.as_bytes());
        self.records += 1;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn records(&self) -> usize {
        self.records
    }

    pub fn is_empty(&self) -> bool {
        self.records == 0
    }

    fn clear(&mut self) {
        self.bytes.clear();
        self.records = 0;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryStats {
    pub batches_delivered: u64,
    pub records_delivered: u64,
    pub failed_attempts: u64,
    /// Session sequence when the loop exited.
    pub sequence: u64,
}

/// Ships queued records to the collector.
pub struct Uploader {
    transport: Arc<dyn CollectorTransport>,
    options: UploaderOptions,
    session: Option<SessionIdentity>,
    server_config: Option<ServerConfig>,
}

impl Uploader {
    pub fn new(transport: Arc<dyn CollectorTransport>, options: UploaderOptions) -> Self {
        Self {
            transport,
            options,
            session: None,
            server_config: None,
        }
    }

    /// Start a new session and fetch the collector's logging configuration.
    pub async fn fetch_config(&mut self) -> Result<ServerConfig, UploadError> {
        let mut session = SessionIdentity::generate();
        let body = self.transport.get_config(&session.report_id()).await?;
        session.advance();
        self.session = Some(session);

        let config = parse_server_config(&body)?;
        info!(
            categories = ?config.categories,
            existing_data = config.existing_data_requested,
            "Fetched collector configuration"
        );
        self.server_config = Some(config.clone());
        Ok(config)
    }

    pub fn session(&self) -> Option<&SessionIdentity> {
        self.session.as_ref()
    }

    pub fn server_config(&self) -> Option<&ServerConfig> {
        self.server_config.as_ref()
    }

    /// Spawn the delivery loop.
    ///
    /// Record producers are only available from the returned handle, so the
    /// queue always has a consumer before anything is enqueued.
    pub fn start(self) -> UploaderHandle {
        let (queue_tx, queue_rx) = create_channel(self.options.queue_capacity);
        let (errors, error_rx) = ErrorSink::new("uploader", self.options.error_capacity);
        let delivery = self.into_delivery_loop(queue_rx, errors);
        let task = tokio::spawn(delivery.run());

        UploaderHandle {
            queue: queue_tx,
            task,
            errors: Some(error_rx),
        }
    }

    fn into_delivery_loop(
        self,
        queue: RecordReceiver,
        errors: ErrorSink<UploadError>,
    ) -> DeliveryLoop {
        let session = self.session.unwrap_or_else(|| {
            warn!("Uploader started without fetching configuration, generating a session");
            SessionIdentity::generate()
        });

        DeliveryLoop {
            transport: self.transport,
            options: self.options,
            session,
            queue,
            errors,
            stats: DeliveryStats::default(),
        }
    }
}

struct DeliveryLoop {
    transport: Arc<dyn CollectorTransport>,
    options: UploaderOptions,
    session: SessionIdentity,
    queue: RecordReceiver,
    errors: ErrorSink<UploadError>,
    stats: DeliveryStats,
}

impl DeliveryLoop {
    async fn run(mut self) -> DeliveryStats {
        let mut batch = OutboundBatch::default();

        loop {
            match self.queue.recv().await {
                Some(record) => batch.push(record),
                None => {
                    if !batch.is_empty() {
                        self.deliver(&mut batch).await;
                    }
                    break;
                }
            }

            // Take whatever is already queued, never wait for more.
            while let Ok(record) = self.queue.try_recv() {
                batch.push(record);
            }

            self.deliver(&mut batch).await;
        }

        self.stats.sequence = self.session.sequence();
        info!(
            batches = self.stats.batches_delivered,
            records = self.stats.records_delivered,
            failed_attempts = self.stats.failed_attempts,
            "Delivery loop stopped"
        );
        self.stats
    }

    /// POST the batch, retrying up to the attempt bound. The batch is
    /// cleared only on success.
    async fn deliver(&mut self, batch: &mut OutboundBatch) -> bool {
        let attempts = self.options.retry_attempts.max(1);

        for attempt in 1..=attempts {
            let result = self
                .transport
                .post_batch(&self.session.report_id(), batch.bytes().to_vec())
                .await;

            match result {
                Ok(()) => {
                    debug!(
                        sequence = self.session.sequence(),
                        records = batch.records(),
                        bytes = batch.bytes().len(),
                        "Batch delivered"
                    );
                    self.session.advance();
                    self.stats.batches_delivered += 1;
                    self.stats.records_delivered += batch.records() as u64;
                    batch.clear();
                    return true;
                }
                Err(e) => {
                    warn!(attempt, attempts, error = %e, "Batch upload failed");
                    self.stats.failed_attempts += 1;
                    self.errors.report(e);
                    if attempt < attempts && !self.options.retry_interval.is_zero() {
                        tokio::time::sleep(self.options.retry_interval).await;
                    }
                }
            }
        }

        error!(
            records = batch.records(),
            "Batch upload attempts exhausted, keeping batch for the next pass"
        );
        false
    }
}

/// A running delivery loop.
pub struct UploaderHandle {
    queue: RecordSender,
    task: JoinHandle<DeliveryStats>,
    errors: Option<Receiver<UploadError>>,
}

impl UploaderHandle {
    /// A producer for the record queue.
    pub fn record_sender(&self) -> RecordSender {
        self.queue.clone()
    }

    /// Delivery errors. Can be taken once.
    pub fn errors(&mut self) -> Option<Receiver<UploadError>> {
        self.errors.take()
    }

    /// Release the handle's producer and wait for the loop to drain.
    ///
    /// Returns once every other producer has been dropped too.
    pub async fn shutdown(self) -> Result<DeliveryStats, JoinError> {
        let Self { queue, task, .. } = self;
        drop(queue);
        task.await
    }
}
