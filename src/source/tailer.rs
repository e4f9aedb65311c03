use crate::pipeline::channel::{ErrorSink, Receiver, RecordSender};
use crate::source::line_buffer::{LineBuffer, Record, DEFAULT_CAPACITY};
use crate::watch::{NotificationBackend, Signal, WatchError};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// `read_offset` before the file has been observed.
pub const UNINITIALIZED_OFFSET: i64 = -1;

#[derive(Debug, Error)]
pub enum TailError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("unexpected event: {0}")]
    UnexpectedEvent(String),

    #[error("record queue closed")]
    QueueClosed,
}

#[derive(Debug, Clone)]
pub struct TailerOptions {
    /// Drop records whose first byte is not `[`.
    pub filter_bracketed: bool,
    /// Start from byte 0 instead of the end of the file on first observation.
    pub replay_existing: bool,
    pub buffer_capacity: usize,
}

impl Default for TailerOptions {
    fn default() -> Self {
        Self {
            filter_bracketed: false,
            replay_existing: false,
            buffer_capacity: DEFAULT_CAPACITY,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TailStats {
    pub records_forwarded: u64,
    pub records_filtered: u64,
    pub truncations: u64,
}

/// Follows one growing file and forwards its complete lines to the record
/// queue.
pub struct Tailer {
    source_id: String,
    path: PathBuf,
    options: TailerOptions,
    file: Option<File>,
    read_offset: i64,
    lines: LineBuffer,
    output: RecordSender,
    reopen_each_cycle: bool,
    stats: TailStats,
}

impl Tailer {
    /// `output` comes from a running uploader, see
    /// [`UploaderHandle::record_sender`](crate::upload::UploaderHandle::record_sender).
    pub fn new(
        source_id: impl Into<String>,
        path: impl Into<PathBuf>,
        options: TailerOptions,
        output: RecordSender,
    ) -> Self {
        let lines = LineBuffer::with_capacity(options.buffer_capacity);
        Self {
            source_id: source_id.into(),
            path: path.into(),
            options,
            file: None,
            read_offset: UNINITIALIZED_OFFSET,
            lines,
            output,
            reopen_each_cycle: false,
            stats: TailStats::default(),
        }
    }

    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read_offset(&self) -> i64 {
        self.read_offset
    }

    /// Bytes read after the last complete line.
    pub fn pending(&self) -> &[u8] {
        self.lines.pending()
    }

    pub fn stats(&self) -> TailStats {
        self.stats
    }

    /// Close the file handle after every read cycle.
    pub fn set_reopen_each_cycle(&mut self, reopen: bool) {
        self.reopen_each_cycle = reopen;
    }

    /// Read everything appended since the last call and forward the complete
    /// lines. Blocks only while the record queue is full.
    pub async fn on_signal(&mut self) -> Result<(), TailError> {
        let mut file = match self.file.take() {
            Some(file) => file,
            None => File::open(&self.path)?,
        };

        let result = self.read_available(&mut file).await;
        if result.is_ok() && !self.reopen_each_cycle {
            self.file = Some(file);
        }
        result
    }

    /// Drop the file handle so the next signal reopens the path.
    pub fn release_handle(&mut self) {
        self.file = None;
    }

    async fn read_available(&mut self, file: &mut File) -> Result<(), TailError> {
        let size = file.metadata()?.len() as i64;

        if size < self.read_offset {
            info!(
                source_id = %self.source_id,
                size,
                read_offset = self.read_offset,
                "File truncated, restarting from the beginning"
            );
            self.read_offset = 0;
            self.lines.reset();
            self.stats.truncations += 1;
        } else if self.read_offset == UNINITIALIZED_OFFSET {
            self.read_offset = if self.options.replay_existing { 0 } else { size };
            debug!(
                source_id = %self.source_id,
                read_offset = self.read_offset,
                "Initialized read offset"
            );
        }

        while self.read_offset < size {
            let remaining = (size - self.read_offset) as u64;
            let spare = self.lines.spare_mut();
            let want = (spare.len() as u64).min(remaining) as usize;

            file.seek(SeekFrom::Start(self.read_offset as u64))?;
            let read = file.read(&mut spare[..want])?;
            if read == 0 {
                // Shrunk since the stat; the next signal sees the new size.
                break;
            }
            self.read_offset += read as i64;

            let records = self.lines.commit(read);
            self.forward(records).await?;
        }

        Ok(())
    }

    fn accepts(&self, record: &Record) -> bool {
        match record.first_byte() {
            None => false,
            Some(first) => !self.options.filter_bracketed || first == b'[',
        }
    }

    async fn forward(&mut self, records: Vec<Record>) -> Result<(), TailError> {
        for record in records {
            if !self.accepts(&record) {
                self.stats.records_filtered += 1;
                continue;
            }
            self.output
                .send(record)
                .await
                .map_err(|_| TailError::QueueClosed)?;
            self.stats.records_forwarded += 1;
        }
        Ok(())
    }

    /// Catch up on the file once, register the watch, and spawn the signal
    /// loop.
    ///
    /// Start-up failures are returned. Later failures go to the handle's
    /// error receiver.
    pub async fn start(
        mut self,
        mut backend: Box<dyn NotificationBackend>,
        error_capacity: usize,
    ) -> Result<TailerHandle, TailError> {
        self.reopen_each_cycle = backend.reopen_each_cycle();
        self.on_signal().await?;
        backend.start(&self.path)?;

        info!(
            source_id = %self.source_id,
            path = %self.path.display(),
            backend = backend.backend_name(),
            read_offset = self.read_offset,
            "Tailer started"
        );

        let source_id = self.source_id.clone();
        let (errors, error_rx) = ErrorSink::new(source_id.clone(), error_capacity);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_signal_loop(self, backend, cancel.clone(), errors));

        Ok(TailerHandle {
            source_id,
            cancel,
            task,
            errors: Some(error_rx),
        })
    }
}

async fn run_signal_loop(
    mut tailer: Tailer,
    mut backend: Box<dyn NotificationBackend>,
    cancel: CancellationToken,
    errors: ErrorSink<TailError>,
) -> TailStats {
    loop {
        let signal = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            signal = backend.next_signal() => signal,
        };

        match signal {
            None => break,
            Some(Signal::Changed) => match tailer.on_signal().await {
                Ok(()) => {}
                Err(TailError::QueueClosed) => {
                    errors.report(TailError::QueueClosed);
                    break;
                }
                Err(e) => errors.report(e),
            },
            Some(Signal::Unexpected(event)) => {
                tailer.release_handle();
                errors.report(TailError::UnexpectedEvent(event));
            }
            Some(Signal::Failed(e)) => errors.report(e.into()),
        }
    }

    if let Err(e) = backend.stop(&tailer.path) {
        warn!(source_id = %tailer.source_id, error = %e, "Failed to remove watch");
    }

    let stats = tailer.stats();
    info!(
        source_id = %tailer.source_id,
        forwarded = stats.records_forwarded,
        filtered = stats.records_filtered,
        truncations = stats.truncations,
        "Tailer stopped"
    );
    stats
}

/// A running tailer's signal loop.
pub struct TailerHandle {
    source_id: String,
    cancel: CancellationToken,
    task: JoinHandle<TailStats>,
    errors: Option<Receiver<TailError>>,
}

impl TailerHandle {
    pub fn source_id(&self) -> &str {
        &self.source_id
    }

    /// Ask the loop to exit. A read cycle already underway completes first.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Steady-state errors. Can be taken once.
    pub fn errors(&mut self) -> Option<Receiver<TailError>> {
        self.errors.take()
    }

    pub async fn join(self) -> Result<TailStats, JoinError> {
        self.task.await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::channel::{create_channel, Receiver};
    use crate::watch::PollWatcher;
    use async_trait::async_trait;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;
    use tokio::sync::mpsc;

    fn options(filter_bracketed: bool, replay_existing: bool) -> TailerOptions {
        TailerOptions {
            filter_bracketed,
            replay_existing,
            ..TailerOptions::default()
        }
    }

    fn append(file: &mut NamedTempFile, bytes: &[u8]) {
        file.write_all(bytes).unwrap();
        file.flush().unwrap();
    }

    fn drain(rx: &mut Receiver<Record>) -> Vec<String> {
        let mut lines = Vec::new();
        while let Ok(record) = rx.try_recv() {
            lines.push(String::from_utf8(record.into_bytes()).unwrap());
        }
        lines
    }

    #[tokio::test]
    async fn test_skips_existing_content_by_default() {
        let mut file = NamedTempFile::new().unwrap();
        append(&mut file, b"[old] line\n");

        let (tx, mut rx) = create_channel(16);
        let mut tailer = Tailer::new("game", file.path(), options(false, false), tx);
        tailer.on_signal().await.unwrap();

        assert_eq!(tailer.read_offset(), 11);
        assert!(drain(&mut rx).is_empty());

        append(&mut file, b"[new] line\n");
        tailer.on_signal().await.unwrap();
        assert_eq!(drain(&mut rx), vec!["[new] line\n"]);
    }

    #[tokio::test]
    async fn test_replays_existing_content() {
        let mut file = NamedTempFile::new().unwrap();
        append(&mut file, b"region=EU\nsecond\n");

        let (tx, mut rx) = create_channel(16);
        let mut tailer = Tailer::new("net", file.path(), options(false, true), tx);
        tailer.on_signal().await.unwrap();

        assert_eq!(drain(&mut rx), vec!["region=EU\n", "second\n"]);
    }

    #[tokio::test]
    async fn test_filter_and_crlf_end_to_end() {
        let mut file = NamedTempFile::new().unwrap();
        let (tx, mut rx) = create_channel(16);
        let mut tailer = Tailer::new("game", file.path(), options(true, false), tx);
        tailer.on_signal().await.unwrap();

        append(&mut file, b"[A] hello\n");
        tailer.on_signal().await.unwrap();
        append(&mut file, b"not bracketed\n");
        tailer.on_signal().await.unwrap();
        append(&mut file, b"[B] world\r\n");
        tailer.on_signal().await.unwrap();

        assert_eq!(drain(&mut rx), vec!["[A] hello\n", "[B] world\n"]);
        assert_eq!(tailer.stats().records_filtered, 1);
    }

    #[tokio::test]
    async fn test_unfiltered_forwards_everything() {
        let mut file = NamedTempFile::new().unwrap();
        let (tx, mut rx) = create_channel(16);
        let mut tailer = Tailer::new("net", file.path(), options(false, false), tx);
        tailer.on_signal().await.unwrap();

        append(&mut file, b"2025-01-01 [Net] up\nplain\n\n");
        tailer.on_signal().await.unwrap();

        assert_eq!(drain(&mut rx), vec!["2025-01-01 [Net] up\n", "plain\n", "\n"]);
    }

    #[tokio::test]
    async fn test_partial_line_waits_for_terminator() {
        let mut file = NamedTempFile::new().unwrap();
        let (tx, mut rx) = create_channel(16);
        let mut tailer = Tailer::new("game", file.path(), options(false, false), tx);
        tailer.on_signal().await.unwrap();

        append(&mut file, b"[A] hal");
        tailer.on_signal().await.unwrap();
        assert!(drain(&mut rx).is_empty());
        assert_eq!(tailer.pending(), b"[A] hal");

        append(&mut file, b"f\n");
        tailer.on_signal().await.unwrap();
        assert_eq!(drain(&mut rx), vec!["[A] half\n"]);
        assert!(tailer.pending().is_empty());
    }

    #[tokio::test]
    async fn test_truncation_resets_offset_and_fragment() {
        let mut file = NamedTempFile::new().unwrap();
        let (tx, mut rx) = create_channel(16);
        let mut tailer = Tailer::new("game", file.path(), options(false, false), tx);
        tailer.on_signal().await.unwrap();

        append(&mut file, b"[A] one\n[B] partial");
        tailer.on_signal().await.unwrap();
        assert_eq!(drain(&mut rx), vec!["[A] one\n"]);
        assert_eq!(tailer.read_offset(), 19);

        file.as_file().set_len(0).unwrap();
        file.seek(SeekFrom::Start(0)).unwrap();
        append(&mut file, b"[C] x\n");
        tailer.on_signal().await.unwrap();

        assert_eq!(drain(&mut rx), vec!["[C] x\n"]);
        assert_eq!(tailer.read_offset(), 6);
        assert_eq!(tailer.stats().truncations, 1);
    }

    #[tokio::test]
    async fn test_reopen_each_cycle_reads_same_data() {
        let mut file = NamedTempFile::new().unwrap();
        let (tx, mut rx) = create_channel(16);
        let mut tailer = Tailer::new("game", file.path(), options(false, false), tx);
        tailer.set_reopen_each_cycle(true);
        tailer.on_signal().await.unwrap();

        append(&mut file, b"[A] one\n");
        tailer.on_signal().await.unwrap();
        append(&mut file, b"[B] two\n");
        tailer.on_signal().await.unwrap();

        assert_eq!(drain(&mut rx), vec!["[A] one\n", "[B] two\n"]);
    }

    #[tokio::test]
    async fn test_line_longer_than_buffer() {
        let mut file = NamedTempFile::new().unwrap();
        let long = format!("[A] {}\n", "x".repeat(100));
        append(&mut file, long.as_bytes());

        let (tx, mut rx) = create_channel(16);
        let opts = TailerOptions {
            buffer_capacity: 16,
            ..options(false, true)
        };
        let mut tailer = Tailer::new("game", file.path(), opts, tx);
        tailer.on_signal().await.unwrap();

        assert_eq!(drain(&mut rx), vec![long]);
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = create_channel(16);
        let mut tailer = Tailer::new(
            "game",
            dir.path().join("missing.log"),
            options(false, false),
            tx,
        );

        assert!(matches!(tailer.on_signal().await, Err(TailError::Io(_))));
    }

    #[tokio::test]
    async fn test_closed_queue_is_reported() {
        let mut file = NamedTempFile::new().unwrap();
        append(&mut file, b"[A] one\n");

        let (tx, rx) = create_channel(16);
        drop(rx);
        let mut tailer = Tailer::new("game", file.path(), options(false, true), tx);

        assert!(matches!(tailer.on_signal().await, Err(TailError::QueueClosed)));
    }

    #[tokio::test]
    async fn test_start_with_poll_backend_and_stop() {
        let mut file = NamedTempFile::new().unwrap();
        append(&mut file, b"[old]\n");

        let (tx, mut rx) = create_channel(16);
        let tailer = Tailer::new("game", file.path(), options(true, false), tx);
        let backend = Box::new(PollWatcher::new(Duration::from_millis(10)));
        let mut handle = tailer.start(backend, 8).await.unwrap();
        let mut errors = handle.errors().unwrap();
        assert!(handle.errors().is_none());

        append(&mut file, b"[A] polled\n");
        let record = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.as_bytes(), b"[A] polled\n");

        handle.stop();
        let stats = handle.join().await.unwrap();
        assert_eq!(stats.records_forwarded, 1);
        assert!(errors.try_recv().is_err());
    }

    /// Emits whatever the test pushes, keeping the file handle between
    /// signals like the native backend.
    struct ScriptedBackend {
        signals: mpsc::UnboundedReceiver<Signal>,
    }

    #[async_trait]
    impl NotificationBackend for ScriptedBackend {
        fn start(&mut self, _path: &Path) -> Result<(), WatchError> {
            Ok(())
        }

        fn stop(&mut self, _path: &Path) -> Result<(), WatchError> {
            Ok(())
        }

        async fn next_signal(&mut self) -> Option<Signal> {
            self.signals.recv().await
        }

        fn reopen_each_cycle(&self) -> bool {
            false
        }

        fn backend_name(&self) -> &'static str {
            "scripted"
        }
    }

    #[tokio::test]
    async fn test_unexpected_event_reopens_recreated_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("Player.log");
        std::fs::write(&path, "[old] line\n").unwrap();

        let (tx, mut rx) = create_channel(16);
        let tailer = Tailer::new("game", &path, options(true, false), tx);
        let (signal_tx, signals) = mpsc::unbounded_channel();
        let mut handle = tailer
            .start(Box::new(ScriptedBackend { signals }), 8)
            .await
            .unwrap();
        let mut errors = handle.errors().unwrap();

        // The producer replaces the file with a shorter one.
        std::fs::remove_file(&path).unwrap();
        std::fs::write(&path, "[B] new\n").unwrap();

        signal_tx
            .send(Signal::Unexpected("Remove(File)".to_string()))
            .unwrap();
        signal_tx
            .send(Signal::Failed(WatchError::Init("event queue overflow".to_string())))
            .unwrap();
        signal_tx.send(Signal::Changed).unwrap();

        let record = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.as_bytes(), b"[B] new\n");

        assert!(matches!(
            errors.try_recv(),
            Ok(TailError::UnexpectedEvent(event)) if event == "Remove(File)"
        ));
        assert!(matches!(errors.try_recv(), Ok(TailError::Watch(_))));

        // Still running after both errors.
        std::fs::OpenOptions::new()
            .append(true)
            .open(&path)
            .unwrap()
            .write_all(b"[C] more\n")
            .unwrap();
        signal_tx.send(Signal::Changed).unwrap();
        let record = tokio::time::timeout(Duration::from_secs(5), rx.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.as_bytes(), b"[C] more\n");

        handle.stop();
        let stats = handle.join().await.unwrap();
        assert_eq!(stats.records_forwarded, 2);
        assert_eq!(stats.truncations, 1);
    }

    #[tokio::test]
    async fn test_start_fails_when_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, _rx) = create_channel(16);
        let tailer = Tailer::new(
            "game",
            dir.path().join("missing.log"),
            options(false, false),
            tx,
        );
        let backend = Box::new(PollWatcher::new(Duration::from_millis(10)));

        assert!(tailer.start(backend, 8).await.is_err());
    }
}
