use crate::errors::IngestError;
use crate::metrics::{
    APPEND_LATENCY_SECONDS, INCOMPLETE_SUBMISSIONS_TOTAL, INVALID_IDENTITY_TOTAL,
    MALFORMED_SUBMISSIONS_TOTAL,
    RECORDS_APPENDED_TOTAL, STORE_FAILURES_TOTAL, SUBMISSIONS_TOTAL,
};
use crate::model::{TelemetryRecord, TelemetrySubmission};
use crate::validate::{validate, DeviceId, LOG_FILE_PREFIX, LOG_FILE_SUFFIX};
use chrono::Utc;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Source of `observedAtMillis` values.
pub trait Clock: Send + Sync + 'static {
    fn now_millis(&self) -> i64;
}

/// Wall clock in epoch milliseconds that never goes backwards within a
/// process, even if the system clock is stepped back.
#[derive(Debug, Default)]
pub struct WallClock {
    last: AtomicI64,
}

impl Clock for WallClock {
    fn now_millis(&self) -> i64 {
        let now = Utc::now().timestamp_millis();
        let previous = self.last.fetch_max(now, Ordering::AcqRel);
        previous.max(now)
    }
}

/// Per-device append-only telemetry log, one CSV file per device.
#[derive(Clone)]
pub struct TelemetryLog {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl TelemetryLog {
    /// Opens the log directory, creating it if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        info!("Telemetry log directory: {}", dir.display());
        Ok(Self::with_clock(dir, Arc::new(WallClock::default())))
    }

    /// Uses `dir` as is; a missing directory surfaces as `StoreUnavailable`
    /// on the first submission.
    pub fn with_clock(dir: impl Into<PathBuf>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dir: dir.into(),
            clock,
        }
    }

    pub fn path_for(&self, device_id: &DeviceId) -> PathBuf {
        self.dir
            .join(format!("{LOG_FILE_PREFIX}{device_id}{LOG_FILE_SUFFIX}"))
    }

    /// Validates a submission and appends it to its device's log.
    ///
    /// The record is flushed to disk before this returns `Ok`. Nothing
    /// touches the filesystem unless validation passes.
    pub async fn submit(
        &self,
        submission: &TelemetrySubmission,
    ) -> Result<TelemetryRecord, IngestError> {
        SUBMISSIONS_TOTAL.inc();

        let reading = match validate(submission) {
            Ok(reading) => reading,
            Err(e) => {
                match &e {
                    IngestError::MissingFields(fields) => {
                        INCOMPLETE_SUBMISSIONS_TOTAL.inc();
                        debug!("Skipping incomplete submission, missing {:?}", fields);
                    }
                    IngestError::InvalidIdentity(id) => {
                        INVALID_IDENTITY_TOTAL.inc();
                        warn!("Rejected submission with invalid device identity {:?}", id);
                    }
                    IngestError::MalformedField(field) => {
                        MALFORMED_SUBMISSIONS_TOTAL.inc();
                        warn!("Rejected submission with control characters in {}", field);
                    }
                    IngestError::StoreUnavailable { .. } => {}
                }
                return Err(e);
            }
        };

        let record = reading.observed_at(self.clock.now_millis());
        let path = self.path_for(&record.device_id);
        let line = record.to_csv_line();

        let start = Instant::now();
        let target = path.clone();
        let result = tokio::task::spawn_blocking(move || append_line(&target, line.as_bytes()))
            .await
            .map_err(io::Error::from)
            .and_then(|appended| appended);

        match result {
            Ok(()) => {
                APPEND_LATENCY_SECONDS.observe(start.elapsed().as_secs_f64());
                RECORDS_APPENDED_TOTAL.inc();
                debug!(
                    "Appended record for {} at {}",
                    record.device_id, record.observed_at_millis
                );
                Ok(record)
            }
            Err(source) => {
                STORE_FAILURES_TOTAL.inc();
                error!(
                    "Could not append to telemetry log {}: {}",
                    path.display(),
                    source
                );
                Err(IngestError::StoreUnavailable { path, source })
            }
        }
    }
}

/// Appends one complete line with a single `O_APPEND` write, then syncs.
///
/// Appends from other processes to the same file land either before or
/// after this line, never inside it.
fn append_line(path: &Path, line: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(line)?;
    file.sync_data()
}
