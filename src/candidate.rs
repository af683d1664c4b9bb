//! Implementations under test and the uniform result they report.
//!
//! A [`Candidate`] never fails outward: every problem is folded into
//! [`CandidateResult::Failure`] so one bad candidate can't stop a suite.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::error::CandidateError;
use crate::harness::{measure_once, MemorySampler};
use crate::transform::process_json_data;

/// Default wall-clock budget for an external executable.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

pub const REFERENCE_NAME: &str = "Reference";

const POLL_INTERVAL: Duration = Duration::from_millis(1);

type StreamReceiver = Receiver<io::Result<Vec<u8>>>;

/// Captured outcome of an external process that ran to completion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessOutput {
    /// `None` when the process was terminated by a signal.
    pub return_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateMetrics {
    /// Seconds.
    pub processing_time: f64,
    /// MB, after minus before. May be negative.
    pub memory_used: Option<f64>,
    /// Harness resident memory after the run, MB.
    pub resident_memory: Option<f64>,
    /// Bytes of re-serialized output (in-process candidates only).
    pub result_size: Option<usize>,
    pub success: bool,
    #[serde(flatten)]
    pub process: Option<ProcessOutput>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CandidateResult {
    Success(CandidateMetrics),
    Failure { error: String },
}

impl CandidateResult {
    pub fn is_success(&self) -> bool {
        matches!(self, CandidateResult::Success(_))
    }

    /// Processing time for successful runs; failures have none.
    pub fn processing_time(&self) -> Option<f64> {
        match self {
            CandidateResult::Success(m) => Some(m.processing_time),
            CandidateResult::Failure { .. } => None,
        }
    }

    pub fn error(&self) -> Option<&str> {
        match self {
            CandidateResult::Success(_) => None,
            CandidateResult::Failure { error } => Some(error),
        }
    }

    pub fn metrics(&self) -> Option<&CandidateMetrics> {
        match self {
            CandidateResult::Success(m) => Some(m),
            CandidateResult::Failure { .. } => None,
        }
    }
}

impl From<CandidateError> for CandidateResult {
    fn from(e: CandidateError) -> Self {
        CandidateResult::Failure {
            error: e.to_string(),
        }
    }
}

/// What a candidate gets to work on: the payload text, and a file holding
/// the same bytes when the suite created one.
#[derive(Debug, Clone, Copy)]
pub struct CandidateInput<'a> {
    pub json: &'a str,
    pub file: Option<&'a Path>,
}

pub trait Candidate {
    fn name(&self) -> &str;

    /// Whether the payload must be persisted to a file before `run`.
    fn needs_file(&self) -> bool {
        false
    }

    fn run(&self, input: &CandidateInput<'_>, sampler: &mut MemorySampler) -> CandidateResult;
}

/// Parses, transforms and re-serializes inside the harness process.
#[derive(Debug, Clone)]
pub struct ReferenceCandidate {
    name: String,
}

impl ReferenceCandidate {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ReferenceCandidate {
    fn default() -> Self {
        Self::new(REFERENCE_NAME)
    }
}

/// Parse, transform and re-serialize; returns the output length in bytes.
pub fn reference_pipeline(json: &str) -> Result<usize, CandidateError> {
    let data: serde_json::Value = serde_json::from_str(json)?;
    let processed = process_json_data(&data);
    let out = serde_json::to_string(&processed)?;
    Ok(out.len())
}

impl Candidate for ReferenceCandidate {
    fn name(&self) -> &str {
        &self.name
    }

    fn run(&self, input: &CandidateInput<'_>, sampler: &mut MemorySampler) -> CandidateResult {
        let (outcome, m) = measure_once(sampler, || reference_pipeline(input.json));
        match outcome {
            Ok(result_size) => CandidateResult::Success(CandidateMetrics {
                processing_time: m.elapsed_secs(),
                memory_used: m.memory_delta_mb,
                resident_memory: m.resident_after_mb,
                result_size: Some(result_size),
                success: true,
                process: None,
            }),
            Err(e) => e.into(),
        }
    }
}

/// Runs `<path> --benchmark <file>` and times it.
///
/// One deadline covers both waiting for the process and draining its
/// output, so a grandchild holding stdout open still times out. Exit is
/// detected by polling every millisecond; measured times can include up to
/// one poll interval of latency.
#[derive(Debug, Clone)]
pub struct ExecutableCandidate {
    name: String,
    path: PathBuf,
    timeout: Duration,
}

impl ExecutableCandidate {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn invoke(&self, file: &Path) -> Result<ProcessOutput, CandidateError> {
        let deadline = Instant::now() + self.timeout;
        let mut child = Command::new(&self.path)
            .arg("--benchmark")
            .arg(file)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| CandidateError::Spawn {
                name: self.name.clone(),
                source,
            })?;

        // Drain both pipes concurrently so a chatty child can't block on a full pipe.
        let stdout = child.stdout.take().map(spawn_reader);
        let stderr = child.stderr.take().map(spawn_reader);

        let status = self.wait_until(&mut child, deadline)?;

        // A reader still blocked after a timeout exits once the pipe closes.
        Ok(ProcessOutput {
            return_code: status.code(),
            stdout: self.collect_stream(stdout, deadline)?,
            stderr: self.collect_stream(stderr, deadline)?,
        })
    }

    fn wait_until(
        &self,
        child: &mut Child,
        deadline: Instant,
    ) -> Result<ExitStatus, CandidateError> {
        loop {
            match child.try_wait() {
                Ok(Some(status)) => return Ok(status),
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.timed_out());
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(source) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(self.wait_failed(source));
                }
            }
        }
    }

    fn collect_stream(
        &self,
        stream: Option<StreamReceiver>,
        deadline: Instant,
    ) -> Result<String, CandidateError> {
        let Some(rx) = stream else {
            return Ok(String::new());
        };
        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(Ok(bytes)) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Ok(Err(source)) => Err(self.wait_failed(source)),
            Err(RecvTimeoutError::Timeout) => Err(self.timed_out()),
            Err(RecvTimeoutError::Disconnected) => Err(self.wait_failed(io::Error::other(
                "output reader thread exited without a result",
            ))),
        }
    }

    fn timed_out(&self) -> CandidateError {
        CandidateError::Timeout {
            name: self.name.clone(),
            timeout: self.timeout,
        }
    }

    fn wait_failed(&self, source: io::Error) -> CandidateError {
        CandidateError::Wait {
            name: self.name.clone(),
            source,
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(mut stream: R) -> StreamReceiver {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let read = stream.read_to_end(&mut buf).map(|_| buf);
        // The receiver is gone if the run already timed out.
        let _ = tx.send(read);
    });
    rx
}

impl Candidate for ExecutableCandidate {
    fn name(&self) -> &str {
        &self.name
    }

    fn needs_file(&self) -> bool {
        true
    }

    fn run(&self, input: &CandidateInput<'_>, sampler: &mut MemorySampler) -> CandidateResult {
        if !self.path.exists() {
            return CandidateError::ExecutableNotFound {
                name: self.name.clone(),
            }
            .into();
        }
        let Some(file) = input.file else {
            return CandidateError::MissingFile {
                name: self.name.clone(),
            }
            .into();
        };

        let (outcome, m) = measure_once(sampler, || self.invoke(file));
        match outcome {
            Ok(output) => CandidateResult::Success(CandidateMetrics {
                processing_time: m.elapsed_secs(),
                memory_used: m.memory_delta_mb,
                resident_memory: m.resident_after_mb,
                result_size: None,
                success: true,
                process: Some(output),
            }),
            Err(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn input(json: &str) -> CandidateInput<'_> {
        CandidateInput { json, file: None }
    }

    #[test]
    fn test_reference_success() {
        let mut sampler = MemorySampler::new();
        let json = r#"{"users": [{"id": 1, "name": "a", "orders": [{"total": 2.0}]}]}"#;
        let result = ReferenceCandidate::default().run(&input(json), &mut sampler);

        let m = result.metrics().expect("reference should succeed");
        assert!(m.success);
        assert!(m.processing_time >= 0.0);
        assert!(m.result_size.unwrap() > 0);
        assert!(m.process.is_none());
    }

    #[test]
    fn test_reference_invalid_json_is_error_result() {
        let mut sampler = MemorySampler::new();
        let result = ReferenceCandidate::default().run(&input("{not json"), &mut sampler);
        assert!(!result.is_success());
        assert!(result.error().unwrap().starts_with("JSON processing failed"));
        assert_eq!(result.processing_time(), None);
    }

    #[test]
    fn test_missing_executable() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("payload.json");
        std::fs::write(&file, "{}").unwrap();

        let candidate = ExecutableCandidate::new("C++", dir.path().join("does-not-exist"));
        let mut sampler = MemorySampler::new();
        let result = candidate.run(
            &CandidateInput {
                json: "{}",
                file: Some(&file),
            },
            &mut sampler,
        );

        assert_eq!(result.error(), Some("C++ executable not found"));
    }

    #[test]
    fn test_failure_serializes_as_error_object() {
        let result: CandidateResult = CandidateError::ExecutableNotFound {
            name: "Swift".to_string(),
        }
        .into();
        let value = serde_json::to_value(&result).unwrap();
        assert_eq!(value, serde_json::json!({"error": "Swift executable not found"}));
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
            let path = dir.join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_nonzero_exit_is_reported_not_failed() {
            let dir = tempdir().unwrap();
            let exe = script(dir.path(), "fail.sh", "echo \"$1 $2\"\necho oops >&2\nexit 3");
            let file = dir.path().join("payload.json");
            fs::write(&file, "{}").unwrap();

            let mut sampler = MemorySampler::new();
            let result = ExecutableCandidate::new("Fake", &exe).run(
                &CandidateInput {
                    json: "{}",
                    file: Some(&file),
                },
                &mut sampler,
            );

            let m = result.metrics().expect("invocation itself succeeded");
            let out = m.process.as_ref().unwrap();
            assert_eq!(out.return_code, Some(3));
            assert_eq!(out.stdout, format!("--benchmark {}\n", file.display()));
            assert_eq!(out.stderr, "oops\n");
        }

        #[test]
        fn test_timeout_becomes_error() {
            let dir = tempdir().unwrap();
            let exe = script(dir.path(), "slow.sh", "exec sleep 5");
            let file = dir.path().join("payload.json");
            fs::write(&file, "{}").unwrap();

            let candidate =
                ExecutableCandidate::new("Slow", &exe).with_timeout(Duration::from_millis(200));
            let mut sampler = MemorySampler::new();
            let started = Instant::now();
            let result = candidate.run(
                &CandidateInput {
                    json: "{}",
                    file: Some(&file),
                },
                &mut sampler,
            );

            assert!(started.elapsed() < Duration::from_secs(4));
            assert_eq!(result.error(), Some("Slow timed out after 0.2 seconds"));
        }

        #[test]
        fn test_background_process_holding_output_times_out() {
            let dir = tempdir().unwrap();
            let exe = script(dir.path(), "lingering.sh", "sleep 4 &\nexit 0");
            let file = dir.path().join("payload.json");
            fs::write(&file, "{}").unwrap();

            let candidate = ExecutableCandidate::new("Lingering", &exe)
                .with_timeout(Duration::from_millis(500));
            let mut sampler = MemorySampler::new();
            let started = Instant::now();
            let result = candidate.run(
                &CandidateInput {
                    json: "{}",
                    file: Some(&file),
                },
                &mut sampler,
            );

            assert!(started.elapsed() < Duration::from_secs(2));
            assert_eq!(result.error(), Some("Lingering timed out after 0.5 seconds"));
        }

        #[test]
        fn test_missing_file_argument() {
            let dir = tempdir().unwrap();
            let exe = script(dir.path(), "ok.sh", "exit 0");
            let mut sampler = MemorySampler::new();
            let result = ExecutableCandidate::new("Ok", &exe).run(&input("{}"), &mut sampler);
            assert_eq!(
                result.error(),
                Some("Ok requires a payload file but none was provided")
            );
        }
    }
}
