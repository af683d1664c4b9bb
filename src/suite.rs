//! Drives every configured size through every candidate, one at a time.

use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::candidate::{Candidate, CandidateInput, CandidateResult};
use crate::error::{CandidateError, SuiteError};
use crate::harness::MemorySampler;
use crate::payload;
use crate::transform::find_users_by_name;
use crate::SuiteProfile;

pub const DEFAULT_SEARCH_NEEDLE: &str = "User 500";

#[derive(Clone, Debug)]
pub struct SuiteConfig {
    /// Payload sizes in MB, run in this order.
    pub sizes: Vec<u32>,
    /// Name substring for the search probe; `None` skips the probe.
    pub search_needle: Option<String>,
}

impl SuiteConfig {
    pub fn for_profile(profile: SuiteProfile) -> Self {
        Self {
            sizes: profile.sizes().to_vec(),
            search_needle: Some(DEFAULT_SEARCH_NEEDLE.to_string()),
        }
    }
}

impl Default for SuiteConfig {
    fn default() -> Self {
        Self::for_profile(SuiteProfile::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchProbe {
    pub needle: String,
    /// Seconds spent parsing the payload and scanning user names.
    pub search_time: f64,
    pub matches: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRun {
    pub candidate: String,
    pub result: CandidateResult,
}

/// Everything measured for one size bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BenchmarkRecord {
    pub size_mb: u32,
    pub payload_bytes: usize,
    pub user_count: usize,
    pub payload_sha256: String,
    pub search: Option<SearchProbe>,
    /// In candidate registration order.
    pub results: Vec<CandidateRun>,
}

impl BenchmarkRecord {
    pub fn result(&self, candidate: &str) -> Option<&CandidateResult> {
        self.results
            .iter()
            .find(|r| r.candidate == candidate)
            .map(|r| &r.result)
    }
}

pub struct BenchmarkSuite {
    config: SuiteConfig,
    candidates: Vec<Box<dyn Candidate>>,
    sampler: MemorySampler,
}

impl BenchmarkSuite {
    pub fn new(config: SuiteConfig) -> Self {
        Self {
            config,
            candidates: Vec::new(),
            sampler: MemorySampler::new(),
        }
    }

    /// Register a candidate. Names key the report columns, so they must be unique.
    pub fn add_candidate(&mut self, candidate: Box<dyn Candidate>) -> Result<(), SuiteError> {
        if self.candidates.iter().any(|c| c.name() == candidate.name()) {
            return Err(SuiteError::DuplicateCandidate(candidate.name().to_string()));
        }
        self.candidates.push(candidate);
        Ok(())
    }

    pub fn with_candidate(
        mut self,
        candidate: impl Candidate + 'static,
    ) -> Result<Self, SuiteError> {
        self.add_candidate(Box::new(candidate))?;
        Ok(self)
    }

    pub fn config(&self) -> &SuiteConfig {
        &self.config
    }

    pub fn candidate_names(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.name().to_string()).collect()
    }

    /// Run every size in order. Candidate failures are recorded, not returned;
    /// only payload generation and temp-file errors abort.
    pub fn run(&mut self) -> Result<Vec<BenchmarkRecord>, SuiteError> {
        let sizes = self.config.sizes.clone();
        let mut records = Vec::with_capacity(sizes.len());
        for size_mb in sizes {
            records.push(self.run_size(size_mb)?);
        }
        Ok(records)
    }

    pub fn run_size(&mut self, size_mb: u32) -> Result<BenchmarkRecord, SuiteError> {
        info!(size_mb, "generating payload");
        let generated = payload::generate(size_mb)?;
        info!(
            size_mb,
            users = generated.user_count(),
            bytes = generated.text.len(),
            "payload ready"
        );

        let temp = if self.candidates.iter().any(|c| c.needs_file()) {
            Some(write_temp_payload(&generated.text)?)
        } else {
            None
        };
        let input = CandidateInput {
            json: &generated.text,
            file: temp.as_ref().map(NamedTempFile::path),
        };

        let mut results = Vec::with_capacity(self.candidates.len());
        for candidate in &self.candidates {
            let result = run_guarded(candidate.as_ref(), &input, &mut self.sampler);
            match &result {
                CandidateResult::Success(m) => info!(
                    size_mb,
                    candidate = candidate.name(),
                    seconds = m.processing_time,
                    memory_mb = ?m.memory_used,
                    "candidate finished"
                ),
                CandidateResult::Failure { error } => {
                    warn!(size_mb, candidate = candidate.name(), %error, "candidate failed")
                }
            }
            results.push(CandidateRun {
                candidate: candidate.name().to_string(),
                result,
            });
        }

        if let Some(temp) = temp {
            let path = temp.path().to_path_buf();
            temp.close().map_err(SuiteError::TempFile)?;
            debug!(path = %path.display(), "removed temporary payload");
        }

        let search = self
            .config
            .search_needle
            .as_deref()
            .map(|needle| search_probe(&generated.text, needle))
            .transpose()?;

        Ok(BenchmarkRecord {
            size_mb,
            payload_bytes: generated.text.len(),
            user_count: generated.user_count(),
            payload_sha256: hex32(Sha256::digest(generated.text.as_bytes()).into()),
            search,
            results,
        })
    }
}

fn write_temp_payload(text: &str) -> Result<NamedTempFile, SuiteError> {
    let mut file = tempfile::Builder::new()
        .prefix("treon-bench-")
        .suffix(".json")
        .tempfile()
        .map_err(SuiteError::TempFile)?;
    file.write_all(text.as_bytes())
        .and_then(|_| file.flush())
        .map_err(SuiteError::TempFile)?;
    Ok(file)
}

/// Run a candidate, converting a panic into a failure result.
fn run_guarded(
    candidate: &dyn Candidate,
    input: &CandidateInput<'_>,
    sampler: &mut MemorySampler,
) -> CandidateResult {
    panic::catch_unwind(AssertUnwindSafe(|| candidate.run(input, sampler))).unwrap_or_else(
        |payload| {
            CandidateError::Panicked {
                name: candidate.name().to_string(),
                message: panic_message(payload.as_ref()),
            }
            .into()
        },
    )
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Parse `text` and count users whose name contains `needle`. The text is
/// freshly generated, so a parse failure is a generator bug and is fatal.
fn search_probe(text: &str, needle: &str) -> Result<SearchProbe, SuiteError> {
    let start = Instant::now();
    let data: serde_json::Value = serde_json::from_str(text).map_err(SuiteError::SearchParse)?;
    let matches = find_users_by_name(&data, needle).len();
    Ok(SearchProbe {
        needle: needle.to_string(),
        search_time: start.elapsed().as_secs_f64(),
        matches,
    })
}

fn hex32(d: [u8; 32]) -> String {
    let mut s = String::with_capacity(64);
    for b in d {
        s.push_str(&format!("{:02x}", b));
    }
    s
}
