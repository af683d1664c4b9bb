use serde::{Deserialize, Serialize};

use crate::report::Report;
use crate::suite::BenchmarkRecord;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub schema_version: u32,
    pub bench_version: String,
    pub profile: String,
    pub timestamp_utc: String,
    pub git_sha: Option<String>,
    pub sizes_mb: Vec<u32>,
    pub candidates: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchReport {
    pub run: RunMeta,
    pub records: Vec<BenchmarkRecord>,
    pub report: Report,
}

impl BenchReport {
    pub fn new(run: RunMeta, records: Vec<BenchmarkRecord>) -> Self {
        let report = Report::from_records(&records);
        Self {
            run,
            records,
            report,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::ReferenceCandidate;
    use crate::suite::{BenchmarkSuite, SuiteConfig};

    #[test]
    fn test_report_json_shape() {
        let mut suite = BenchmarkSuite::new(SuiteConfig {
            sizes: vec![1],
            search_needle: None,
        })
        .with_candidate(ReferenceCandidate::default())
        .unwrap();
        let records = suite.run().unwrap();

        let report = BenchReport::new(
            RunMeta {
                schema_version: SCHEMA_VERSION,
                bench_version: "test".to_string(),
                profile: "lite".to_string(),
                timestamp_utc: "unix:0".to_string(),
                git_sha: None,
                sizes_mb: vec![1],
                candidates: suite.candidate_names(),
            },
            records,
        );

        let value = serde_json::to_value(&report).unwrap();
        let result = &value["records"][0]["results"][0];
        assert_eq!(result["candidate"], "Reference");
        assert_eq!(result["result"]["success"], true);
        assert!(result["result"]["processing_time"].as_f64().unwrap() >= 0.0);
        assert!(result["result"].get("error").is_none());
        assert_eq!(value["report"]["rows"][0]["winner"], "Reference");
    }
}
