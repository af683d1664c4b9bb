use clap::ValueEnum;

pub mod candidate;
pub mod error;
pub mod harness;
pub mod payload;
pub mod report;
pub mod schema;
pub mod suite;
pub mod transform;

/// Which benchmark matrix to run.
#[derive(Clone, Copy, Debug, Default, ValueEnum, PartialEq, Eq)]
pub enum SuiteProfile {
    /// Sizes 1/10/50/100 MB with the reference and the default external executables.
    #[default]
    Full,
    /// Sizes 1/10/50 MB, reference implementation only.
    Lite,
}

impl SuiteProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            SuiteProfile::Full => "full",
            SuiteProfile::Lite => "lite",
        }
    }

    pub fn sizes(&self) -> &'static [u32] {
        match self {
            SuiteProfile::Full => &[1, 10, 50, 100],
            SuiteProfile::Lite => &[1, 10, 50],
        }
    }

    /// `(name, path)` of the external executables benchmarked by default.
    pub fn default_executables(&self) -> &'static [(&'static str, &'static str)] {
        match self {
            SuiteProfile::Full => &[("C++", "./cpp/build/Treon"), ("Swift", "./swift/Treon")],
            SuiteProfile::Lite => &[],
        }
    }
}
