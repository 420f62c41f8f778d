//! Coverage merge engine: accumulates raw per-test line-hit samples into one
//! consistent per-file line/branch table.
//!
//! Driver status codes per line (as emitted by instrumentation sources):
//!   > 0   hit count
//!   -1    executable, not hit
//!   -2    dead / unreachable
//!
//! Merge policy: executability, once observed, wins permanently. A `-2` never
//! demotes a line that any sample saw as executable, and the set of tests
//! covering a line only ever grows.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;

use crate::error::{CovtreeError, Result};

/// Identifier of one recorded test, e.g. `"MoneyTest::testNegate"`.
pub type TestId = String;

/// Merged status of a single (file, line) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum LineStatus {
    /// Excluded from all percentage math.
    NotExecutable,
    /// Executable, but no recorded test hit it.
    Uncovered,
    /// Executable and hit by every test in the (non-empty) set.
    Covered(BTreeSet<TestId>),
}

impl LineStatus {
    #[must_use]
    pub fn is_executable(&self) -> bool {
        !matches!(self, LineStatus::NotExecutable)
    }

    #[must_use]
    pub fn is_covered(&self) -> bool {
        matches!(self, LineStatus::Covered(_))
    }
}

/// Per-function branch and path hit flags from a path-coverage-capable driver.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FunctionBranches {
    /// Branch id → observed-executed flag.
    pub branches: BTreeMap<u32, bool>,
    /// Path id → observed-executed flag.
    pub paths: BTreeMap<u32, bool>,
}

/// Raw per-line driver statuses for one file within one sample.
#[derive(Debug, Clone, Default)]
pub struct RawFileData {
    pub lines: BTreeMap<u32, i64>,
    /// Function name → branch/path flags. Empty unless the driver collected
    /// path coverage.
    pub functions: BTreeMap<String, FunctionBranches>,
}

/// One instrumentation sample: everything a single test execution touched.
#[derive(Debug, Clone, Default)]
pub struct RawSample {
    pub files: BTreeMap<String, RawFileData>,
}

impl RawSample {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a sample from untyped JSON of the shape
    /// `{"/path/File.php": {"10": 1, "11": -1, "12": -2}, ...}`.
    ///
    /// Anything that is not a map of file paths to line tables is rejected
    /// as invalid coverage data.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        let files = value.as_object().ok_or_else(|| {
            CovtreeError::InvalidCoverageData(
                "expected a map of file paths to line tables".to_string(),
            )
        })?;

        let mut sample = RawSample::new();
        for (path, table) in files {
            let table = table.as_object().ok_or_else(|| {
                CovtreeError::InvalidCoverageData(format!(
                    "expected a map of line numbers to statuses for '{path}'"
                ))
            })?;

            let mut data = RawFileData::default();
            for (line, status) in table {
                let line: u32 = line.parse().map_err(|_| {
                    CovtreeError::InvalidCoverageData(format!(
                        "non-numeric line key '{line}' for '{path}'"
                    ))
                })?;
                let status = status.as_i64().ok_or_else(|| {
                    CovtreeError::InvalidLineStatus {
                        file: path.clone(),
                        line,
                        detail: "status is not an integer".to_string(),
                    }
                })?;
                data.lines.insert(line, status);
            }
            sample.files.insert(path.clone(), data);
        }
        Ok(sample)
    }
}

/// Merged coverage for a single file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileCoverage {
    pub lines: BTreeMap<u32, LineStatus>,
    pub functions: BTreeMap<String, FunctionBranches>,
}

impl FileCoverage {
    /// Count of (executable branches, executed branches) across functions.
    #[must_use]
    pub fn branch_totals(&self) -> (u64, u64) {
        let mut total = 0;
        let mut executed = 0;
        for f in self.functions.values() {
            total += f.branches.len() as u64;
            executed += f.branches.values().filter(|&&hit| hit).count() as u64;
        }
        (total, executed)
    }

    /// Count of (executable paths, executed paths) across functions.
    #[must_use]
    pub fn path_totals(&self) -> (u64, u64) {
        let mut total = 0;
        let mut executed = 0;
        for f in self.functions.values() {
            total += f.paths.len() as u64;
            executed += f.paths.values().filter(|&&hit| hit).count() as u64;
        }
        (total, executed)
    }
}

/// The accumulated merge table across all samples seen so far.
#[derive(Debug, Clone, Default)]
pub struct ProcessedCoverage {
    files: BTreeMap<String, FileCoverage>,
}

impl ProcessedCoverage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn files(&self) -> &BTreeMap<String, FileCoverage> {
        &self.files
    }

    #[must_use]
    pub fn file(&self, path: &str) -> Option<&FileCoverage> {
        self.files.get(path)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Merge one raw sample recorded for `test_id` into the table.
    pub fn merge_sample(&mut self, test_id: &str, sample: &RawSample) -> Result<()> {
        // Validate the whole sample before touching the table so a
        // malformed sample leaves no partial state behind.
        for (path, data) in &sample.files {
            for (&line, &status) in &data.lines {
                if status < -2 {
                    return Err(CovtreeError::InvalidLineStatus {
                        file: path.clone(),
                        line,
                        detail: format!("unknown driver status code {status}"),
                    });
                }
            }
        }

        for (path, data) in &sample.files {
            let file = self.files.entry(path.clone()).or_default();
            for (&line, &status) in &data.lines {
                let incoming = match status {
                    s if s > 0 => {
                        let mut tests = BTreeSet::new();
                        tests.insert(test_id.to_string());
                        LineStatus::Covered(tests)
                    }
                    -2 => LineStatus::NotExecutable,
                    // -1 and 0 both mean executable with zero hits.
                    _ => LineStatus::Uncovered,
                };
                merge_line(file.lines.entry(line).or_insert(incoming.clone()), incoming);
            }
            for (name, flags) in &data.functions {
                merge_branches(file.functions.entry(name.clone()).or_default(), flags);
            }
        }
        Ok(())
    }

    /// Combine another already-processed table into this one with the same
    /// line-by-line policy. Commutative and associative, so partial tables
    /// produced by parallel workers can be combined in any order.
    pub fn append(&mut self, other: ProcessedCoverage) {
        for (path, data) in other.files {
            let file = self.files.entry(path).or_default();
            for (line, status) in data.lines {
                merge_line(file.lines.entry(line).or_insert(status.clone()), status);
            }
            for (name, flags) in data.functions {
                merge_branches(file.functions.entry(name).or_default(), &flags);
            }
        }
    }
}

/// Apply the merge policy to a single line slot.
///
/// Observed executability is permanent: `NotExecutable` only survives when
/// both sides agree. Among executable observations the covering-test union
/// grows monotonically.
fn merge_line(current: &mut LineStatus, incoming: LineStatus) {
    match (&mut *current, incoming) {
        (LineStatus::NotExecutable, inc) => {
            if inc.is_executable() {
                *current = inc;
            }
        }
        (LineStatus::Uncovered, LineStatus::Covered(tests)) => {
            *current = LineStatus::Covered(tests);
        }
        (LineStatus::Covered(existing), LineStatus::Covered(tests)) => {
            existing.extend(tests);
        }
        // Covered + Uncovered/NotExecutable, Uncovered + Uncovered/NotExecutable.
        _ => {}
    }
}

fn merge_branches(current: &mut FunctionBranches, incoming: &FunctionBranches) {
    for (&id, &hit) in &incoming.branches {
        let slot = current.branches.entry(id).or_insert(false);
        *slot = *slot || hit;
    }
    for (&id, &hit) in &incoming.paths {
        let slot = current.paths.entry(id).or_insert(false);
        *slot = *slot || hit;
    }
}
