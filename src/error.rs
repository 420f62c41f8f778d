use thiserror::Error;

#[derive(Error, Debug)]
pub enum CovtreeError {
    #[error("Invalid coverage data: {0}")]
    InvalidCoverageData(String),

    #[error("Invalid coverage data in '{file}' at line {line}: {detail}")]
    InvalidLineStatus {
        file: String,
        line: u32,
        detail: String,
    },

    #[error("Unknown code unit: {0}")]
    UnknownTarget(String),

    #[error("Report tree is finalized and can no longer be modified")]
    ReportFinalized,
}

pub type Result<T> = std::result::Result<T, CovtreeError>;
