use thiserror::Error;

/// Input rejected at the report-source boundary. `report` names the offending
/// row by id, source key, or row number, in that order of preference.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("report {report}: unknown status '{value}'")]
    UnknownStatus { report: String, value: String },

    #[error("report {report}: unknown utility type '{value}'")]
    UnknownUtility { report: String, value: String },

    #[error("report {report}: building_id is empty")]
    MissingBuilding { report: String },
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to open report file: {0}")]
    Io(#[from] std::io::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}
