use std::path::PathBuf;

use ifcb_arrow_netcdf::ContainerError;

pub type IfcbResult<T> = std::result::Result<T, IfcbError>;

#[derive(Debug, thiserror::Error)]
pub enum IfcbError {
    #[error("Invalid identifier {pid:?}: {reason}")]
    InvalidPid { pid: String, reason: String },
    #[error("Invalid container content: {0}")]
    InvalidContainer(String),
    #[error("Failed to parse ADC data: {0}")]
    Parse(String),
    #[error("Failed to read delimited text: {0}")]
    Csv(#[from] csv::Error),
    #[error("Missing raw data file: {0}")]
    MissingFile(PathBuf),
    #[error("No archived raw data found in {0}")]
    MissingArchive(String),
    #[error("Unknown schema: {0}")]
    UnknownSchema(String),
    #[error("Schemas can only be registered before the registry is first used")]
    RegistryInitialized,
    #[error("Bin has not been opened")]
    NotOpened,
    #[error("Bin is closed")]
    UseAfterClose,
    #[error("Bin was already opened once")]
    AlreadyOpened,
    #[error("Bin is already closed")]
    AlreadyClosed,
    #[error("No such object number: {0}")]
    ObjectNotFound(i64),
    #[error("No image for object number: {0}")]
    ImageNotFound(i64),
    #[error("No such header: {0}")]
    HeaderNotFound(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Container error: {0}")]
    Container(#[from] ContainerError),
    #[error("Internal NetCDF error: {0}")]
    NetCDF(#[from] netcdf::Error),
}

impl IfcbError {
    pub(crate) fn invalid_pid(pid: &str, reason: impl Into<String>) -> Self {
        IfcbError::InvalidPid {
            pid: pid.to_string(),
            reason: reason.into(),
        }
    }

    /// Identifier grammar violations and malformed container content.
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            IfcbError::InvalidPid { .. }
                | IfcbError::InvalidContainer(_)
                | IfcbError::Container(ContainerError::TypeTagMismatch { .. })
        )
    }

    /// Lookups of absent object numbers, images or header keys.
    pub fn is_key_error(&self) -> bool {
        matches!(
            self,
            IfcbError::ObjectNotFound(_) | IfcbError::ImageNotFound(_) | IfcbError::HeaderNotFound(_)
        )
    }
}
