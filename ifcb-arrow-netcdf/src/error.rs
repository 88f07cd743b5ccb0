use arrow::error::ArrowError;
use arrow_schema::DataType;
use netcdf::{types::NcVariableType, AttributeValue};

pub type ContainerResult<T> = std::result::Result<T, ContainerError>;

#[derive(Debug, thiserror::Error)]
pub enum ContainerError {
    #[error("Internal NetCDF error: {0}")]
    NetCDFError(#[from] netcdf::Error),
    #[error("Failed to assemble arrow data: {0}")]
    ArrowError(#[from] ArrowError),
    #[error("Container has no root group")]
    NoRootGroup,
    #[error("Group not found: {0}")]
    MissingGroup(String),
    #[error("Dataset not found: {0}")]
    MissingDataset(String),
    #[error("Attribute not found: {0}")]
    MissingAttribute(String),
    #[error("Expected group type tag {expected:?}, found {found:?}")]
    TypeTagMismatch {
        expected: String,
        found: Option<String>,
    },
    #[error("Dataset reference {0:?} does not resolve")]
    UnresolvedReference(String),
    #[error("Unsupported arrow data type: {0:?}")]
    UnsupportedDataType(DataType),
    #[error("Unsupported NetCDF variable type: {0:?}")]
    UnsupportedVariableType(NcVariableType),
    #[error("Unsupported attribute value: {0:?}")]
    UnsupportedAttributeValue(AttributeValue),
    #[error("Length mismatch: {0}")]
    LengthMismatch(String),
}
