//! Arrow tables inside netCDF-4 groups.
//!
//! The layout is generic and can hold any named, ordered, column oriented
//! table next to other data in the same file.
//!
//! Layout Overview
//!
//! /{group}/                 (ptype = "Table")
//!     ├── 0, 1, .., n-1     one dataset per column, named by position
//!     │                     (validity = name of its null mask, if any)
//!     ├── {n}_validity      u8 null mask of column n, 1 valid, 0 null
//!     ├── columns           references to the column datasets
//!     │                     (names = column names in order)
//!     └── index             row index values (name = index name, optional)
//!
//! netCDF has no object reference type, so a reference is stored as the
//! name of the referenced dataset within the group holding the reference
//! table, and the null reference as the empty string.

pub mod attribute;
pub mod error;
pub mod group;
pub mod reader;
pub mod reference;
pub mod table;
pub mod writer;

pub use error::{ContainerError, ContainerResult};
pub use table::IndexedTable;

/// Attribute carrying the type tag of a group.
pub const TYPE_TAG_ATTRIBUTE: &str = "ptype";
/// Type tag of a group holding an [`IndexedTable`].
pub const TABLE_TYPE_TAG: &str = "Table";

pub(crate) const ROW_DIM: &str = "row";
pub(crate) const COLUMNS_DATASET: &str = "columns";
pub(crate) const INDEX_DATASET: &str = "index";
pub(crate) const NAMES_ATTRIBUTE: &str = "names";
pub(crate) const NAME_ATTRIBUTE: &str = "name";
pub(crate) const VALIDITY_ATTRIBUTE: &str = "validity";
