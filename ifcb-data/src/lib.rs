//! Reading and writing IFCB bins.
//!
//! An IFCB acquisition ("bin") is produced as three files sharing a base name:
//! the ADC table (one CSV row per captured object), the HDR header (`key: value`
//! lines) and the ROI file (the object images, back to back). The same bin can
//! be consolidated into a group of a netCDF-4 container with [`write_bin`].
//!
//! Both backings are read through the [`Bin`] trait:
//!
//! ```no_run
//! use ifcb_data::{open_bin, Bin};
//!
//! let bin = open_bin("/data/D20000101T123456_IFCB001.adc", None)?;
//! for target_number in bin.object_numbers()? {
//!     let row = bin.get_row(target_number)?;
//!     println!("{} {:?}", row.target_number, row.get("height"));
//! }
//! # Ok::<(), ifcb_data::IfcbError>(())
//! ```

pub mod adc;
pub mod bins;
pub mod error;
pub mod hdf;
pub mod hdr;
pub mod identifiers;
pub mod raw;
pub mod roi;
pub mod schema;

pub use adc::{Adc, AdcRow, AdcValue};
pub use bins::{open_bin, AnyBin, ArchivedFiles, Bin, ObjectNumbers};
pub use error::{IfcbError, IfcbResult};
pub use hdf::{reconstruct_raw_trio, write_bin, HdfBin, WriteOptions};
pub use hdr::Headers;
pub use identifiers::Pid;
pub use ifcb_arrow_netcdf::attribute::ScalarValue;
pub use raw::RawBin;
pub use roi::Image;
pub use schema::Schema;
