use std::{iter::Copied, path::Path, slice};

use chrono::{DateTime, Utc};

use crate::{
    adc::{Adc, AdcRow},
    error::IfcbError,
    hdf::HdfBin,
    hdr::Headers,
    identifiers::Pid,
    raw::RawBin,
    roi::Image,
    IfcbResult,
};

/// File extensions opened as containers by [`open_bin`].
pub const CONTAINER_EXTENSIONS: [&str; 4] = ["nc", "h5", "hdf", "hdf5"];

/// Verbatim ADC and HDR bytes of a bin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchivedFiles {
    pub adc: Vec<u8>,
    pub hdr: Vec<u8>,
}

/// Object numbers of a bin in ADC order.
///
/// Cloning restarts the iteration from the current position, calling
/// [`Bin::object_numbers`] again restarts it from the first object.
#[derive(Debug, Clone)]
pub struct ObjectNumbers<'a> {
    numbers: Copied<slice::Iter<'a, i64>>,
}

impl<'a> ObjectNumbers<'a> {
    pub(crate) fn new(numbers: &'a [i64]) -> Self {
        Self {
            numbers: numbers.iter().copied(),
        }
    }
}

impl Iterator for ObjectNumbers<'_> {
    type Item = i64;

    fn next(&mut self) -> Option<i64> {
        self.numbers.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.numbers.size_hint()
    }
}

impl ExactSizeIterator for ObjectNumbers<'_> {}

/// Read access to one bin, independent of how it is stored.
///
/// A bin is opened once and closed once. Accessors compute their value on
/// first use and keep it until [`Bin::close`], after which every accessor
/// fails with [`IfcbError::UseAfterClose`].
pub trait Bin {
    fn pid(&self) -> IfcbResult<&Pid>;

    fn schema_version(&self) -> IfcbResult<u32>;

    fn headers(&self) -> IfcbResult<&Headers>;

    fn adc(&self) -> IfcbResult<&Adc>;

    /// Object numbers with an image, ascending.
    fn image_numbers(&self) -> IfcbResult<Vec<i64>>;

    fn get_image(&self, target_number: i64) -> IfcbResult<Image>;

    fn archived_files(&self) -> IfcbResult<ArchivedFiles>;

    fn is_open(&self) -> bool;

    fn open(&mut self) -> IfcbResult<()>;

    fn close(&mut self) -> IfcbResult<()>;

    fn lid(&self) -> IfcbResult<&str> {
        self.pid()?.bin_lid()
    }

    fn timestamp(&self) -> IfcbResult<DateTime<Utc>> {
        self.pid()?.timestamp()
    }

    fn header(&self, key: &str) -> IfcbResult<&ifcb_arrow_netcdf::attribute::ScalarValue> {
        self.headers()?
            .get(key)
            .ok_or_else(|| IfcbError::HeaderNotFound(key.to_string()))
    }

    fn object_numbers(&self) -> IfcbResult<ObjectNumbers<'_>> {
        Ok(ObjectNumbers::new(self.adc()?.object_numbers()))
    }

    fn get_row(&self, target_number: i64) -> IfcbResult<AdcRow> {
        self.adc()?.get_row(target_number)
    }

    fn len(&self) -> IfcbResult<usize> {
        Ok(self.adc()?.row_count())
    }
}

/// Lifecycle of a backing store handle.
#[derive(Debug)]
pub(crate) enum Handle<T> {
    Unopened,
    Open(T),
    Closed,
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Handle::Unopened
    }
}

impl<T> Handle<T> {
    pub(crate) fn get(&self) -> IfcbResult<&T> {
        match self {
            Handle::Open(handle) => Ok(handle),
            Handle::Unopened => Err(IfcbError::NotOpened),
            Handle::Closed => Err(IfcbError::UseAfterClose),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        matches!(self, Handle::Open(_))
    }

    pub(crate) fn open(&mut self, open: impl FnOnce() -> IfcbResult<T>) -> IfcbResult<()> {
        match self {
            Handle::Unopened => {
                *self = Handle::Open(open()?);
                Ok(())
            }
            _ => Err(IfcbError::AlreadyOpened),
        }
    }

    /// Drops the handle, which releases the underlying files.
    pub(crate) fn close(&mut self) -> IfcbResult<()> {
        match std::mem::replace(self, Handle::Closed) {
            Handle::Open(_) => Ok(()),
            previous => {
                *self = previous;
                Err(IfcbError::AlreadyClosed)
            }
        }
    }
}

/// Either bin backing behind one type.
pub enum AnyBin {
    Raw(RawBin),
    Hdf(HdfBin),
}

macro_rules! delegate {
    ($self:ident, $bin:ident => $call:expr) => {
        match $self {
            AnyBin::Raw($bin) => $call,
            AnyBin::Hdf($bin) => $call,
        }
    };
}

impl Bin for AnyBin {
    fn pid(&self) -> IfcbResult<&Pid> {
        delegate!(self, bin => bin.pid())
    }

    fn schema_version(&self) -> IfcbResult<u32> {
        delegate!(self, bin => bin.schema_version())
    }

    fn headers(&self) -> IfcbResult<&Headers> {
        delegate!(self, bin => bin.headers())
    }

    fn adc(&self) -> IfcbResult<&Adc> {
        delegate!(self, bin => bin.adc())
    }

    fn image_numbers(&self) -> IfcbResult<Vec<i64>> {
        delegate!(self, bin => bin.image_numbers())
    }

    fn get_image(&self, target_number: i64) -> IfcbResult<Image> {
        delegate!(self, bin => bin.get_image(target_number))
    }

    fn archived_files(&self) -> IfcbResult<ArchivedFiles> {
        delegate!(self, bin => bin.archived_files())
    }

    fn is_open(&self) -> bool {
        delegate!(self, bin => bin.is_open())
    }

    fn open(&mut self) -> IfcbResult<()> {
        delegate!(self, bin => bin.open())
    }

    fn close(&mut self) -> IfcbResult<()> {
        delegate!(self, bin => bin.close())
    }
}

impl From<RawBin> for AnyBin {
    fn from(bin: RawBin) -> Self {
        AnyBin::Raw(bin)
    }
}

impl From<HdfBin> for AnyBin {
    fn from(bin: HdfBin) -> Self {
        AnyBin::Hdf(bin)
    }
}

pub fn is_container_path(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| {
            CONTAINER_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(extension))
        })
}

/// Opens the bin at `path`.
///
/// Container files are recognized by extension and read from `group` (the
/// root group if `None`). Any other path names a raw trio, either by one of
/// its three files or by the base path without extension.
pub fn open_bin<P: AsRef<Path>>(path: P, group: Option<&str>) -> IfcbResult<AnyBin> {
    let path = path.as_ref();
    let mut bin: AnyBin = if is_container_path(path) {
        HdfBin::new(path, group).into()
    } else {
        RawBin::new(path).into()
    };
    bin.open()?;
    Ok(bin)
}
