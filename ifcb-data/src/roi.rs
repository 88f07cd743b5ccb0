use std::{
    collections::BTreeMap,
    io::{Read, Seek, SeekFrom},
};

use ifcb_arrow_netcdf::{
    attribute,
    reference::{read_reference_table, DatasetRef},
};
use ndarray::Array2;
use netcdf::Group;

use crate::{
    adc::Adc,
    error::IfcbError,
    schema::{BYTE_OFFSET_COLUMN, HEIGHT_COLUMN, WIDTH_COLUMN},
    IfcbResult,
};

/// A region of interest, `height` rows of `width` pixels.
pub type Image = Array2<u8>;

pub(crate) const INDEX_ATTRIBUTE: &str = "index";
pub(crate) const IMAGES_DATASET: &str = "images";

/// Location of one image inside a raw ROI file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoiEntry {
    pub height: usize,
    pub width: usize,
    pub byte_offset: u64,
}

impl RoiEntry {
    /// Pixel count, `None` if it does not fit in `usize`.
    pub fn len(&self) -> Option<usize> {
        self.height.checked_mul(self.width)
    }

    pub fn is_empty(&self) -> bool {
        self.height == 0 || self.width == 0
    }
}

/// Image locations derived from the ADC geometry columns.
#[derive(Debug, Clone, Default)]
pub struct RoiIndex {
    entries: BTreeMap<i64, RoiEntry>,
}

impl RoiIndex {
    /// Objects with zero height or width, or without a byte offset, have no image.
    pub fn from_adc(adc: &Adc) -> IfcbResult<Self> {
        let mut entries = BTreeMap::new();
        for &target_number in adc.object_numbers() {
            let geometry = |column: &str| -> IfcbResult<Option<i64>> {
                Ok(adc
                    .value(target_number, column)?
                    .and_then(|value| value.as_i64()))
            };
            let (Some(height), Some(width), Some(byte_offset)) = (
                geometry(HEIGHT_COLUMN)?,
                geometry(WIDTH_COLUMN)?,
                geometry(BYTE_OFFSET_COLUMN)?,
            ) else {
                continue;
            };
            if height <= 0 || width <= 0 || byte_offset < 0 {
                continue;
            }
            let (Ok(height), Ok(width)) = (usize::try_from(height), usize::try_from(width)) else {
                return Err(IfcbError::Parse(format!(
                    "object {target_number}: image of {height} x {width} pixels"
                )));
            };
            entries.insert(
                target_number,
                RoiEntry {
                    height,
                    width,
                    byte_offset: byte_offset as u64,
                },
            );
        }
        tracing::debug!("Indexed {} images", entries.len());
        Ok(Self { entries })
    }

    /// Object numbers with an image, ascending.
    pub fn object_numbers(&self) -> Vec<i64> {
        self.entries.keys().copied().collect()
    }

    pub fn entry(&self, target_number: i64) -> Option<&RoiEntry> {
        self.entries.get(&target_number)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads one image, checking its extent against the end of `source`
    /// before allocating.
    pub fn read_image<R: Read + Seek>(&self, source: &mut R, target_number: i64) -> IfcbResult<Image> {
        let entry = self
            .entry(target_number)
            .ok_or(IfcbError::ImageNotFound(target_number))?;
        let source_len = source.seek(SeekFrom::End(0))?;
        let len = entry
            .len()
            .filter(|&len| {
                u64::try_from(len)
                    .ok()
                    .and_then(|len| entry.byte_offset.checked_add(len))
                    .is_some_and(|end| end <= source_len)
            })
            .ok_or_else(|| {
                IfcbError::Parse(format!(
                    "image {target_number} of {} x {} pixels at byte {} exceeds ROI data of {source_len} bytes",
                    entry.height, entry.width, entry.byte_offset
                ))
            })?;
        source.seek(SeekFrom::Start(entry.byte_offset))?;
        let mut pixels = vec![0u8; len];
        source.read_exact(&mut pixels)?;
        Array2::from_shape_vec((entry.height, entry.width), pixels)
            .map_err(|e| IfcbError::Parse(format!("image {target_number}: {e}")))
    }
}

/// Images stored in a container `roi` group.
///
/// The `index` attribute lists the object numbers with an image, and the
/// `images` dataset maps every object number up to the largest one to its
/// image dataset or to the null reference.
#[derive(Debug, Clone, Default)]
pub struct ContainerRoi {
    index: Vec<i64>,
    references: Vec<Option<DatasetRef>>,
}

impl ContainerRoi {
    pub fn read(group: &Group) -> IfcbResult<Self> {
        let index = match group.attribute(INDEX_ATTRIBUTE) {
            Some(index) => attribute::integer_list(&index)?,
            None => Vec::new(),
        };
        let references = if group.variable(IMAGES_DATASET).is_some() {
            read_reference_table(group, IMAGES_DATASET)?
        } else {
            Vec::new()
        };
        Ok(Self { index, references })
    }

    pub fn object_numbers(&self) -> &[i64] {
        &self.index
    }

    pub fn reference(&self, target_number: i64) -> Option<&DatasetRef> {
        usize::try_from(target_number)
            .ok()
            .and_then(|slot| self.references.get(slot))
            .and_then(Option::as_ref)
    }

    pub fn get_image(&self, group: &Group, target_number: i64) -> IfcbResult<Image> {
        let reference = self
            .reference(target_number)
            .ok_or(IfcbError::ImageNotFound(target_number))?;
        let variable = reference.resolve(group)?;
        let shape = variable
            .dimensions()
            .iter()
            .map(|dimension| dimension.len())
            .collect::<Vec<_>>();
        let [height, width] = shape[..] else {
            return Err(IfcbError::InvalidContainer(format!(
                "image {target_number} has {} dimensions",
                shape.len()
            )));
        };
        let pixels = variable.get_values::<u8, _>(netcdf::Extents::All)?;
        Array2::from_shape_vec((height, width), pixels)
            .map_err(|e| IfcbError::InvalidContainer(format!("image {target_number}: {e}")))
    }
}
