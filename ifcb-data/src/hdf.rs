//! Bins inside netCDF-4 containers.
//!
//! Layout Overview
//!
//! /{group}/                 (ptype = "Bin", pid, lid, timestamp)
//!     ├── header/           one attribute per header pair
//!     ├── adc/              ADC table (ptype = "Table", schema = "v1" | "v2")
//!     ├── roi/              (index = object numbers with an image)
//!     │   ├── {n}           one u8 dataset per image, height x width
//!     │   └── images        reference per object number 0..=max, "" if absent
//!     └── archive/          optional
//!         ├── adc           verbatim ADC file bytes
//!         └── hdr           verbatim HDR file bytes

use std::{
    cell::OnceCell,
    collections::HashSet,
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use ifcb_arrow_netcdf::{
    attribute::{self, ScalarValue},
    group::{open_for_write, open_group, require_group},
    reader::read_table,
    reference::{write_references, DatasetRef},
    writer::{write_table, DatasetOptions},
    ContainerError, TYPE_TAG_ATTRIBUTE,
};
use netcdf::{AttributeValue, Group, GroupMut};

use crate::{
    adc::Adc,
    bins::{ArchivedFiles, Bin, Handle},
    error::IfcbError,
    hdr::Headers,
    identifiers::Pid,
    roi::{ContainerRoi, Image, IMAGES_DATASET, INDEX_ATTRIBUTE},
    schema::Schema,
    IfcbResult,
};

pub const BIN_TYPE_TAG: &str = "Bin";

const PID_ATTRIBUTE: &str = "pid";
const LID_ATTRIBUTE: &str = "lid";
const TIMESTAMP_ATTRIBUTE: &str = "timestamp";
const SCHEMA_ATTRIBUTE: &str = "schema";

const HEADER_GROUP: &str = "header";
const ADC_GROUP: &str = "adc";
const ROI_GROUP: &str = "roi";
const ARCHIVE_GROUP: &str = "archive";
const ARCHIVED_ADC: &str = "adc";
const ARCHIVED_HDR: &str = "hdr";

/// How bins and their parts are written to a container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteOptions {
    /// Recreate the destination file instead of adding to it.
    pub replace: bool,
    /// Embed the verbatim ADC and HDR bytes.
    pub archive: bool,
    /// Deflate level for the ADC columns and the archived ADC bytes.
    pub compression: Option<i32>,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            replace: true,
            archive: ifcb_config::CONFIG.archive,
            compression: ifcb_config::CONFIG.compression(),
        }
    }
}

impl WriteOptions {
    pub fn with_replace(mut self, replace: bool) -> Self {
        self.replace = replace;
        self
    }

    pub fn with_archive(mut self, archive: bool) -> Self {
        self.archive = archive;
        self
    }

    pub fn with_compression(mut self, compression: Option<i32>) -> Self {
        self.compression = compression;
        self
    }

    fn dataset_options(&self) -> DatasetOptions {
        DatasetOptions {
            compression: self.compression,
        }
    }
}

pub fn write_headers(group: &mut GroupMut, headers: &Headers) -> IfcbResult<()> {
    for (key, value) in headers {
        group.add_attribute(key, AttributeValue::from(value.clone()))?;
    }
    Ok(())
}

pub fn write_adc(group: &mut GroupMut, adc: &Adc, options: &WriteOptions) -> IfcbResult<()> {
    write_table(group, adc.table(), &options.dataset_options())?;
    let schema = Schema::for_version(adc.schema_version())?;
    group.add_attribute(SCHEMA_ATTRIBUTE, schema.name())?;
    Ok(())
}

/// Writes every image of `bin`. Image datasets share one dimension per
/// distinct side length.
pub fn write_roi<B: Bin + ?Sized>(group: &mut GroupMut, bin: &B) -> IfcbResult<()> {
    let numbers = bin.image_numbers()?;
    // an absent index reads back as no images
    if !numbers.is_empty() {
        group.add_attribute(INDEX_ATTRIBUTE, AttributeValue::Longlongs(numbers.clone()))?;
    }

    let mut dimensions = HashSet::new();
    for &target_number in &numbers {
        let image = bin.get_image(target_number)?;
        let (height, width) = image.dim();
        for length in [height, width] {
            if dimensions.insert(length) {
                group.add_dimension(&format!("len{length}"), length)?;
            }
        }
        let (height_dim, width_dim) = (format!("len{height}"), format!("len{width}"));
        let mut variable = group.add_variable::<u8>(
            &target_number.to_string(),
            &[height_dim.as_str(), width_dim.as_str()],
        )?;
        let pixels = image.iter().copied().collect::<Vec<u8>>();
        variable.put_values::<u8, _>(&pixels, netcdf::Extents::All)?;
    }

    if let Some(&max) = numbers.iter().max() {
        let present = numbers.iter().copied().collect::<HashSet<_>>();
        let references = (0..=max)
            .map(|n| present.contains(&n).then(|| DatasetRef::to(n.to_string())))
            .collect::<Vec<_>>();
        write_references(group, IMAGES_DATASET, &references)?;
    }
    tracing::debug!("Wrote {} images", numbers.len());
    Ok(())
}

fn write_bytes(
    group: &mut GroupMut,
    name: &str,
    bytes: &[u8],
    compression: Option<i32>,
) -> IfcbResult<()> {
    let dim = format!("{name}_bytes");
    group.add_dimension(&dim, bytes.len())?;
    let mut variable = group.add_variable::<u8>(name, &[dim.as_str()])?;
    if let Some(level) = compression {
        variable.set_compression(level, true)?;
    }
    if !bytes.is_empty() {
        variable.put_values::<u8, _>(bytes, netcdf::Extents::All)?;
    }
    Ok(())
}

pub fn write_archive(group: &mut GroupMut, files: &ArchivedFiles, options: &WriteOptions) -> IfcbResult<()> {
    write_bytes(group, ARCHIVED_ADC, &files.adc, options.compression)?;
    write_bytes(group, ARCHIVED_HDR, &files.hdr, None)
}

/// Writes `bin` into `group` of the container at `path`.
///
/// With `options.replace` the whole file is recreated first, so any other
/// bins it held are lost even when `group` names a subgroup. Use
/// `replace = false` to add bins to an existing container. A failed write
/// leaves whatever was written so far.
pub fn write_bin<B, P>(bin: &B, path: P, group: Option<&str>, options: &WriteOptions) -> IfcbResult<()>
where
    B: Bin + ?Sized,
    P: AsRef<Path>,
{
    let pid = bin.pid()?;
    tracing::debug!("Writing bin {} to {}", pid, path.as_ref().display());
    let mut file = open_for_write(path, options.replace)?;
    let mut root = require_group(&mut file, group)?;

    root.add_attribute(TYPE_TAG_ATTRIBUTE, BIN_TYPE_TAG)?;
    root.add_attribute(PID_ATTRIBUTE, pid.as_str())?;
    root.add_attribute(LID_ATTRIBUTE, bin.lid()?)?;
    root.add_attribute(TIMESTAMP_ATTRIBUTE, bin.timestamp()?.to_rfc3339())?;

    write_headers(&mut root.add_group(HEADER_GROUP)?, bin.headers()?)?;
    write_adc(&mut root.add_group(ADC_GROUP)?, bin.adc()?, options)?;
    write_roi(&mut root.add_group(ROI_GROUP)?, bin)?;
    if options.archive {
        let files = bin.archived_files()?;
        write_archive(&mut root.add_group(ARCHIVE_GROUP)?, &files, options)?;
    }
    Ok(())
}

fn subgroup<'g>(group: &'g Group, name: &str) -> IfcbResult<Group<'g>> {
    group
        .group(name)
        .ok_or_else(|| IfcbError::Container(ContainerError::MissingGroup(name.to_string())))
}

fn read_bytes(group: &Group, name: &str) -> IfcbResult<Vec<u8>> {
    let variable = group
        .variable(name)
        .ok_or_else(|| ContainerError::MissingDataset(name.to_string()))?;
    Ok(variable.get_values::<u8, _>(netcdf::Extents::All)?)
}

fn read_archive(root: &Group, what: &str) -> IfcbResult<ArchivedFiles> {
    let archive = root
        .group(ARCHIVE_GROUP)
        .ok_or_else(|| IfcbError::MissingArchive(what.to_string()))?;
    Ok(ArchivedFiles {
        adc: read_bytes(&archive, ARCHIVED_ADC)?,
        hdr: read_bytes(&archive, ARCHIVED_HDR)?,
    })
}

fn sibling(prefix: &Path, extension: &str) -> PathBuf {
    let mut path = prefix.as_os_str().to_owned();
    path.push(".");
    path.push(extension);
    PathBuf::from(path)
}

/// Writes the raw trio of an archived bin to `<prefix>.adc`, `<prefix>.hdr`
/// and `<prefix>.roi`.
///
/// ADC and HDR are restored byte for byte. The ROI file is rebuilt from the
/// images in ascending object number order, framed by a null byte on each
/// side for schema 1.
pub fn reconstruct_raw_trio<P, Q>(path: P, group: Option<&str>, prefix: Q) -> IfcbResult<()>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let path = path.as_ref();
    let prefix = prefix.as_ref();
    if !path.is_file() {
        return Err(IfcbError::MissingFile(path.to_path_buf()));
    }
    let file = netcdf::open(path)
        .map_err(|e| IfcbError::InvalidContainer(format!("{}: {e}", path.display())))?;
    let root = open_group(&file, group)?;
    let what = match group {
        Some(group) => format!("{}:{group}", path.display()),
        None => path.display().to_string(),
    };
    let files = read_archive(&root, &what)?;

    let adc_group = subgroup(&root, ADC_GROUP)?;
    let schema = attribute::string(&attribute::required(&adc_group, SCHEMA_ATTRIBUTE)?)?;
    let framed = Schema::by_name(&schema)?.version() == 1;

    let roi_group = subgroup(&root, ROI_GROUP)?;
    let roi = ContainerRoi::read(&roi_group)?;
    let mut numbers = roi.object_numbers().to_vec();
    numbers.sort_unstable();

    fs::write(sibling(prefix, "adc"), &files.adc)?;
    fs::write(sibling(prefix, "hdr"), &files.hdr)?;

    let mut out = BufWriter::new(fs::File::create(sibling(prefix, "roi"))?);
    if framed {
        out.write_all(&[0])?;
    }
    for target_number in numbers {
        let image = roi.get_image(&roi_group, target_number)?;
        let pixels = image.iter().copied().collect::<Vec<u8>>();
        out.write_all(&pixels)?;
    }
    if framed {
        out.write_all(&[0])?;
    }
    out.flush()?;
    tracing::debug!("Reconstructed raw trio at {}", prefix.display());
    Ok(())
}

/// A bin read from a container group written by [`write_bin`].
pub struct HdfBin {
    path: PathBuf,
    group: Option<String>,
    handle: Handle<netcdf::File>,
    pid: OnceCell<Pid>,
    schema_version: OnceCell<u32>,
    headers: OnceCell<Headers>,
    adc: OnceCell<Adc>,
    roi: OnceCell<ContainerRoi>,
}

impl HdfBin {
    /// Nothing is read before [`Bin::open`].
    pub fn new<P: AsRef<Path>>(path: P, group: Option<&str>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            group: group.map(str::to_string),
            handle: Handle::default(),
            pid: OnceCell::new(),
            schema_version: OnceCell::new(),
            headers: OnceCell::new(),
            adc: OnceCell::new(),
            roi: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn root(&self) -> IfcbResult<Group<'_>> {
        let file = self.handle.get()?;
        Ok(open_group(file, self.group.as_deref())?)
    }

    fn child(&self, name: &str) -> IfcbResult<Group<'_>> {
        let file = self.handle.get()?;
        let path = match self.group.as_deref().map(|g| g.trim_matches('/')) {
            Some(group) if !group.is_empty() => format!("{group}/{name}"),
            _ => name.to_string(),
        };
        Ok(open_group(file, Some(path.as_str()))?)
    }

    fn roi(&self) -> IfcbResult<&ContainerRoi> {
        let group = self.child(ROI_GROUP)?;
        if let Some(roi) = self.roi.get() {
            return Ok(roi);
        }
        let roi = ContainerRoi::read(&group)?;
        Ok(self.roi.get_or_init(|| roi))
    }
}

impl Bin for HdfBin {
    fn pid(&self) -> IfcbResult<&Pid> {
        let root = self.root()?;
        if let Some(pid) = self.pid.get() {
            return Ok(pid);
        }
        let pid = attribute::string(&attribute::required(&root, PID_ATTRIBUTE)?)?;
        Ok(self.pid.get_or_init(|| Pid::deferred(pid)))
    }

    fn schema_version(&self) -> IfcbResult<u32> {
        let group = self.child(ADC_GROUP)?;
        if let Some(version) = self.schema_version.get() {
            return Ok(*version);
        }
        let name = attribute::string(&attribute::required(&group, SCHEMA_ATTRIBUTE)?)?;
        let version = Schema::by_name(&name)?.version();
        Ok(*self.schema_version.get_or_init(|| version))
    }

    fn headers(&self) -> IfcbResult<&Headers> {
        let group = self.child(HEADER_GROUP)?;
        if let Some(headers) = self.headers.get() {
            return Ok(headers);
        }
        let mut headers = Headers::new();
        for entry in group.attributes() {
            let value = ScalarValue::try_from(entry.value()?)?;
            headers.insert(entry.name().to_string(), value);
        }
        Ok(self.headers.get_or_init(|| headers))
    }

    fn adc(&self) -> IfcbResult<&Adc> {
        let group = self.child(ADC_GROUP)?;
        if let Some(adc) = self.adc.get() {
            return Ok(adc);
        }
        let adc = Adc::from_table(read_table(&group)?, self.schema_version()?)?;
        Ok(self.adc.get_or_init(|| adc))
    }

    fn image_numbers(&self) -> IfcbResult<Vec<i64>> {
        let mut numbers = self.roi()?.object_numbers().to_vec();
        numbers.sort_unstable();
        Ok(numbers)
    }

    fn get_image(&self, target_number: i64) -> IfcbResult<Image> {
        let group = self.child(ROI_GROUP)?;
        self.roi()?.get_image(&group, target_number)
    }

    fn archived_files(&self) -> IfcbResult<ArchivedFiles> {
        let root = self.root()?;
        read_archive(&root, &self.path.display().to_string())
    }

    fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    fn open(&mut self) -> IfcbResult<()> {
        let path = self.path.clone();
        let group = self.group.clone();
        tracing::debug!("Opening container bin {}", path.display());
        self.handle.open(|| {
            if !path.is_file() {
                return Err(IfcbError::MissingFile(path));
            }
            let file = netcdf::open(&path).map_err(|e| {
                IfcbError::InvalidContainer(format!("{}: {e}", path.display()))
            })?;
            {
                let root = open_group(&file, group.as_deref())?;
                attribute::expect_type_tag(&root, BIN_TYPE_TAG)?;
            }
            Ok(file)
        })
    }

    fn close(&mut self) -> IfcbResult<()> {
        self.handle.close()?;
        self.pid.take();
        self.schema_version.take();
        self.headers.take();
        self.adc.take();
        self.roi.take();
        tracing::debug!("Closed container bin {}", self.path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use tempfile::Builder;

    use super::*;

    #[test]
    fn test_adc_to_container() {
        let schema = Schema::for_version(2).unwrap();
        let adc = Adc::parse("1,0.5,,x\n2,1.5,3,\n".as_bytes(), schema).unwrap();
        let tmp = Builder::new().suffix(".nc").tempfile().unwrap();
        let options = WriteOptions::default().with_compression(Some(1));
        adc.to_container(tmp.path(), Some("adc"), &options).unwrap();

        let file = netcdf::open(tmp.path()).unwrap();
        let group = open_group(&file, Some("adc")).unwrap();
        let schema_name = attribute::string(&group.attribute(SCHEMA_ATTRIBUTE).unwrap()).unwrap();
        assert_eq!(schema_name, "v2");

        let back = Adc::from_table(read_table(&group).unwrap(), 2).unwrap();
        assert_eq!(back.column_names(), adc.column_names());
        assert_eq!(back.table().index_name(), Some("targetNumber"));
        for n in [1, 2] {
            assert_eq!(back.get_row(n).unwrap(), adc.get_row(n).unwrap());
        }
    }

    #[test]
    fn test_headers_round_trip() {
        let headers = Headers::from([
            ("a".to_string(), ScalarValue::Integer(1)),
            ("b".to_string(), ScalarValue::Float(2.5)),
            ("c".to_string(), ScalarValue::Text("three".to_string())),
        ]);
        let tmp = Builder::new().suffix(".nc").tempfile().unwrap();
        {
            let mut file = open_for_write(tmp.path(), true).unwrap();
            let mut group = require_group(&mut file, Some(HEADER_GROUP)).unwrap();
            write_headers(&mut group, &headers).unwrap();
        }
        let file = netcdf::open(tmp.path()).unwrap();
        let group = open_group(&file, Some(HEADER_GROUP)).unwrap();
        for (key, value) in &headers {
            let stored = attribute::scalar(&group.attribute(key).unwrap()).unwrap();
            assert_eq!(&stored, value);
        }
    }

    #[test]
    fn test_default_options_follow_config() {
        let options = WriteOptions::default();
        assert!(options.replace);
        assert_eq!(options.archive, ifcb_config::CONFIG.archive);
        assert_eq!(options.compression, ifcb_config::CONFIG.compression());
    }
}
