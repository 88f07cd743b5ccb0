use std::{
    cell::OnceCell,
    ffi::OsString,
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use crate::{
    adc::Adc,
    bins::{ArchivedFiles, Bin, Handle},
    error::IfcbError,
    hdr::{self, Headers},
    identifiers::Pid,
    roi::{Image, RoiIndex},
    schema::Schema,
    IfcbResult,
};

pub const ADC_EXTENSION: &str = "adc";
pub const HDR_EXTENSION: &str = "hdr";
pub const ROI_EXTENSION: &str = "roi";

struct Fileset {
    adc: File,
    hdr: File,
    roi: File,
}

fn rewind(file: &File) -> IfcbResult<&File> {
    let mut reader = file;
    reader.seek(SeekFrom::Start(0))?;
    Ok(file)
}

fn read_all(file: &File) -> IfcbResult<Vec<u8>> {
    let mut bytes = Vec::new();
    let mut reader = rewind(file)?;
    reader.read_to_end(&mut bytes)?;
    Ok(bytes)
}

/// A bin stored as its three instrument files, `<base>.adc`, `<base>.hdr`
/// and `<base>.roi`.
pub struct RawBin {
    base: PathBuf,
    pid: Pid,
    handle: Handle<Fileset>,
    headers: OnceCell<Headers>,
    adc: OnceCell<Adc>,
    roi: OnceCell<RoiIndex>,
}

impl RawBin {
    /// `path` is any of the three files or the base path without extension.
    /// Nothing is read before [`Bin::open`].
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        let is_member = path
            .extension()
            .and_then(|extension| extension.to_str())
            .is_some_and(|extension| {
                [ADC_EXTENSION, HDR_EXTENSION, ROI_EXTENSION].contains(&extension)
            });
        let base = if is_member {
            path.with_extension("")
        } else {
            path.to_path_buf()
        };
        let name = base
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            base,
            pid: Pid::deferred(name),
            handle: Handle::default(),
            headers: OnceCell::new(),
            adc: OnceCell::new(),
            roi: OnceCell::new(),
        }
    }

    fn sibling(&self, extension: &str) -> PathBuf {
        let mut path = OsString::from(self.base.as_os_str());
        path.push(".");
        path.push(extension);
        PathBuf::from(path)
    }

    pub fn adc_path(&self) -> PathBuf {
        self.sibling(ADC_EXTENSION)
    }

    pub fn hdr_path(&self) -> PathBuf {
        self.sibling(HDR_EXTENSION)
    }

    pub fn roi_path(&self) -> PathBuf {
        self.sibling(ROI_EXTENSION)
    }

    fn roi_index(&self) -> IfcbResult<&RoiIndex> {
        if let Some(index) = self.roi.get() {
            return Ok(index);
        }
        let index = RoiIndex::from_adc(self.adc()?)?;
        Ok(self.roi.get_or_init(|| index))
    }
}

fn open_member(path: PathBuf) -> IfcbResult<File> {
    if !path.is_file() {
        return Err(IfcbError::MissingFile(path));
    }
    Ok(File::open(path)?)
}

impl Bin for RawBin {
    fn pid(&self) -> IfcbResult<&Pid> {
        self.handle.get()?;
        Ok(&self.pid)
    }

    fn schema_version(&self) -> IfcbResult<u32> {
        self.handle.get()?;
        self.pid.schema_version()
    }

    fn headers(&self) -> IfcbResult<&Headers> {
        let files = self.handle.get()?;
        if let Some(headers) = self.headers.get() {
            return Ok(headers);
        }
        let headers = hdr::parse(BufReader::new(rewind(&files.hdr)?))?;
        Ok(self.headers.get_or_init(|| headers))
    }

    fn adc(&self) -> IfcbResult<&Adc> {
        let files = self.handle.get()?;
        if let Some(adc) = self.adc.get() {
            return Ok(adc);
        }
        let schema = Schema::for_version(self.schema_version()?)?;
        let adc = Adc::parse(BufReader::new(rewind(&files.adc)?), schema)?;
        Ok(self.adc.get_or_init(|| adc))
    }

    fn image_numbers(&self) -> IfcbResult<Vec<i64>> {
        Ok(self.roi_index()?.object_numbers())
    }

    fn get_image(&self, target_number: i64) -> IfcbResult<Image> {
        let files = self.handle.get()?;
        let mut source = &files.roi;
        self.roi_index()?.read_image(&mut source, target_number)
    }

    fn archived_files(&self) -> IfcbResult<ArchivedFiles> {
        let files = self.handle.get()?;
        Ok(ArchivedFiles {
            adc: read_all(&files.adc)?,
            hdr: read_all(&files.hdr)?,
        })
    }

    fn is_open(&self) -> bool {
        self.handle.is_open()
    }

    fn open(&mut self) -> IfcbResult<()> {
        let (adc, hdr, roi) = (self.adc_path(), self.hdr_path(), self.roi_path());
        tracing::debug!("Opening raw bin {}", self.base.display());
        self.handle.open(|| {
            Ok(Fileset {
                adc: open_member(adc)?,
                hdr: open_member(hdr)?,
                roi: open_member(roi)?,
            })
        })
    }

    fn close(&mut self) -> IfcbResult<()> {
        self.handle.close()?;
        self.headers.take();
        self.adc.take();
        self.roi.take();
        tracing::debug!("Closed raw bin {}", self.base.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_member_paths() {
        for path in [
            "/data/D20000101T123456_IFCB001",
            "/data/D20000101T123456_IFCB001.adc",
            "/data/D20000101T123456_IFCB001.roi",
        ] {
            let bin = RawBin::new(path);
            assert_eq!(bin.adc_path(), Path::new("/data/D20000101T123456_IFCB001.adc"));
            assert_eq!(bin.hdr_path(), Path::new("/data/D20000101T123456_IFCB001.hdr"));
            assert_eq!(bin.pid, "D20000101T123456_IFCB001");
        }
    }

    #[test]
    fn test_missing_files() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("IFCB1_2000_001_123456");
        std::fs::write(base.with_extension("adc"), b"").unwrap();
        std::fs::write(base.with_extension("hdr"), b"").unwrap();

        let mut bin = RawBin::new(&base);
        assert!(matches!(bin.open(), Err(IfcbError::MissingFile(p)) if p.ends_with("IFCB1_2000_001_123456.roi")));
        assert!(!bin.is_open());
        assert!(matches!(bin.pid(), Err(IfcbError::NotOpened)));
    }
}
