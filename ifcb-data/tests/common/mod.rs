#![allow(dead_code)]

use std::path::{Path, PathBuf};

use ifcb_data::{Bin, Image, Schema};
use ndarray::Array2;

pub const V1_PID: &str = "IFCB1_2000_001_123456";
pub const V2_PID: &str = "D20000101T123456_IFCB001";

/// (height, width) per object, zero sides have no image.
pub const SIZES: [(usize, usize); 6] = [(3, 4), (0, 0), (2, 2), (5, 0), (1, 6), (0, 3)];

pub const HDR: &str = "softwareVersion: Imaging FlowCytobot Acquire 2.0\r\n\
                       runTime: 1200.5\r\n\
                       binarizeThreshold: 20\r\n\
                       triggerSelection: 1\r\n";

/// A synthetic raw trio on disk.
pub struct Trio {
    pub base: PathBuf,
    pub adc: Vec<u8>,
    pub hdr: Vec<u8>,
    pub roi: Vec<u8>,
    pub images: Vec<(i64, Image)>,
    pub column_count: usize,
}

impl Trio {
    pub fn path(&self, extension: &str) -> PathBuf {
        let mut path = self.base.clone().into_os_string();
        path.push(".");
        path.push(extension);
        PathBuf::from(path)
    }
}

pub struct TrioBuilder {
    pid: String,
    schema_version: u32,
    sizes: Vec<(usize, usize)>,
    extra_columns: usize,
    hdr: String,
}

impl TrioBuilder {
    pub fn v1() -> Self {
        Self::new(V1_PID, 1)
    }

    pub fn v2() -> Self {
        Self::new(V2_PID, 2)
    }

    fn new(pid: &str, schema_version: u32) -> Self {
        Self {
            pid: pid.to_string(),
            schema_version,
            sizes: SIZES.to_vec(),
            extra_columns: 0,
            hdr: HDR.to_string(),
        }
    }

    /// (height, width) per object, one ADC row each.
    pub fn sizes(mut self, sizes: &[(usize, usize)]) -> Self {
        self.sizes = sizes.to_vec();
        self
    }

    pub fn hdr(mut self, hdr: &str) -> Self {
        self.hdr = hdr.to_string();
        self
    }

    pub fn extra_columns(mut self, extra_columns: usize) -> Self {
        self.extra_columns = extra_columns;
        self
    }

    pub fn write(&self, dir: &Path) -> Trio {
        // a subscriber may already be installed by another test
        let _ = ifcb_logger::init();
        let schema = Schema::for_version(self.schema_version).expect("builtin schema");
        let columns = schema.columns();
        let position = |name: &str| {
            columns
                .iter()
                .position(|column| column == name)
                .expect("geometry column")
        };
        let (height_at, width_at, offset_at) =
            (position("height"), position("width"), position("byteOffset"));

        // schema 1 roi files start with a null byte
        let framed = self.schema_version == 1;
        let mut roi = if framed { vec![0u8] } else { vec![] };
        let mut lines = vec![];
        let mut images = vec![];

        for (i, &(height, width)) in self.sizes.iter().enumerate() {
            let target_number = i as i64 + 1;
            let offset = roi.len();
            let pixels = (0..height * width)
                .map(|k| ((target_number as usize * 31 + k * 7) % 251) as u8)
                .collect::<Vec<u8>>();
            roi.extend_from_slice(&pixels);
            if height > 0 && width > 0 {
                let image = Array2::from_shape_vec((height, width), pixels).expect("shape");
                images.push((target_number, image));
            }

            let mut cells = (0..columns.len() + self.extra_columns)
                .map(|c| ((target_number as usize * (c + 3)) % 97).to_string())
                .collect::<Vec<_>>();
            cells[1] = format!("{:.3}", target_number as f64 * 0.25);
            cells[height_at] = height.to_string();
            cells[width_at] = width.to_string();
            cells[offset_at] = offset.to_string();
            lines.push(cells.join(","));
        }
        if framed {
            roi.push(0);
        }

        let adc = if lines.is_empty() {
            Vec::new()
        } else {
            format!("{}\r\n", lines.join("\r\n")).into_bytes()
        };
        let hdr = self.hdr.as_bytes().to_vec();
        let base = dir.join(&self.pid);
        let trio = Trio {
            base,
            adc,
            hdr,
            roi,
            images,
            column_count: columns.len() + self.extra_columns,
        };
        std::fs::write(trio.path("adc"), &trio.adc).expect("write adc");
        std::fs::write(trio.path("hdr"), &trio.hdr).expect("write hdr");
        std::fs::write(trio.path("roi"), &trio.roi).expect("write roi");
        trio
    }
}

/// Compares everything the bin interface exposes.
pub fn assert_bins_equal(a: &dyn Bin, b: &dyn Bin) {
    assert_eq!(a.pid().expect("pid"), b.pid().expect("pid"));
    assert_eq!(a.lid().expect("lid"), b.lid().expect("lid"));
    assert_eq!(
        a.schema_version().expect("schema"),
        b.schema_version().expect("schema")
    );
    assert_eq!(a.headers().expect("headers"), b.headers().expect("headers"));

    let numbers = a.object_numbers().expect("object numbers").collect::<Vec<_>>();
    assert_eq!(
        numbers,
        b.object_numbers().expect("object numbers").collect::<Vec<_>>()
    );
    for &n in &numbers {
        assert_eq!(a.get_row(n).expect("row"), b.get_row(n).expect("row"));
    }

    let images = a.image_numbers().expect("image numbers");
    assert_eq!(images, b.image_numbers().expect("image numbers"));
    for &n in &images {
        assert_eq!(a.get_image(n).expect("image"), b.get_image(n).expect("image"));
    }
}
