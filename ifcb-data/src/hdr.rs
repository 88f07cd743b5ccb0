use std::{io::BufRead, path::Path};

use ifcb_arrow_netcdf::attribute::ScalarValue;
use indexmap::IndexMap;

use crate::{error::IfcbError, IfcbResult};

/// Header key/value pairs in file order.
pub type Headers = IndexMap<String, ScalarValue>;

/// Parses `key: value` lines. Values are typed as integer, finite float or text.
pub fn parse<R: BufRead>(reader: R) -> IfcbResult<Headers> {
    let mut headers = Headers::new();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            tracing::warn!("Skipping header line {} without separator", number + 1);
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            tracing::warn!("Skipping header line {} with empty key", number + 1);
            continue;
        }
        headers.insert(key.to_string(), ScalarValue::infer(value.trim()));
    }
    Ok(headers)
}

pub fn read<P: AsRef<Path>>(path: P) -> IfcbResult<Headers> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(IfcbError::MissingFile(path.to_path_buf()));
    }
    parse(std::io::BufReader::new(std::fs::File::open(path)?))
}
