use std::{collections::HashMap, fmt, io::Read, path::Path, sync::Arc};

use arrow::{
    array::{Array, ArrayRef, AsArray, Float64Array, Int64Array, StringArray},
    datatypes::{
        DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
        UInt32Type, UInt64Type, UInt8Type,
    },
};
use ifcb_arrow_netcdf::IndexedTable;
use indexmap::IndexMap;

use crate::{
    error::IfcbError,
    hdf::{self, WriteOptions},
    schema::Schema,
    IfcbResult,
};

/// Name of the ADC row index, the 1-based object (target) number.
pub const TARGET_NUMBER: &str = "targetNumber";

/// One ADC cell.
#[derive(Debug, Clone, PartialEq)]
pub enum AdcValue {
    Int(i64),
    Float(f64),
    Text(String),
    Null,
}

impl AdcValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AdcValue::Int(value) => Some(*value),
            AdcValue::Float(value) if value.fract() == 0.0 => Some(*value as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AdcValue::Int(value) => Some(*value as f64),
            AdcValue::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AdcValue::Null)
    }

    /// Empty strings count as missing, containers store missing text that way.
    fn from_array(array: &ArrayRef, row: usize) -> Self {
        if array.is_null(row) {
            return AdcValue::Null;
        }
        macro_rules! int {
            ($t:ty) => {
                AdcValue::Int(array.as_primitive::<$t>().value(row) as i64)
            };
        }
        match array.data_type() {
            DataType::Int8 => int!(Int8Type),
            DataType::Int16 => int!(Int16Type),
            DataType::Int32 => int!(Int32Type),
            DataType::Int64 => int!(Int64Type),
            DataType::UInt8 => int!(UInt8Type),
            DataType::UInt16 => int!(UInt16Type),
            DataType::UInt32 => int!(UInt32Type),
            DataType::UInt64 => int!(UInt64Type),
            DataType::Float32 => AdcValue::Float(array.as_primitive::<Float32Type>().value(row) as f64),
            DataType::Float64 => AdcValue::Float(array.as_primitive::<Float64Type>().value(row)),
            DataType::Utf8 => match array.as_string::<i32>().value(row) {
                "" => AdcValue::Null,
                text => AdcValue::Text(text.to_string()),
            },
            _ => AdcValue::Null,
        }
    }
}

impl fmt::Display for AdcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdcValue::Int(value) => write!(f, "{value}"),
            AdcValue::Float(value) => write!(f, "{value}"),
            AdcValue::Text(value) => f.write_str(value),
            AdcValue::Null => Ok(()),
        }
    }
}

/// The ADC values of one object.
#[derive(Debug, Clone, PartialEq)]
pub struct AdcRow {
    pub target_number: i64,
    pub values: IndexMap<String, AdcValue>,
}

impl AdcRow {
    pub fn get(&self, column: &str) -> Option<&AdcValue> {
        self.values.get(column)
    }
}

/// A parsed ADC table, one row per object, indexed by object number.
#[derive(Debug, Clone)]
pub struct Adc {
    schema_version: u32,
    table: IndexedTable,
    positions: HashMap<i64, usize>,
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Inferred {
    Int,
    Float,
    Text,
}

fn infer(cells: &[Option<&str>]) -> Inferred {
    let present = || cells.iter().flatten();
    if present().all(|cell| cell.parse::<i64>().is_ok()) {
        Inferred::Int
    } else if present().all(|cell| cell.parse::<f64>().is_ok()) {
        Inferred::Float
    } else {
        Inferred::Text
    }
}

fn build_column(cells: &[Option<&str>]) -> ArrayRef {
    match infer(cells) {
        Inferred::Int => Arc::new(
            cells
                .iter()
                .map(|cell| cell.and_then(|c| c.parse::<i64>().ok()))
                .collect::<Int64Array>(),
        ),
        Inferred::Float => Arc::new(
            cells
                .iter()
                .map(|cell| cell.and_then(|c| c.parse::<f64>().ok()))
                .collect::<Float64Array>(),
        ),
        Inferred::Text => Arc::new(cells.iter().copied().collect::<StringArray>()),
    }
}

impl Adc {
    /// Parses comma separated ADC text. Rows may differ in length, short rows
    /// are padded with nulls.
    pub fn parse<R: Read>(reader: R, schema: &Schema) -> IfcbResult<Self> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for record in csv_reader.records() {
            records.push(record?);
        }

        let width = records.iter().map(|record| record.len()).max().unwrap_or(0);
        if width != schema.columns().len() && !records.is_empty() {
            tracing::warn!(
                "ADC has {} columns, schema {} names {}",
                width,
                schema.name(),
                schema.columns().len()
            );
        }

        let columns = schema
            .reconcile(width)
            .into_iter()
            .enumerate()
            .map(|(position, name)| {
                let cells = records
                    .iter()
                    .map(|record| record.get(position).map(str::trim).filter(|c| !c.is_empty()))
                    .collect::<Vec<_>>();
                (name, build_column(&cells))
            })
            .collect::<Vec<_>>();

        let index = (1..=records.len() as i64).collect();
        let table = IndexedTable::from_columns(index, Some(TARGET_NUMBER.to_string()), columns)?;
        tracing::debug!("Parsed ADC with {} rows and {} columns", table.num_rows(), width);
        Self::from_table(table, schema.version())
    }

    pub fn read<P: AsRef<Path>>(path: P, schema: &Schema) -> IfcbResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(IfcbError::MissingFile(path.to_path_buf()));
        }
        let file = std::fs::File::open(path)?;
        Self::parse(std::io::BufReader::new(file), schema)
    }

    /// Wraps an already materialized table, e.g. one read back from a container.
    pub fn from_table(table: IndexedTable, schema_version: u32) -> IfcbResult<Self> {
        let mut positions = HashMap::with_capacity(table.num_rows());
        for (position, target_number) in table.index().iter().enumerate() {
            if positions.insert(*target_number, position).is_some() {
                return Err(IfcbError::Parse(format!(
                    "duplicate object number {target_number}"
                )));
            }
        }
        Ok(Self {
            schema_version,
            table,
            positions,
        })
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn table(&self) -> &IndexedTable {
        &self.table
    }

    pub fn column_names(&self) -> Vec<String> {
        self.table.column_names()
    }

    pub fn row_count(&self) -> usize {
        self.table.num_rows()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    /// Object numbers in table order.
    pub fn object_numbers(&self) -> &[i64] {
        self.table.index()
    }

    pub fn contains(&self, target_number: i64) -> bool {
        self.positions.contains_key(&target_number)
    }

    pub fn get_row(&self, target_number: i64) -> IfcbResult<AdcRow> {
        let position = *self
            .positions
            .get(&target_number)
            .ok_or(IfcbError::ObjectNotFound(target_number))?;
        Ok(self.row_at(position))
    }

    /// A single value, `None` if the column does not exist.
    pub fn value(&self, target_number: i64, column: &str) -> IfcbResult<Option<AdcValue>> {
        let position = *self
            .positions
            .get(&target_number)
            .ok_or(IfcbError::ObjectNotFound(target_number))?;
        Ok(self
            .table
            .column_by_name(column)
            .map(|array| AdcValue::from_array(array, position)))
    }

    pub fn rows(&self) -> impl Iterator<Item = AdcRow> + '_ {
        (0..self.row_count()).map(|position| self.row_at(position))
    }

    fn row_at(&self, position: usize) -> AdcRow {
        let values = self
            .table
            .column_names()
            .into_iter()
            .zip(self.table.batch().columns())
            .map(|(name, array)| (name, AdcValue::from_array(array, position)))
            .collect();
        AdcRow {
            target_number: self.table.index()[position],
            values,
        }
    }

    /// Writes the table into `group` of the container at `path`.
    pub fn to_container<P: AsRef<Path>>(
        &self,
        path: P,
        group: Option<&str>,
        options: &WriteOptions,
    ) -> IfcbResult<()> {
        let mut file = ifcb_arrow_netcdf::group::open_for_write(path, options.replace)?;
        let mut target = ifcb_arrow_netcdf::group::require_group(&mut file, group)?;
        hdf::write_adc(&mut target, self, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADC_V2: &str = "\
1,0.5,0.1,0.2,0.3,0.4,1,2,3,4,10,0.01,0.02,5,6,20,30,0,0,0,0,0
2,0.6,0.1,0.2,0.3,0.4,1,2,3,4,10,0.01,0.02,5,6,0,0,600,0,0,0,0
3,0.7,0.1,0.2,0.3,0.4,1,2,3,4,10,0.01,0.02,5,6,10,10,600,0,0,0,0
";

    fn v2() -> &'static Schema {
        Schema::for_version(2).unwrap()
    }

    #[test]
    fn test_parse() {
        let adc = Adc::parse(ADC_V2.as_bytes(), v2()).unwrap();
        assert_eq!(adc.row_count(), 3);
        assert_eq!(adc.object_numbers(), &[1, 2, 3]);
        assert_eq!(adc.column_names(), v2().columns());

        let row = adc.get_row(1).unwrap();
        assert_eq!(row.target_number, 1);
        assert_eq!(row.get("trigger"), Some(&AdcValue::Int(1)));
        assert_eq!(row.get("processingEndTime"), Some(&AdcValue::Float(0.5)));
        assert_eq!(row.get("height"), Some(&AdcValue::Int(20)));
        assert_eq!(adc.get_row(1).unwrap(), row);
    }

    #[test]
    fn test_missing_row() {
        let adc = Adc::parse(ADC_V2.as_bytes(), v2()).unwrap();
        for n in [0, 4, -1] {
            let err = adc.get_row(n).unwrap_err();
            assert!(err.is_key_error());
        }
    }

    #[test]
    fn test_wider_source_keeps_positional_names() {
        let schema = Schema::new(42, ["a", "b"]);
        let adc = Adc::parse("1,2,3,4\n5,6,7,8\n".as_bytes(), &schema).unwrap();
        assert_eq!(adc.column_names(), vec!["a", "b", "2", "3"]);
        assert_eq!(adc.get_row(2).unwrap().get("3"), Some(&AdcValue::Int(8)));
    }

    #[test]
    fn test_narrower_source_takes_schema_prefix() {
        let schema = Schema::new(42, ["a", "b", "c", "d"]);
        let adc = Adc::parse("1,2\n3,4\n".as_bytes(), &schema).unwrap();
        assert_eq!(adc.column_names(), vec!["a", "b"]);
    }

    #[test]
    fn test_ragged_rows() {
        let schema = Schema::new(42, ["a", "b", "c"]);
        let adc = Adc::parse("1,2,3\n4,5\n6,,x\n".as_bytes(), &schema).unwrap();
        assert_eq!(adc.row_count(), 3);
        let row = adc.get_row(2).unwrap();
        assert_eq!(row.get("c"), Some(&AdcValue::Null));
        let row = adc.get_row(3).unwrap();
        assert_eq!(row.get("b"), Some(&AdcValue::Null));
        assert_eq!(row.get("c"), Some(&AdcValue::Text("x".to_string())));
    }

    #[test]
    fn test_unreadable_encoding() {
        let bytes: &[u8] = &[b'1', b',', 0xff, 0xfe, b'\n'];
        assert!(Adc::parse(bytes, v2()).is_err());
    }

    #[test]
    fn test_rows_in_order() {
        let adc = Adc::parse(ADC_V2.as_bytes(), v2()).unwrap();
        let numbers = adc.rows().map(|row| row.target_number).collect::<Vec<_>>();
        assert_eq!(numbers, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty() {
        let adc = Adc::parse("".as_bytes(), v2()).unwrap();
        assert!(adc.is_empty());
        assert!(adc.column_names().is_empty());
    }
}
