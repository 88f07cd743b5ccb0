use arrow::{
    array::{Array, ArrayRef, AsArray},
    datatypes::{
        DataType, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type, Int8Type, UInt16Type,
        UInt32Type, UInt64Type, UInt8Type,
    },
};
use netcdf::{AttributeValue, GroupMut};

use crate::{
    reference::{write_references, DatasetRef},
    ContainerError, ContainerResult, IndexedTable, COLUMNS_DATASET, INDEX_DATASET,
    NAMES_ATTRIBUTE, NAME_ATTRIBUTE, ROW_DIM, TABLE_TYPE_TAG, TYPE_TAG_ATTRIBUTE,
    VALIDITY_ATTRIBUTE,
};

/// Per dataset storage options handed to the container engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DatasetOptions {
    /// Deflate level, `None` stores the dataset uncompressed.
    pub compression: Option<i32>,
}

impl DatasetOptions {
    pub fn compressed(level: i32) -> Self {
        Self {
            compression: Some(level),
        }
    }
}

/// Null slots hold the type's maximum, registered as fill value only when
/// the column has nulls. Validity itself is kept in a separate mask.
macro_rules! write_primitive_column {
    ($group:expr, $name:expr, $array:expr, $arrow_type:ty, $native:ty, $options:expr) => {{
        let array = $array.as_primitive::<$arrow_type>();
        let fill_value = <$native>::MAX;
        let values = array
            .iter()
            .map(|value| value.unwrap_or(fill_value))
            .collect::<Vec<$native>>();
        let mut variable = $group.add_variable::<$native>($name, &[ROW_DIM])?;
        if array.null_count() > 0 {
            variable.set_fill_value(fill_value)?;
        }
        if let Some(level) = $options.compression {
            variable.set_compression(level, true)?;
        }
        if !values.is_empty() {
            variable.put_values::<$native, _>(&values, netcdf::Extents::All)?;
        }
    }};
}

fn validity_name(name: &str) -> String {
    format!("{name}_validity")
}

/// Writes the null mask of `array` (1 valid, 0 null) next to column `name`
/// and links it through the column's validity attribute.
fn write_validity(
    group: &mut GroupMut,
    name: &str,
    array: &ArrayRef,
    options: &DatasetOptions,
) -> ContainerResult<()> {
    let mask = (0..array.len())
        .map(|i| u8::from(array.is_valid(i)))
        .collect::<Vec<u8>>();
    let mask_name = validity_name(name);
    let mut variable = group.add_variable::<u8>(&mask_name, &[ROW_DIM])?;
    if let Some(level) = options.compression {
        variable.set_compression(level, true)?;
    }
    variable.put_values::<u8, _>(&mask, netcdf::Extents::All)?;

    let mut column = group
        .variable_mut(name)
        .ok_or_else(|| ContainerError::MissingDataset(name.to_string()))?;
    column.put_attribute(VALIDITY_ATTRIBUTE, mask_name)?;
    Ok(())
}

/// Writes `array` as dataset `name` along the row dimension. Columns with
/// nulls also get a validity mask.
pub fn write_column(
    group: &mut GroupMut,
    name: &str,
    array: &ArrayRef,
    options: &DatasetOptions,
) -> ContainerResult<()> {
    match array.data_type() {
        DataType::Int8 => write_primitive_column!(group, name, array, Int8Type, i8, options),
        DataType::Int16 => write_primitive_column!(group, name, array, Int16Type, i16, options),
        DataType::Int32 => write_primitive_column!(group, name, array, Int32Type, i32, options),
        DataType::Int64 => write_primitive_column!(group, name, array, Int64Type, i64, options),
        DataType::UInt8 => write_primitive_column!(group, name, array, UInt8Type, u8, options),
        DataType::UInt16 => write_primitive_column!(group, name, array, UInt16Type, u16, options),
        DataType::UInt32 => write_primitive_column!(group, name, array, UInt32Type, u32, options),
        DataType::UInt64 => write_primitive_column!(group, name, array, UInt64Type, u64, options),
        DataType::Float32 => {
            write_primitive_column!(group, name, array, Float32Type, f32, options)
        }
        DataType::Float64 => {
            write_primitive_column!(group, name, array, Float64Type, f64, options)
        }
        DataType::Utf8 => {
            // variable length strings cannot be filtered, so no compression here
            let array = array.as_string::<i32>();
            let mut variable = group.add_string_variable(name, &[ROW_DIM])?;
            for i in 0..array.len() {
                let value = if array.is_null(i) { "" } else { array.value(i) };
                variable.put_string(value, vec![i..i + 1])?;
            }
        }
        dtype => return Err(ContainerError::UnsupportedDataType(dtype.clone())),
    }
    if array.null_count() > 0 {
        write_validity(group, name, array, options)?;
    }
    Ok(())
}

/// Writes `table` into `group` using the generic table layout.
///
/// The group must not already contain any of the table's datasets.
pub fn write_table(
    group: &mut GroupMut,
    table: &IndexedTable,
    options: &DatasetOptions,
) -> ContainerResult<()> {
    tracing::debug!(
        "Writing table with {} rows and {} columns",
        table.num_rows(),
        table.num_columns()
    );
    group.add_attribute(TYPE_TAG_ATTRIBUTE, TABLE_TYPE_TAG)?;
    group.add_dimension(ROW_DIM, table.num_rows())?;

    let mut references = Vec::with_capacity(table.num_columns());
    for (position, array) in table.batch().columns().iter().enumerate() {
        let name = position.to_string();
        write_column(group, &name, array, options)?;
        references.push(Some(DatasetRef::to(name)));
    }

    write_references(group, COLUMNS_DATASET, &references)?;
    // without columns the names attribute is left out, readers fall back to positions
    if table.num_columns() > 0 {
        if let Some(mut columns) = group.variable_mut(COLUMNS_DATASET) {
            columns.put_attribute(
                NAMES_ATTRIBUTE,
                AttributeValue::Strs(table.column_names()),
            )?;
        }
    }

    let mut index = group.add_variable::<i64>(INDEX_DATASET, &[ROW_DIM])?;
    if let Some(level) = options.compression {
        index.set_compression(level, true)?;
    }
    if !table.index().is_empty() {
        index.put_values::<i64, _>(table.index(), netcdf::Extents::All)?;
    }
    if let Some(name) = table.index_name() {
        index.put_attribute(NAME_ATTRIBUTE, name)?;
    }

    Ok(())
}
