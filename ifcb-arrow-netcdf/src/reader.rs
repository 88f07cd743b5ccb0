use std::sync::Arc;

use arrow::{
    array::{
        Array, ArrayRef, Float32Array, Float64Array, Int16Array, Int32Array, Int64Array, Int8Array,
        StringArray, UInt16Array, UInt32Array, UInt64Array, UInt8Array,
    },
    datatypes::{Field, Schema},
};
use netcdf::{
    types::{FloatType, IntType, NcVariableType},
    Group, Variable,
};

use crate::{
    attribute,
    reference::{read_references, DatasetRef},
    table::batch_with_rows,
    ContainerError, ContainerResult, IndexedTable, COLUMNS_DATASET, INDEX_DATASET,
    NAMES_ATTRIBUTE, NAME_ATTRIBUTE, TABLE_TYPE_TAG, VALIDITY_ATTRIBUTE,
};

macro_rules! read_primitive_column {
    ($variable:expr, $validity:expr, $native:ty, $array_type:ty) => {{
        let values = $variable.get_values::<$native, _>(netcdf::Extents::All)?;
        let array = values
            .into_iter()
            .enumerate()
            .map(|(i, value)| is_valid($validity, i).then_some(value))
            .collect::<$array_type>();
        Arc::new(array) as ArrayRef
    }};
}

fn is_valid(validity: &Option<Vec<bool>>, i: usize) -> bool {
    validity
        .as_ref()
        .map_or(true, |mask| mask.get(i).copied().unwrap_or(false))
}

/// The null mask linked from `variable`, `None` when every value is valid.
fn read_validity(group: &Group, variable: &Variable) -> ContainerResult<Option<Vec<bool>>> {
    let Some(mask_name) = variable.attribute(VALIDITY_ATTRIBUTE) else {
        return Ok(None);
    };
    let mask = DatasetRef::to(attribute::string(&mask_name)?)
        .resolve(group)?
        .get_values::<u8, _>(netcdf::Extents::All)?;
    if mask.len() != variable.len() {
        return Err(ContainerError::LengthMismatch(format!(
            "validity of {} has {} values, column has {}",
            variable.name(),
            mask.len(),
            variable.len()
        )));
    }
    Ok(Some(mask.into_iter().map(|flag| flag != 0).collect()))
}

/// Reads a one dimensional dataset of `group` into an arrow array, applying
/// its validity mask if one is linked.
pub fn read_column(group: &Group, variable: &Variable) -> ContainerResult<ArrayRef> {
    let validity = &read_validity(group, variable)?;
    let array = match variable.vartype() {
        NcVariableType::Int(IntType::I8) => read_primitive_column!(variable, validity, i8, Int8Array),
        NcVariableType::Int(IntType::I16) => {
            read_primitive_column!(variable, validity, i16, Int16Array)
        }
        NcVariableType::Int(IntType::I32) => {
            read_primitive_column!(variable, validity, i32, Int32Array)
        }
        NcVariableType::Int(IntType::I64) => {
            read_primitive_column!(variable, validity, i64, Int64Array)
        }
        NcVariableType::Int(IntType::U8) => read_primitive_column!(variable, validity, u8, UInt8Array),
        NcVariableType::Int(IntType::U16) => {
            read_primitive_column!(variable, validity, u16, UInt16Array)
        }
        NcVariableType::Int(IntType::U32) => {
            read_primitive_column!(variable, validity, u32, UInt32Array)
        }
        NcVariableType::Int(IntType::U64) => {
            read_primitive_column!(variable, validity, u64, UInt64Array)
        }
        NcVariableType::Float(FloatType::F32) => {
            read_primitive_column!(variable, validity, f32, Float32Array)
        }
        NcVariableType::Float(FloatType::F64) => {
            read_primitive_column!(variable, validity, f64, Float64Array)
        }
        NcVariableType::String => {
            let values = (0..variable.len())
                .map(|i| -> ContainerResult<Option<String>> {
                    let value = variable.get_string(vec![i..i + 1])?;
                    Ok(is_valid(validity, i).then_some(value))
                })
                .collect::<ContainerResult<Vec<_>>>()?;
            Arc::new(StringArray::from(values)) as ArrayRef
        }
        nctype => return Err(ContainerError::UnsupportedVariableType(nctype)),
    };
    Ok(array)
}

/// Reads a table written by [`crate::writer::write_table`].
pub fn read_table(group: &Group) -> ContainerResult<IndexedTable> {
    attribute::expect_type_tag(group, TABLE_TYPE_TAG)?;

    let index = group
        .variable(INDEX_DATASET)
        .ok_or_else(|| ContainerError::MissingDataset(INDEX_DATASET.to_string()))?;
    let index_name = index
        .attribute(NAME_ATTRIBUTE)
        .map(|name| attribute::string(&name))
        .transpose()?;
    let index_values = index.get_values::<i64, _>(netcdf::Extents::All)?;

    let columns = group
        .variable(COLUMNS_DATASET)
        .ok_or_else(|| ContainerError::MissingDataset(COLUMNS_DATASET.to_string()))?;
    let references = read_references(&columns)?;
    // without a names attribute the columns are named by position
    let names = match columns.attribute(NAMES_ATTRIBUTE) {
        Some(names) => attribute::string_list(&names)?,
        None => (0..references.len()).map(|i| i.to_string()).collect(),
    };
    if names.len() != references.len() {
        return Err(ContainerError::LengthMismatch(format!(
            "{} column names for {} column references",
            names.len(),
            references.len()
        )));
    }

    let mut fields = Vec::with_capacity(names.len());
    let mut arrays = Vec::with_capacity(names.len());
    for (name, reference) in names.into_iter().zip(references) {
        let reference =
            reference.ok_or_else(|| ContainerError::UnresolvedReference(name.clone()))?;
        let array = read_column(group, &reference.resolve(group)?)?;
        if array.len() != index_values.len() {
            return Err(ContainerError::LengthMismatch(format!(
                "column {name} has {} values, index has {}",
                array.len(),
                index_values.len()
            )));
        }
        fields.push(Field::new(name, array.data_type().clone(), true));
        arrays.push(array);
    }

    let batch = batch_with_rows(Arc::new(Schema::new(fields)), arrays, index_values.len())?;
    IndexedTable::try_new(index_values, index_name, batch)
}

#[cfg(test)]
mod tests {
    use tempfile::Builder;

    use super::*;
    use crate::{
        group::{open_for_write, open_group, require_group},
        writer::{write_table, DatasetOptions},
    };

    fn round_trip(table: &IndexedTable, options: DatasetOptions) -> IndexedTable {
        let tmp = Builder::new().suffix(".nc").tempfile().unwrap();
        {
            let mut file = open_for_write(tmp.path(), true).unwrap();
            let mut group = require_group(&mut file, Some("table")).unwrap();
            write_table(&mut group, table, &options).unwrap();
        }
        let file = netcdf::open(tmp.path()).unwrap();
        let group = open_group(&file, Some("table")).unwrap();
        read_table(&group).unwrap()
    }

    /// Deterministic pseudo random values in -1..1.
    fn values(seed: u64, n: usize) -> Vec<f64> {
        let mut state = seed;
        (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (state >> 11) as f64 / (1u64 << 53) as f64 * 2.0 - 1.0
            })
            .collect()
    }

    #[test]
    fn test_table_round_trip() {
        let columns = (0..3)
            .map(|c| {
                (
                    c.to_string(),
                    Arc::new(Float64Array::from(values(c as u64, 5))) as ArrayRef,
                )
            })
            .collect();
        let mut table = IndexedTable::from_columns(vec![0, 1, 2, 3, 4], None, columns).unwrap();

        let check = |table: &IndexedTable| {
            let out = round_trip(table, DatasetOptions::default());
            assert_eq!(&out, table);
        };

        check(&table);

        table = table.with_index(vec![3, 0, 4, 1, 2]).unwrap();
        check(&table);

        table = table.with_column_names(&["col0", "col1", "col2"]).unwrap();
        check(&table);

        table = table
            .with_column("new_col", Arc::new(Int64Array::from_iter_values(0..5)))
            .unwrap();
        check(&table);

        table = table.with_index_name(Some("hello".to_string()));
        check(&table);
    }

    #[test]
    fn test_compressed_round_trip_with_nulls_and_strings() {
        let table = IndexedTable::from_columns(
            vec![1, 2, 3],
            Some("targetNumber".to_string()),
            vec![
                (
                    "width".to_string(),
                    Arc::new(Int32Array::from(vec![Some(10), None, Some(30)])) as ArrayRef,
                ),
                (
                    "label".to_string(),
                    Arc::new(StringArray::from(vec!["a", "bb", "ccc"])) as ArrayRef,
                ),
                (
                    "width".to_string(),
                    Arc::new(UInt8Array::from(vec![1, 2, 3])) as ArrayRef,
                ),
            ],
        )
        .unwrap();

        let out = round_trip(&table, DatasetOptions::compressed(4));
        assert_eq!(out, table);
        assert!(out.column(0).unwrap().is_null(1));
        assert_eq!(out.column_names(), vec!["width", "label", "width"]);
    }

    #[test]
    fn test_type_maximum_is_a_value() {
        let table = IndexedTable::from_columns(
            vec![0, 1],
            None,
            vec![
                (
                    "u8".to_string(),
                    Arc::new(UInt8Array::from(vec![1, 255])) as ArrayRef,
                ),
                (
                    "i32".to_string(),
                    Arc::new(Int32Array::from(vec![i32::MAX, -1])) as ArrayRef,
                ),
                (
                    "f64".to_string(),
                    Arc::new(Float64Array::from(vec![f64::MAX, 0.5])) as ArrayRef,
                ),
                (
                    "i64".to_string(),
                    Arc::new(Int64Array::from(vec![Some(i64::MAX), None])) as ArrayRef,
                ),
            ],
        )
        .unwrap();

        let out = round_trip(&table, DatasetOptions::default());
        assert_eq!(out, table);
        for column in 0..3 {
            assert_eq!(out.column(column).unwrap().null_count(), 0);
        }
        let last = out.column(3).unwrap();
        assert!(last.is_valid(0));
        assert!(last.is_null(1));
    }

    #[test]
    fn test_null_and_empty_strings() {
        let table = IndexedTable::from_columns(
            vec![0, 1, 2],
            None,
            vec![(
                "label".to_string(),
                Arc::new(StringArray::from(vec![Some("a"), None, Some("")])) as ArrayRef,
            )],
        )
        .unwrap();

        let out = round_trip(&table, DatasetOptions::compressed(2));
        assert_eq!(out, table);
        let labels = out.column(0).unwrap();
        assert!(labels.is_null(1));
        assert!(labels.is_valid(2));
    }

    #[test]
    fn test_empty_table() {
        let table = IndexedTable::from_columns(vec![], Some("targetNumber".to_string()), vec![])
            .unwrap();
        let out = round_trip(&table, DatasetOptions::compressed(4));
        assert_eq!(out, table);
        assert_eq!(out.num_rows(), 0);

        let table = IndexedTable::from_columns(
            vec![],
            None,
            vec![(
                "width".to_string(),
                Arc::new(Int64Array::from(Vec::<i64>::new())) as ArrayRef,
            )],
        )
        .unwrap();
        assert_eq!(round_trip(&table, DatasetOptions::default()), table);
    }

    #[test]
    fn test_missing_type_tag() {
        let tmp = Builder::new().suffix(".nc").tempfile().unwrap();
        {
            let mut file = open_for_write(tmp.path(), true).unwrap();
            require_group(&mut file, Some("table")).unwrap();
        }
        let file = netcdf::open(tmp.path()).unwrap();
        let group = open_group(&file, Some("table")).unwrap();
        assert!(matches!(
            read_table(&group),
            Err(ContainerError::TypeTagMismatch { found: None, .. })
        ));
    }
}
