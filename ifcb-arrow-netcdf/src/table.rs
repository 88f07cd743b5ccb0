use std::sync::Arc;

use arrow::{
    array::{ArrayRef, RecordBatch, RecordBatchOptions},
    datatypes::{Field, Schema, SchemaRef},
};

use crate::{ContainerError, ContainerResult};

/// A record batch with an explicit integer row index, optionally named.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexedTable {
    index: Vec<i64>,
    index_name: Option<String>,
    batch: RecordBatch,
}

impl IndexedTable {
    pub fn try_new(
        index: Vec<i64>,
        index_name: Option<String>,
        batch: RecordBatch,
    ) -> ContainerResult<Self> {
        if index.len() != batch.num_rows() {
            return Err(ContainerError::LengthMismatch(format!(
                "index has {} values, table has {} rows",
                index.len(),
                batch.num_rows()
            )));
        }
        Ok(Self {
            index,
            index_name,
            batch,
        })
    }

    /// Builds the batch from named columns. Column names may repeat.
    pub fn from_columns(
        index: Vec<i64>,
        index_name: Option<String>,
        columns: Vec<(String, ArrayRef)>,
    ) -> ContainerResult<Self> {
        let fields = columns
            .iter()
            .map(|(name, array)| Field::new(name, array.data_type().clone(), true))
            .collect::<Vec<_>>();
        let arrays = columns.into_iter().map(|(_, array)| array).collect();
        let batch = batch_with_rows(Arc::new(Schema::new(fields)), arrays, index.len())?;
        Self::try_new(index, index_name, batch)
    }

    pub fn index(&self) -> &[i64] {
        &self.index
    }

    pub fn index_name(&self) -> Option<&str> {
        self.index_name.as_deref()
    }

    pub fn batch(&self) -> &RecordBatch {
        &self.batch
    }

    pub fn schema(&self) -> SchemaRef {
        self.batch.schema()
    }

    pub fn num_rows(&self) -> usize {
        self.batch.num_rows()
    }

    pub fn num_columns(&self) -> usize {
        self.batch.num_columns()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.batch
            .schema()
            .fields()
            .iter()
            .map(|field| field.name().to_string())
            .collect()
    }

    pub fn column(&self, position: usize) -> Option<&ArrayRef> {
        (position < self.num_columns()).then(|| self.batch.column(position))
    }

    pub fn column_by_name(&self, name: &str) -> Option<&ArrayRef> {
        self.batch.column_by_name(name)
    }

    pub fn with_index(self, index: Vec<i64>) -> ContainerResult<Self> {
        Self::try_new(index, self.index_name, self.batch)
    }

    pub fn with_index_name(self, index_name: Option<String>) -> Self {
        Self { index_name, ..self }
    }

    pub fn with_column_names<S: AsRef<str>>(self, names: &[S]) -> ContainerResult<Self> {
        if names.len() != self.num_columns() {
            return Err(ContainerError::LengthMismatch(format!(
                "{} names for {} columns",
                names.len(),
                self.num_columns()
            )));
        }
        let schema = self.batch.schema();
        let fields = schema
            .fields()
            .iter()
            .zip(names)
            .map(|(field, name)| field.as_ref().clone().with_name(name.as_ref()))
            .collect::<Vec<_>>();
        let batch = batch_with_rows(
            Arc::new(Schema::new(fields)),
            self.batch.columns().to_vec(),
            self.index.len(),
        )?;
        Ok(Self { batch, ..self })
    }

    pub fn with_column(self, name: &str, array: ArrayRef) -> ContainerResult<Self> {
        let schema = self.batch.schema();
        let mut fields = schema
            .fields()
            .iter()
            .map(|field| field.as_ref().clone())
            .collect::<Vec<_>>();
        fields.push(Field::new(name, array.data_type().clone(), true));
        let mut arrays = self.batch.columns().to_vec();
        arrays.push(array);
        let batch = batch_with_rows(Arc::new(Schema::new(fields)), arrays, self.index.len())?;
        Ok(Self { batch, ..self })
    }
}

pub(crate) fn batch_with_rows(
    schema: SchemaRef,
    arrays: Vec<ArrayRef>,
    num_rows: usize,
) -> ContainerResult<RecordBatch> {
    let options = RecordBatchOptions::new().with_row_count(Some(num_rows));
    Ok(RecordBatch::try_new_with_options(schema, arrays, &options)?)
}

#[cfg(test)]
mod tests {
    use arrow::array::{Float64Array, Int64Array};

    use super::*;

    fn table() -> IndexedTable {
        IndexedTable::from_columns(
            vec![1, 2, 3],
            None,
            vec![
                ("a".to_string(), Arc::new(Float64Array::from(vec![0.5, 1.5, 2.5])) as ArrayRef),
                ("b".to_string(), Arc::new(Int64Array::from(vec![1, 2, 3])) as ArrayRef),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_index_length_checked() {
        assert!(matches!(
            table().with_index(vec![1, 2]),
            Err(ContainerError::LengthMismatch(_))
        ));
    }

    #[test]
    fn test_rename_columns() {
        let renamed = table().with_column_names(&["x", "y"]).unwrap();
        assert_eq!(renamed.column_names(), vec!["x", "y"]);
        assert!(table().with_column_names(&["x"]).is_err());
    }

    #[test]
    fn test_add_column() {
        let extended = table()
            .with_column("c", Arc::new(Int64Array::from(vec![7, 8, 9])))
            .unwrap();
        assert_eq!(extended.num_columns(), 3);
        assert_eq!(extended.column_names()[2], "c");
        assert!(table()
            .with_column("c", Arc::new(Int64Array::from(vec![7])))
            .is_err());
    }
}
