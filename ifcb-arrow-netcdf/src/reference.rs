use std::fmt;

use netcdf::{Group, GroupMut, Variable};

use crate::{ContainerError, ContainerResult};

/// Indirect reference to a dataset living in the same group as the reference table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatasetRef(String);

impl DatasetRef {
    pub fn to(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn resolve<'g>(&self, group: &'g Group) -> ContainerResult<Variable<'g>> {
        group
            .variable(&self.0)
            .ok_or_else(|| ContainerError::UnresolvedReference(self.0.clone()))
    }
}

impl fmt::Display for DatasetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn reference_dim(name: &str) -> String {
    format!("n_{name}")
}

/// Writes a one dimensional reference table named `name`.
/// `None` slots are stored as the null reference.
pub fn write_references(
    group: &mut GroupMut,
    name: &str,
    references: &[Option<DatasetRef>],
) -> ContainerResult<()> {
    let dim = reference_dim(name);
    group.add_dimension(&dim, references.len())?;
    let mut variable = group.add_string_variable(name, &[dim.as_str()])?;
    for (i, reference) in references.iter().enumerate() {
        let value = reference.as_ref().map(DatasetRef::name).unwrap_or("");
        variable.put_string(value, vec![i..i + 1])?;
    }
    Ok(())
}

pub fn read_references(variable: &Variable) -> ContainerResult<Vec<Option<DatasetRef>>> {
    (0..variable.len())
        .map(|i| {
            let name = variable.get_string(vec![i..i + 1])?;
            Ok((!name.is_empty()).then(|| DatasetRef(name)))
        })
        .collect()
}

pub fn read_reference_table(group: &Group, name: &str) -> ContainerResult<Vec<Option<DatasetRef>>> {
    let variable = group
        .variable(name)
        .ok_or_else(|| ContainerError::MissingDataset(name.to_string()))?;
    read_references(&variable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::group::{open_for_write, open_group, require_group};
    use tempfile::Builder;

    #[test]
    fn test_sparse_reference_table() {
        let tmp = Builder::new().suffix(".nc").tempfile().unwrap();
        {
            let mut file = open_for_write(tmp.path(), true).unwrap();
            let mut group = require_group(&mut file, Some("refs")).unwrap();
            group.add_dimension("n", 3).unwrap();
            group
                .add_variable::<u8>("2", &["n"])
                .unwrap()
                .put_values(&[1u8, 2, 3], netcdf::Extents::All)
                .unwrap();
            write_references(&mut group, "images", &[None, None, Some(DatasetRef::to("2"))])
                .unwrap();
        }

        let file = netcdf::open(tmp.path()).unwrap();
        let group = open_group(&file, Some("refs")).unwrap();
        let references = read_reference_table(&group, "images").unwrap();
        assert_eq!(references, vec![None, None, Some(DatasetRef::to("2"))]);

        let target = references[2].as_ref().unwrap().resolve(&group).unwrap();
        let values = target.get_values::<u8, _>(netcdf::Extents::All).unwrap();
        assert_eq!(values, vec![1, 2, 3]);

        assert!(matches!(
            DatasetRef::to("missing").resolve(&group),
            Err(ContainerError::UnresolvedReference(_))
        ));
    }
}
