use std::path::Path;

use netcdf::{File, FileMut, Group, GroupMut};

use crate::{ContainerError, ContainerResult};

fn normalize(group: Option<&str>) -> Option<&str> {
    group
        .map(|path| path.trim_matches('/'))
        .filter(|path| !path.is_empty())
}

/// Opens a container for writing.
///
/// With `replace` the file is truncated, which clears every group in it.
/// Otherwise an existing file is opened for appending, and a missing one is created.
pub fn open_for_write<P: AsRef<Path>>(path: P, replace: bool) -> ContainerResult<FileMut> {
    let path = path.as_ref();
    if replace || !path.exists() {
        tracing::debug!("Creating container {}", path.display());
        Ok(netcdf::create(path)?)
    } else {
        tracing::debug!("Appending to container {}", path.display());
        Ok(netcdf::append(path)?)
    }
}

/// Returns the group at `group` (a `/` separated path), creating missing groups on the way.
/// `None` and the empty path address the root group.
pub fn require_group<'f>(file: &'f mut FileMut, group: Option<&str>) -> ContainerResult<GroupMut<'f>> {
    let Some(path) = normalize(group) else {
        return file.root_mut().ok_or(ContainerError::NoRootGroup);
    };

    let mut prefix = String::with_capacity(path.len());
    for component in path.split('/') {
        if !prefix.is_empty() {
            prefix.push('/');
        }
        prefix.push_str(component);
        if file.group(&prefix)?.is_none() {
            file.add_group(&prefix)?;
        }
    }

    file.group_mut(path)?
        .ok_or_else(|| ContainerError::MissingGroup(path.to_string()))
}

pub fn open_group<'f>(file: &'f File, group: Option<&str>) -> ContainerResult<Group<'f>> {
    match normalize(group) {
        None => file.root().ok_or(ContainerError::NoRootGroup),
        Some(path) => file
            .group(path)?
            .ok_or_else(|| ContainerError::MissingGroup(path.to_string())),
    }
}

/// Names of the datasets and subgroups directly below `group`.
pub fn child_names(group: &Group) -> Vec<String> {
    group
        .variables()
        .map(|variable| variable.name())
        .chain(group.groups().map(|child| child.name()))
        .collect()
}

pub fn contains(group: &Group, name: &str) -> bool {
    group.variable(name).is_some() || group.group(name).is_some()
}
