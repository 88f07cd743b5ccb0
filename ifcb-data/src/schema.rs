use std::{collections::BTreeMap, sync::OnceLock};

use crate::{error::IfcbError, IfcbResult};

const V1_COLUMNS: &str = "trigger processingEndTime fluorescenceLow fluoresenceHigh scatteringLow scatteringHigh comparatorPulse triggerOpenTime frameGrabTime bottom left height width byteOffset valveStatus";
const V2_COLUMNS: &str = "trigger processingEndTime pmtA pmtB pmtC pmtD peakA peakB peakC peakD timeOfFlight grabTimeStart frameGrabTime bottom left height width byteOffset comparatorOut startPoint signalStrength valveStatus";

pub const HEIGHT_COLUMN: &str = "height";
pub const WIDTH_COLUMN: &str = "width";
pub const BYTE_OFFSET_COLUMN: &str = "byteOffset";

/// Ordered ADC column names of one schema version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    version: u32,
    columns: Vec<String>,
}

impl Schema {
    pub fn new<S: Into<String>>(version: u32, columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            version,
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    /// Looks up a registered schema.
    pub fn for_version(version: u32) -> IfcbResult<&'static Schema> {
        registry()
            .get(&version)
            .ok_or_else(|| IfcbError::UnknownSchema(version.to_string()))
    }

    /// Looks up a registered schema by its [`Schema::name`].
    pub fn by_name(name: &str) -> IfcbResult<&'static Schema> {
        name.strip_prefix('v')
            .and_then(|version| version.parse::<u32>().ok())
            .and_then(|version| registry().get(&version))
            .ok_or_else(|| IfcbError::UnknownSchema(name.to_string()))
    }

    pub fn version(&self) -> u32 {
        self.version
    }

    /// Name stored with ADC tables in containers, `v<version>`.
    pub fn name(&self) -> String {
        format!("v{}", self.version)
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Names for a table with `width` parsed columns.
    ///
    /// Surplus columns keep their position as name, missing ones are dropped
    /// from the end of the schema.
    pub fn reconcile(&self, width: usize) -> Vec<String> {
        (0..width)
            .map(|position| {
                self.columns
                    .get(position)
                    .cloned()
                    .unwrap_or_else(|| position.to_string())
            })
            .collect()
    }
}

static REGISTRY: OnceLock<BTreeMap<u32, Schema>> = OnceLock::new();

fn builtin() -> BTreeMap<u32, Schema> {
    BTreeMap::from([
        (1, Schema::new(1, V1_COLUMNS.split(' '))),
        (2, Schema::new(2, V2_COLUMNS.split(' '))),
    ])
}

fn registry() -> &'static BTreeMap<u32, Schema> {
    REGISTRY.get_or_init(builtin)
}

/// Adds schemas next to the built in ones. Only possible before the first
/// lookup, after that the registry is read only.
pub fn register_schemas(schemas: impl IntoIterator<Item = Schema>) -> IfcbResult<()> {
    let mut all = builtin();
    for schema in schemas {
        all.insert(schema.version, schema);
    }
    REGISTRY.set(all).map_err(|_| IfcbError::RegistryInitialized)
}

pub fn columns_for(version: u32) -> IfcbResult<&'static [String]> {
    Ok(Schema::for_version(version)?.columns())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_schemas() {
        let v1 = columns_for(1).unwrap();
        assert_eq!(v1.first().map(String::as_str), Some("trigger"));
        assert_eq!(v1.len(), 15);
        let v2 = columns_for(2).unwrap();
        assert_eq!(v2.len(), 22);
        assert!(v2.iter().any(|c| c == BYTE_OFFSET_COLUMN));
        assert!(matches!(columns_for(7), Err(IfcbError::UnknownSchema(_))));
    }

    #[test]
    fn test_by_name() {
        assert_eq!(Schema::by_name("v2").unwrap().version(), 2);
        assert_eq!(Schema::for_version(1).unwrap().name(), "v1");
        assert!(Schema::by_name("2").is_err());
    }

    #[test]
    fn test_register_after_use_fails() {
        columns_for(1).unwrap();
        assert!(matches!(
            register_schemas([Schema::new(3, ["a", "b"])]),
            Err(IfcbError::RegistryInitialized)
        ));
    }

    #[test]
    fn test_reconcile() {
        let schema = Schema::new(9, ["a", "b", "c"]);
        assert_eq!(schema.reconcile(3), vec!["a", "b", "c"]);
        assert_eq!(schema.reconcile(2), vec!["a", "b"]);
        assert_eq!(schema.reconcile(5), vec!["a", "b", "c", "3", "4"]);
        assert!(schema.reconcile(0).is_empty());
    }
}
