use std::fmt;

use netcdf::{Attribute, AttributeValue, Group};

use crate::{ContainerError, ContainerResult, TYPE_TAG_ATTRIBUTE};

/// A scalar attribute value as the container layer understands it.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Integers first, then finite floats, anything else stays text.
    pub fn infer(raw: &str) -> Self {
        let trimmed = raw.trim();
        if let Ok(value) = trimmed.parse::<i64>() {
            return ScalarValue::Integer(value);
        }
        match trimmed.parse::<f64>() {
            Ok(value) if value.is_finite() => ScalarValue::Float(value),
            _ => ScalarValue::Text(raw.to_string()),
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ScalarValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Integer(value) => Some(*value as f64),
            ScalarValue::Float(value) => Some(*value),
            ScalarValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ScalarValue::Text(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalarValue::Integer(value) => write!(f, "{value}"),
            ScalarValue::Float(value) => write!(f, "{value}"),
            ScalarValue::Text(value) => f.write_str(value),
        }
    }
}

impl From<ScalarValue> for AttributeValue {
    fn from(value: ScalarValue) -> Self {
        match value {
            ScalarValue::Integer(value) => AttributeValue::Longlong(value),
            ScalarValue::Float(value) => AttributeValue::Double(value),
            ScalarValue::Text(value) => AttributeValue::Str(value),
        }
    }
}

impl TryFrom<AttributeValue> for ScalarValue {
    type Error = ContainerError;

    fn try_from(value: AttributeValue) -> Result<Self, Self::Error> {
        match value {
            AttributeValue::Schar(v) => Ok(ScalarValue::Integer(v as i64)),
            AttributeValue::Uchar(v) => Ok(ScalarValue::Integer(v as i64)),
            AttributeValue::Short(v) => Ok(ScalarValue::Integer(v as i64)),
            AttributeValue::Ushort(v) => Ok(ScalarValue::Integer(v as i64)),
            AttributeValue::Int(v) => Ok(ScalarValue::Integer(v as i64)),
            AttributeValue::Uint(v) => Ok(ScalarValue::Integer(v as i64)),
            AttributeValue::Longlong(v) => Ok(ScalarValue::Integer(v)),
            AttributeValue::Float(v) => Ok(ScalarValue::Float(v as f64)),
            AttributeValue::Double(v) => Ok(ScalarValue::Float(v)),
            AttributeValue::Str(v) => Ok(ScalarValue::Text(v)),
            other => Err(ContainerError::UnsupportedAttributeValue(other)),
        }
    }
}

pub fn scalar(attribute: &Attribute) -> ContainerResult<ScalarValue> {
    ScalarValue::try_from(attribute.value()?)
}

pub fn string(attribute: &Attribute) -> ContainerResult<String> {
    match attribute.value()? {
        AttributeValue::Str(value) => Ok(value),
        other => Err(ContainerError::UnsupportedAttributeValue(other)),
    }
}

/// Single element arrays come back from the engine as scalars.
pub fn string_list(attribute: &Attribute) -> ContainerResult<Vec<String>> {
    match attribute.value()? {
        AttributeValue::Strs(values) => Ok(values),
        AttributeValue::Str(value) => Ok(vec![value]),
        other => Err(ContainerError::UnsupportedAttributeValue(other)),
    }
}

pub fn integer_list(attribute: &Attribute) -> ContainerResult<Vec<i64>> {
    match attribute.value()? {
        AttributeValue::Longlongs(values) => Ok(values),
        AttributeValue::Longlong(value) => Ok(vec![value]),
        AttributeValue::Ints(values) => Ok(values.into_iter().map(i64::from).collect()),
        AttributeValue::Int(value) => Ok(vec![value as i64]),
        AttributeValue::Uints(values) => Ok(values.into_iter().map(i64::from).collect()),
        AttributeValue::Uint(value) => Ok(vec![value as i64]),
        other => Err(ContainerError::UnsupportedAttributeValue(other)),
    }
}

pub fn required<'a>(group: &'a Group, name: &str) -> ContainerResult<Attribute<'a>> {
    group
        .attribute(name)
        .ok_or_else(|| ContainerError::MissingAttribute(name.to_string()))
}

pub fn type_tag(group: &Group) -> ContainerResult<Option<String>> {
    group
        .attribute(TYPE_TAG_ATTRIBUTE)
        .map(|attribute| string(&attribute))
        .transpose()
}

pub fn expect_type_tag(group: &Group, expected: &str) -> ContainerResult<()> {
    match type_tag(group)? {
        Some(found) if found == expected => Ok(()),
        found => Err(ContainerError::TypeTagMismatch {
            expected: expected.to_string(),
            found,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_scalar() {
        assert_eq!(ScalarValue::infer("42"), ScalarValue::Integer(42));
        assert_eq!(ScalarValue::infer(" -3 "), ScalarValue::Integer(-3));
        assert_eq!(ScalarValue::infer("0.25"), ScalarValue::Float(0.25));
        assert_eq!(
            ScalarValue::infer("NaN"),
            ScalarValue::Text("NaN".to_string())
        );
        assert_eq!(
            ScalarValue::infer("IFCB001"),
            ScalarValue::Text("IFCB001".to_string())
        );
    }

    #[test]
    fn test_attribute_value_conversion() {
        let value: AttributeValue = ScalarValue::Float(1.5).into();
        assert_eq!(ScalarValue::try_from(value).unwrap(), ScalarValue::Float(1.5));

        let value: AttributeValue = ScalarValue::Text("abc".to_string()).into();
        assert_eq!(
            ScalarValue::try_from(value).unwrap(),
            ScalarValue::Text("abc".to_string())
        );

        assert!(ScalarValue::try_from(AttributeValue::Doubles(vec![1.0, 2.0])).is_err());
    }
}
