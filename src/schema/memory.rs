use crate::error::{messages, CastError, ValidatorError};
use crate::query::Operator;
use crate::rid::RecordId;
use crate::schema::{ContainerKind, Schema};
use crate::value::{datetime_from_unix, format_datetime, parse_datetime, Value};

/// Declared type of a field.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldType {
    /// No casting.
    Any,
    /// `true`/`false`.
    Boolean,
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Double,
    /// UTF-8 string.
    String,
    /// Date and time.
    DateTime,
    /// Link to another record.
    Link,
    /// Embedded document.
    Embedded,
    /// Ordered list of items.
    List(Box<FieldType>),
    /// List without duplicates.
    Set(Box<FieldType>),
    /// String-keyed map of items.
    Map(Box<FieldType>),
}

impl FieldType {
    /// Dialect type name, used in cast errors and DDL.
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::Any => "Any",
            FieldType::Boolean => "Boolean",
            FieldType::Integer => "Integer",
            FieldType::Double => "Double",
            FieldType::String => "String",
            FieldType::DateTime => "DateTime",
            FieldType::Link => "Link",
            FieldType::Embedded => "Embedded",
            FieldType::List(item) if **item == FieldType::Link => "LinkList",
            FieldType::List(_) => "EmbeddedList",
            FieldType::Set(item) if **item == FieldType::Link => "LinkSet",
            FieldType::Set(_) => "EmbeddedSet",
            FieldType::Map(item) if **item == FieldType::Link => "LinkMap",
            FieldType::Map(_) => "EmbeddedMap",
        }
    }

    fn container_kind(&self) -> Option<ContainerKind> {
        match self {
            FieldType::List(_) => Some(ContainerKind::List),
            FieldType::Set(_) => Some(ContainerKind::Set),
            FieldType::Map(_) => Some(ContainerKind::Map),
            _ => None,
        }
    }

    fn item_type(&self) -> &FieldType {
        match self {
            FieldType::List(item) | FieldType::Set(item) | FieldType::Map(item) => item,
            other => other,
        }
    }

    /// Casts `value` to this type; `path` is reported on failure.
    pub fn cast(&self, path: &str, value: Value) -> Result<Value, CastError> {
        if value.is_null() || *self == FieldType::Any {
            return Ok(value);
        }
        match self {
            FieldType::List(item) => cast_list(item, path, value, false),
            FieldType::Set(item) => cast_list(item, path, value, true),
            FieldType::Map(item) => match value {
                Value::Map(map) => map
                    .into_iter()
                    .map(|(k, v)| item.cast(path, v).map(|v| (k, v)))
                    .collect::<Result<_, _>>()
                    .map(Value::Map),
                other => Err(CastError::new(self.name(), &other, path)),
            },
            scalar => scalar
                .cast_scalar(&value)
                .ok_or_else(|| CastError::new(scalar.name(), &value, path)),
        }
    }

    fn cast_scalar(&self, value: &Value) -> Option<Value> {
        match (self, value) {
            (FieldType::Boolean, Value::Bool(b)) => Some(Value::Bool(*b)),
            (FieldType::Boolean, Value::Int(i)) if *i == 0 || *i == 1 => Some(Value::Bool(*i == 1)),
            (FieldType::Boolean, Value::String(s)) => match s.as_str() {
                "true" | "1" => Some(Value::Bool(true)),
                "false" | "0" => Some(Value::Bool(false)),
                _ => None,
            },
            (FieldType::Integer, Value::Int(i)) => Some(Value::Int(*i)),
            (FieldType::Integer, Value::Float(f)) if f.is_finite() && f.fract() == 0.0 => {
                Some(Value::Int(*f as i64))
            }
            (FieldType::Integer, Value::String(s)) => s.trim().parse().ok().map(Value::Int),
            (FieldType::Double, Value::Float(f)) => Some(Value::Float(*f)),
            (FieldType::Double, Value::Int(i)) => Some(Value::Float(*i as f64)),
            (FieldType::Double, Value::String(s)) => s.trim().parse().ok().map(Value::Float),
            (FieldType::String, Value::String(s)) => Some(Value::String(s.clone())),
            (FieldType::String, Value::Int(_) | Value::Float(_) | Value::Bool(_)) => {
                Some(Value::String(value.plain_text()))
            }
            (FieldType::String, Value::Link(rid)) => Some(Value::String(rid.to_string())),
            (FieldType::String, Value::DateTime(dt)) => Some(Value::String(format_datetime(dt))),
            (FieldType::DateTime, Value::DateTime(dt)) => Some(Value::DateTime(*dt)),
            (FieldType::DateTime, Value::String(s)) => parse_datetime(s).map(Value::DateTime),
            (FieldType::DateTime, Value::Int(secs)) => datetime_from_unix(*secs).map(Value::DateTime),
            (FieldType::Link, Value::Link(rid)) => Some(Value::Link(*rid)),
            (FieldType::Link, Value::String(s)) => s.parse::<RecordId>().ok().map(Value::Link),
            (FieldType::Link, Value::Map(map)) => match map.get("@rid") {
                Some(Value::Link(rid)) => Some(Value::Link(*rid)),
                Some(Value::String(s)) => s.parse::<RecordId>().ok().map(Value::Link),
                _ => None,
            },
            (FieldType::Embedded, Value::Map(map)) => Some(Value::Map(map.clone())),
            _ => None,
        }
    }
}

fn cast_list(item: &FieldType, path: &str, value: Value, dedupe: bool) -> Result<Value, CastError> {
    let items = match value {
        Value::List(items) => items,
        single => vec![single],
    };
    let mut out: Vec<Value> = Vec::with_capacity(items.len());
    for raw in items {
        let cast = item.cast(path, raw)?;
        if dedupe && out.contains(&cast) {
            continue;
        }
        out.push(cast);
    }
    Ok(Value::List(out))
}

/// Field declaration: type, requirement, default, and simple validators.
#[derive(Clone, Debug, PartialEq)]
pub struct FieldDef {
    /// Declared type.
    pub ty: FieldType,
    /// Path must be present.
    pub required: bool,
    /// Default applied when a document is constructed.
    pub default: Option<Value>,
    /// Allowed string values; empty means unrestricted.
    pub enum_values: Vec<String>,
    /// Lower bound for numbers, or minimum length for strings.
    pub min: Option<f64>,
    /// Upper bound for numbers, or maximum length for strings.
    pub max: Option<f64>,
}

impl FieldDef {
    /// Declares an optional field of type `ty`.
    pub fn new(ty: FieldType) -> Self {
        Self {
            ty,
            required: false,
            default: None,
            enum_values: Vec::new(),
            min: None,
            max: None,
        }
    }

    /// Marks the field as required.
    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Sets the default value.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    /// Restricts string values.
    pub fn one_of<I, S>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.enum_values = values.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the numeric minimum (or minimum string length).
    pub fn min(mut self, min: f64) -> Self {
        self.min = Some(min);
        self
    }

    /// Sets the numeric maximum (or maximum string length).
    pub fn max(mut self, max: f64) -> Self {
        self.max = Some(max);
        self
    }

    fn check(&self, path: &str, value: &Value) -> Result<(), ValidatorError> {
        let empty = match value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if self.required && empty {
            return Err(ValidatorError::new(path, "required", messages::REQUIRED, value));
        }
        match value {
            Value::String(s) => {
                if !self.enum_values.is_empty() && !self.enum_values.iter().any(|e| e == s) {
                    return Err(ValidatorError::new(path, "enum", messages::STRING_ENUM, value));
                }
                let len = s.chars().count() as f64;
                if let Some(min) = self.min.filter(|min| len < *min) {
                    return Err(ValidatorError::new(path, "min", messages::STRING_MIN, value)
                        .with_bound("{MIN}", min));
                }
                if let Some(max) = self.max.filter(|max| len > *max) {
                    return Err(ValidatorError::new(path, "max", messages::STRING_MAX, value)
                        .with_bound("{MAX}", max));
                }
            }
            Value::Int(_) | Value::Float(_) => {
                let n = value.as_f64().unwrap_or_default();
                if let Some(min) = self.min.filter(|min| n < *min) {
                    return Err(ValidatorError::new(path, "min", messages::NUMBER_MIN, value)
                        .with_bound("{MIN}", min));
                }
                if let Some(max) = self.max.filter(|max| n > *max) {
                    return Err(ValidatorError::new(path, "max", messages::NUMBER_MAX, value)
                        .with_bound("{MAX}", max));
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// Schema for one class, backed by a declaration-ordered field list.
#[derive(Clone, Debug, Default)]
pub struct ClassSchema {
    name: String,
    fields: Vec<(String, FieldDef)>,
}

impl ClassSchema {
    /// Creates an empty class schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    /// Declares (or redeclares) a field.
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        let name = name.into();
        match self.fields.iter_mut().find(|(existing, _)| *existing == name) {
            Some(slot) => slot.1 = def,
            None => self.fields.push((name, def)),
        }
        self
    }

    /// Looks up a field declaration.
    pub fn field_def(&self, path: &str) -> Option<&FieldDef> {
        self.fields
            .iter()
            .find(|(name, _)| name == path)
            .map(|(_, def)| def)
    }
}

impl Schema for ClassSchema {
    fn class_name(&self) -> &str {
        &self.name
    }

    fn has_path(&self, path: &str) -> bool {
        self.field_def(path).is_some()
    }

    fn paths(&self) -> Vec<String> {
        self.fields.iter().map(|(name, _)| name.clone()).collect()
    }

    fn cast(&self, path: &str, value: Value) -> Result<Value, CastError> {
        match self.field_def(path) {
            Some(def) => def.ty.cast(path, value),
            None => Ok(value),
        }
    }

    fn cast_for_query(&self, path: &str, op: Operator, value: Value) -> Result<Value, CastError> {
        let Some(def) = self.field_def(path) else {
            return Ok(value);
        };
        match op {
            Operator::Like
            | Operator::Matches
            | Operator::InstanceOf
            | Operator::Is
            | Operator::IsNot => Ok(value),
            Operator::In | Operator::NotIn | Operator::Between => match value {
                Value::List(items) => items
                    .into_iter()
                    .map(|item| def.ty.item_type().cast(path, item))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::List),
                single => def.ty.item_type().cast(path, single),
            },
            _ => match value {
                list @ Value::List(_) if def.ty.container_kind().is_some() => def.ty.cast(path, list),
                other => def.ty.item_type().cast(path, other),
            },
        }
    }

    fn cast_item(&self, path: &str, value: Value) -> Result<Value, CastError> {
        match self.field_def(path) {
            Some(def) => def.ty.item_type().cast(path, value),
            None => Ok(value),
        }
    }

    fn container_kind(&self, path: &str) -> Option<ContainerKind> {
        self.field_def(path).and_then(|def| def.ty.container_kind())
    }

    fn is_required(&self, path: &str) -> bool {
        self.field_def(path).is_some_and(|def| def.required)
    }

    fn required_paths(&self) -> Vec<String> {
        self.fields
            .iter()
            .filter(|(_, def)| def.required)
            .map(|(name, _)| name.clone())
            .collect()
    }

    fn default_value(&self, path: &str, _is_init: bool) -> Option<Value> {
        self.field_def(path).and_then(|def| def.default.clone())
    }

    fn validate(&self, path: &str, value: &Value) -> Result<(), ValidatorError> {
        match self.field_def(path) {
            Some(def) => def.check(path, value),
            None => Ok(()),
        }
    }
}
