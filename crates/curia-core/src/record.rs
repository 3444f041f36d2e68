//! Case and holding records.
//!
//! Records are only ever produced by the builder (from source text) or by
//! [`CaseRecord::from_json`] (from a persisted corpus). Both paths check
//! every value against the registry, so a record never carries an uncoerced
//! value.

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::diagnostic::Diagnostic;
use crate::error::RecordError;
use crate::schema::{SchemaRegistry, Scope, UNKNOWN_CATEGORY, ValueKind};

/// A coerced answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldValue {
    /// Not answered, answered `N/A`, or unparseable integer.
    Missing,
    Text(String),
    Category(String),
    Integer(i64),
    Boolean(bool),
    List(Vec<String>),
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, FieldValue::Missing)
    }

    /// Whether this value is a legal coerced value of `kind`.
    pub fn fits(&self, kind: &ValueKind) -> bool {
        match (self, kind) {
            (FieldValue::Missing, _) => true,
            (FieldValue::Text(_), ValueKind::Text) => true,
            (FieldValue::Category(c), ValueKind::Enumerated(allowed)) => {
                c == UNKNOWN_CATEGORY || allowed.contains(&c.as_str())
            }
            (FieldValue::Integer(_), ValueKind::Integer) => true,
            (FieldValue::Boolean(_), ValueKind::Boolean) => true,
            (FieldValue::List(_), ValueKind::List) => true,
            _ => false,
        }
    }

    /// Rebuild a value of `kind` from its JSON form.
    pub fn from_json(code: &str, kind: &ValueKind, value: &Value) -> Result<Self, RecordError> {
        let mismatch = || RecordError::KindMismatch {
            code: code.to_string(),
            expected: kind.name(),
        };
        let parsed = match (kind, value) {
            (_, Value::Null) => FieldValue::Missing,
            (ValueKind::Text, Value::String(s)) => FieldValue::Text(s.clone()),
            (ValueKind::Enumerated(_), Value::String(s)) => FieldValue::Category(s.clone()),
            (ValueKind::Integer, Value::Number(n)) => {
                FieldValue::Integer(n.as_i64().ok_or_else(mismatch)?)
            }
            (ValueKind::Boolean, Value::Bool(b)) => FieldValue::Boolean(*b),
            (ValueKind::List, Value::Array(items)) => FieldValue::List(
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string).ok_or_else(mismatch))
                    .collect::<Result<_, _>>()?,
            ),
            _ => return Err(mismatch()),
        };
        if parsed.fits(kind) {
            Ok(parsed)
        } else {
            Err(mismatch())
        }
    }

    /// Single-cell rendering for flat tables; lists are joined with `"; "`.
    pub fn to_cell(&self) -> Option<String> {
        match self {
            FieldValue::Missing => None,
            FieldValue::Text(s) | FieldValue::Category(s) => Some(s.clone()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::List(items) => Some(items.join("; ")),
        }
    }
}

impl Serialize for FieldValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldValue::Missing => serializer.serialize_none(),
            FieldValue::Text(s) | FieldValue::Category(s) => serializer.serialize_str(s),
            FieldValue::Integer(i) => serializer.serialize_i64(*i),
            FieldValue::Boolean(b) => serializer.serialize_bool(*b),
            FieldValue::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
        }
    }
}

/// Coerced answers of one scope, one slot per registry code in declaration order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMap {
    scope: Scope,
    entries: Vec<(String, FieldValue)>,
}

impl FieldMap {
    /// Assemble a map from `(code, value)` slots already in registry order.
    pub(crate) fn from_slots(scope: Scope, entries: Vec<(String, FieldValue)>) -> Self {
        Self { scope, entries }
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn get(&self, code: &str) -> Option<&FieldValue> {
        self.entries
            .iter()
            .find(|(c, _)| c == code)
            .map(|(_, v)| v)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.entries.iter().map(|(c, v)| (c.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of slots holding a value.
    pub fn answered(&self) -> usize {
        self.entries.iter().filter(|(_, v)| !v.is_missing()).count()
    }

    /// Check every slot against the registry: same codes, same order, fitting values.
    pub fn check(&self, registry: &SchemaRegistry) -> Result<(), RecordError> {
        let mut slots = self.entries.iter();
        for entry in registry.entries(self.scope) {
            let (code, value) = slots.next().ok_or_else(|| RecordError::MissingField {
                scope: self.scope,
                code: entry.code.to_string(),
            })?;
            if code != entry.code {
                return Err(RecordError::Shape(format!(
                    "expected {} field {} but found {code}",
                    self.scope, entry.code
                )));
            }
            if !value.fits(&entry.kind) {
                return Err(RecordError::KindMismatch {
                    code: code.clone(),
                    expected: entry.kind.name(),
                });
            }
        }
        match slots.next() {
            Some((code, _)) => Err(RecordError::UnknownField {
                scope: self.scope,
                code: code.clone(),
            }),
            None => Ok(()),
        }
    }

    /// Rebuild from a JSON object, in registry order.
    pub fn from_json(
        scope: Scope,
        registry: &SchemaRegistry,
        object: &serde_json::Map<String, Value>,
    ) -> Result<Self, RecordError> {
        if let Some(code) = object
            .keys()
            .find(|code| registry.lookup(scope, code).is_none())
        {
            return Err(RecordError::UnknownField {
                scope,
                code: code.clone(),
            });
        }
        let entries = registry
            .entries(scope)
            .map(|entry| {
                let value = object.get(entry.code).ok_or_else(|| RecordError::MissingField {
                    scope,
                    code: entry.code.to_string(),
                })?;
                let value = FieldValue::from_json(entry.code, &entry.kind, value)?;
                Ok((entry.code.to_string(), value))
            })
            .collect::<Result<_, RecordError>>()?;
        Ok(Self { scope, entries })
    }
}

impl Serialize for FieldMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (code, value) in &self.entries {
            map.serialize_entry(code, value)?;
        }
        map.end()
    }
}

/// One discrete legal holding within a judgment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HoldingRecord {
    /// 1-based index from the source marker.
    pub holding_index: u32,
    pub fields: FieldMap,
}

/// One judgment with its holdings in source order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseRecord {
    /// Canonical slash form, e.g. `C-817/19`.
    pub case_id: String,
    pub fields: FieldMap,
    pub holdings: Vec<HoldingRecord>,
    pub diagnostics: Vec<Diagnostic>,
}

impl CaseRecord {
    pub fn holding(&self, index: u32) -> Option<&HoldingRecord> {
        self.holdings.iter().find(|h| h.holding_index == index)
    }

    /// Check the whole record against the registry before it is persisted.
    pub fn check(&self, registry: &SchemaRegistry) -> Result<(), RecordError> {
        if self.fields.scope() != Scope::Case {
            return Err(RecordError::Shape(format!(
                "case {} carries {} fields",
                self.case_id,
                self.fields.scope()
            )));
        }
        self.fields.check(registry)?;
        let mut previous = 0;
        for holding in &self.holdings {
            if holding.holding_index <= previous {
                return Err(RecordError::Shape(format!(
                    "case {}: holding {} follows holding {previous}",
                    self.case_id, holding.holding_index
                )));
            }
            previous = holding.holding_index;
            if holding.fields.scope() != Scope::Holding {
                return Err(RecordError::Shape(format!(
                    "case {}: holding {} carries {} fields",
                    self.case_id,
                    holding.holding_index,
                    holding.fields.scope()
                )));
            }
            holding.fields.check(registry)?;
        }
        Ok(())
    }

    /// Rebuild a case from its corpus JSON form.
    pub fn from_json(value: &Value, registry: &SchemaRegistry) -> Result<Self, RecordError> {
        let object = value
            .as_object()
            .ok_or_else(|| RecordError::Shape("case is not an object".into()))?;
        let case_id = object
            .get("case_id")
            .and_then(Value::as_str)
            .ok_or_else(|| RecordError::Shape("case_id missing or not a string".into()))?
            .to_string();
        let fields = FieldMap::from_json(Scope::Case, registry, as_object(object, "fields")?)?;

        let holdings = object
            .get("holdings")
            .and_then(Value::as_array)
            .ok_or_else(|| RecordError::Shape(format!("{case_id}: holdings missing")))?
            .iter()
            .map(|h| {
                let h = h
                    .as_object()
                    .ok_or_else(|| RecordError::Shape(format!("{case_id}: holding not an object")))?;
                let holding_index = h
                    .get("holding_index")
                    .and_then(Value::as_u64)
                    .and_then(|i| u32::try_from(i).ok())
                    .ok_or_else(|| RecordError::Shape(format!("{case_id}: bad holding_index")))?;
                let fields = FieldMap::from_json(Scope::Holding, registry, as_object(h, "fields")?)?;
                Ok(HoldingRecord {
                    holding_index,
                    fields,
                })
            })
            .collect::<Result<Vec<_>, RecordError>>()?;

        let diagnostics = match object.get("diagnostics") {
            Some(d) => serde_json::from_value(d.clone())?,
            None => Vec::new(),
        };

        let record = Self {
            case_id,
            fields,
            holdings,
            diagnostics,
        };
        record.check(registry)?;
        Ok(record)
    }
}

fn as_object<'a>(
    parent: &'a serde_json::Map<String, Value>,
    key: &str,
) -> Result<&'a serde_json::Map<String, Value>, RecordError> {
    parent
        .get(key)
        .and_then(Value::as_object)
        .ok_or_else(|| RecordError::Shape(format!("{key} missing or not an object")))
}
