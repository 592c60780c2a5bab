//! Fluent condition builder.
//!
//! A [`Condition`] accumulates `(field, operator, value)` items joined by
//! logical AND, plus paging and sort hints. It renders to the storage query
//! form with [`Condition::to_map_str`] and can be evaluated in-process with
//! [`Condition::matches`].

use std::cmp::Ordering;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::mapstr::MapStr;

/// Comparison operators supported by condition items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Neq,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Nin,
    Like,
}

impl Operator {
    /// Storage query keyword for this operator.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Neq => "$ne",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::In => "$in",
            Self::Nin => "$nin",
            Self::Like => "$regex",
        }
    }

    /// Parses a storage query keyword such as `$gte`.
    #[must_use]
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        Some(match keyword {
            "$eq" => Self::Eq,
            "$ne" => Self::Neq,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$in" => Self::In,
            "$nin" => Self::Nin,
            "$regex" => Self::Like,
            _ => return None,
        })
    }
}

/// Raised when a query map cannot be read back into a [`Condition`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConditionError {
    #[error("unknown operator '{keyword}' on field '{field}'")]
    UnknownOperator { field: String, keyword: String },
}

/// One `(field, operator, value)` predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionItem {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl ConditionItem {
    /// Evaluates this predicate against `data`. A missing field only
    /// satisfies `Neq` and `Nin`.
    #[must_use]
    pub fn matches(&self, data: &MapStr) -> bool {
        let Some(actual) = data.get(&self.field) else {
            return matches!(self.operator, Operator::Neq | Operator::Nin);
        };

        match self.operator {
            Operator::Eq => loose_eq(actual, &self.value),
            Operator::Neq => !loose_eq(actual, &self.value),
            Operator::Lt => compare(actual, &self.value) == Some(Ordering::Less),
            Operator::Lte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Operator::Gt => compare(actual, &self.value) == Some(Ordering::Greater),
            Operator::Gte => matches!(
                compare(actual, &self.value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Operator::In => self
                .value
                .as_array()
                .is_some_and(|set| set.iter().any(|v| loose_eq(actual, v))),
            Operator::Nin => !self
                .value
                .as_array()
                .is_some_and(|set| set.iter().any(|v| loose_eq(actual, v))),
            Operator::Like => match (actual.as_str(), self.value.as_str()) {
                (Some(text), Some(pattern)) => {
                    Regex::new(pattern).is_ok_and(|re| re.is_match(text))
                }
                _ => false,
            },
        }
    }
}

/// Accumulating AND-condition with paging hints.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    items: Vec<ConditionItem>,
    start: u64,
    limit: Option<u64>,
    sort: Option<String>,
}

impl Condition {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a predicate on `name`; finish it with an operator method.
    ///
    /// ```
    /// use topo_core::Condition;
    ///
    /// let mut cond = Condition::new();
    /// cond.field("bk_supplier_account").eq("0").field("bk_obj_id").eq("set");
    /// assert_eq!(cond.items().len(), 2);
    /// ```
    pub fn field(&mut self, name: impl Into<String>) -> Field<'_> {
        Field {
            cond: self,
            name: name.into(),
        }
    }

    pub fn add_item(&mut self, item: ConditionItem) -> &mut Self {
        self.items.push(item);
        self
    }

    pub fn set_start(&mut self, start: u64) -> &mut Self {
        self.start = start;
        self
    }

    pub fn set_limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn set_sort(&mut self, sort: impl Into<String>) -> &mut Self {
        self.sort = Some(sort.into());
        self
    }

    #[must_use]
    pub fn items(&self) -> &[ConditionItem] {
        &self.items
    }

    #[must_use]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[must_use]
    pub fn limit(&self) -> Option<u64> {
        self.limit
    }

    #[must_use]
    pub fn sort(&self) -> Option<&str> {
        self.sort.as_deref()
    }

    /// Returns the value of the first `Eq` item on `field`, if any.
    #[must_use]
    pub fn eq_value(&self, field: &str) -> Option<&Value> {
        self.items
            .iter()
            .find(|item| item.field == field && item.operator == Operator::Eq)
            .map(|item| &item.value)
    }

    /// Renders the condition in storage query form.
    ///
    /// `Eq` items render as a bare value; other operators render as
    /// `{"$op": value}`. Several operators on one field are merged into a
    /// single object; an `Eq` on a field that already has operators is
    /// kept as `$eq`.
    #[must_use]
    pub fn to_map_str(&self) -> MapStr {
        let mut out = MapStr::new();
        for item in &self.items {
            let rendered = match (item.operator, out.remove(&item.field)) {
                (Operator::Eq, None) => item.value.clone(),
                (op, Some(Value::Object(mut existing))) => {
                    existing.insert(op.as_str().to_string(), item.value.clone());
                    Value::Object(existing)
                }
                (op, Some(previous_eq)) => json!({
                    (Operator::Eq.as_str()): previous_eq,
                    (op.as_str()): item.value.clone(),
                }),
                (op, None) => json!({ (op.as_str()): item.value.clone() }),
            };
            out.set(item.field.clone(), rendered);
        }
        out
    }

    /// Reads a condition back from its storage query form.
    ///
    /// A field whose value is an object with only `$`-prefixed keys becomes
    /// one item per operator; any other value is an `Eq` item.
    ///
    /// # Errors
    ///
    /// Returns `ConditionError::UnknownOperator` for an unrecognized `$` key.
    pub fn from_map_str(query: &MapStr) -> Result<Self, ConditionError> {
        let mut cond = Self::new();
        for (field, value) in query.iter() {
            match value {
                Value::Object(ops) if !ops.is_empty() && ops.keys().all(|k| k.starts_with('$')) => {
                    for (keyword, operand) in ops {
                        let operator = Operator::from_keyword(keyword).ok_or_else(|| {
                            ConditionError::UnknownOperator {
                                field: field.clone(),
                                keyword: keyword.clone(),
                            }
                        })?;
                        cond.add_item(ConditionItem {
                            field: field.clone(),
                            operator,
                            value: operand.clone(),
                        });
                    }
                }
                _ => {
                    cond.field(field.clone()).eq(value.clone());
                }
            }
        }
        Ok(cond)
    }

    /// True when every item matches `data`. An empty condition matches
    /// everything.
    #[must_use]
    pub fn matches(&self, data: &MapStr) -> bool {
        self.items.iter().all(|item| item.matches(data))
    }
}

/// Pending predicate returned by [`Condition::field`].
pub struct Field<'a> {
    cond: &'a mut Condition,
    name: String,
}

impl<'a> Field<'a> {
    fn push(self, operator: Operator, value: Value) -> &'a mut Condition {
        self.cond.items.push(ConditionItem {
            field: self.name,
            operator,
            value,
        });
        self.cond
    }

    #[allow(clippy::should_implement_trait)]
    pub fn eq(self, value: impl Into<Value>) -> &'a mut Condition {
        self.push(Operator::Eq, value.into())
    }

    pub fn neq(self, value: impl Into<Value>) -> &'a mut Condition {
        self.push(Operator::Neq, value.into())
    }

    pub fn lt(self, value: impl Into<Value>) -> &'a mut Condition {
        self.push(Operator::Lt, value.into())
    }

    pub fn lte(self, value: impl Into<Value>) -> &'a mut Condition {
        self.push(Operator::Lte, value.into())
    }

    pub fn gt(self, value: impl Into<Value>) -> &'a mut Condition {
        self.push(Operator::Gt, value.into())
    }

    pub fn gte(self, value: impl Into<Value>) -> &'a mut Condition {
        self.push(Operator::Gte, value.into())
    }

    pub fn in_values<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> &'a mut Condition {
        let values = values.into_iter().map(Into::into).collect();
        self.push(Operator::In, Value::Array(values))
    }

    pub fn not_in<V: Into<Value>>(self, values: impl IntoIterator<Item = V>) -> &'a mut Condition {
        let values = values.into_iter().map(Into::into).collect();
        self.push(Operator::Nin, Value::Array(values))
    }

    pub fn like(self, pattern: impl Into<String>) -> &'a mut Condition {
        self.push(Operator::Like, Value::String(pattern.into()))
    }
}

/// Equality that treats a number and its decimal string form as equal.
/// Path parameters arrive as strings while stored fields are often numbers.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => {
            let x = as_number(a)?;
            let y = as_number(b)?;
            x.partial_cmp(&y)
        }
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
