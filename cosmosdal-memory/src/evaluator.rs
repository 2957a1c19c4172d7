//! Query evaluation over JSON records.
//!
//! Evaluation follows the store's three-valued logic: an expression yields a value or is
//! undefined (`None`). Comparisons between values of different types and operators applied to
//! undefined operands are undefined, and a filter only keeps rows for which it yields `true`.

use serde_json::{Map, Value};
use std::{cmp::Ordering, collections::HashMap, convert::Infallible};

use cosmosdal_core::{
    error::{StoreError, StoreResult},
    options::QueryParameter,
};

use crate::sql::{
    BinaryOp, Expr, ExprVisitor, Function, Path, Projection, Segment, SelectQuery, SortDirection,
    SubQuery,
};

/// Borrowed, comparable view of a JSON value.
///
/// All numbers are normalized to `f64`.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    Number(f64),
    String(&'a str),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
}

impl<'a> From<&'a Value> for Comparable<'a> {
    fn from(value: &'a Value) -> Self {
        match value {
            Value::Null => Comparable::Null,
            Value::Bool(value) => Comparable::Bool(*value),
            Value::Number(value) => Comparable::Number(value.as_f64().unwrap_or(f64::NAN)),
            Value::String(value) => Comparable::String(value),
            Value::Array(array) => Comparable::Array(
                array
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>(),
            ),
            Value::Object(map) => Comparable::Map(
                map.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
        }
    }
}

impl Comparable<'_> {
    /// Position of the value's type in the store's cross-type sort order.
    fn rank(&self) -> u8 {
        match self {
            Comparable::Null => 1,
            Comparable::Bool(_) => 2,
            Comparable::Number(_) => 3,
            Comparable::String(_) => 4,
            Comparable::Array(_) => 5,
            Comparable::Map(_) => 6,
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => Some(Ordering::Equal),
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Equality of two defined values; undefined when their types differ.
fn equals(left: &Value, right: &Value) -> Option<bool> {
    let (left, right) = (Comparable::from(left), Comparable::from(right));

    if left.rank() == right.rank() {
        Some(left == right)
    } else {
        None
    }
}

/// Sort order used by `ORDER BY`: undefined first, then by type, then by value.
fn sort_order(left: &Option<Value>, right: &Option<Value>) -> Ordering {
    match (left, right) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(left), Some(right)) => {
            let (left, right) = (Comparable::from(left), Comparable::from(right));
            left.rank()
                .cmp(&right.rank())
                .then_with(|| left.partial_cmp(&right).unwrap_or(Ordering::Equal))
        }
    }
}

/// Whether `candidate` matches `expected` field by field, ignoring fields `expected` lacks.
fn contains_partially(candidate: &Value, expected: &Value) -> bool {
    match (candidate, expected) {
        (Value::Object(candidate), Value::Object(expected)) => expected
            .iter()
            .all(|(key, value)| candidate.get(key).is_some_and(|c| equals(c, value) == Some(true))),
        _ => equals(candidate, expected) == Some(true),
    }
}

/// Evaluates expressions against one row of a query.
pub(crate) struct RowEvaluator<'a> {
    scopes: Vec<(String, Value)>,
    parameters: &'a [QueryParameter],
}

impl<'a> RowEvaluator<'a> {
    pub(crate) fn new(alias: &str, row: &Value, parameters: &'a [QueryParameter]) -> Self {
        Self {
            scopes: vec![(alias.to_string(), row.clone())],
            parameters,
        }
    }

    pub(crate) fn evaluate(&mut self, expr: &Expr) -> StoreResult<Option<Value>> {
        self.visit_expr(expr)
    }

    /// Whether `filter` yields `true` for this row.
    pub(crate) fn matches(&mut self, filter: &Expr) -> StoreResult<bool> {
        Ok(self.evaluate(filter)? == Some(Value::Bool(true)))
    }

    fn string_args(&mut self, args: &[Expr]) -> StoreResult<Option<(String, String, bool)>> {
        let (Some(Value::String(left)), Some(Value::String(right))) =
            (self.evaluate(&args[0])?, self.evaluate(&args[1])?)
        else {
            return Ok(None);
        };

        let ignore_case = match args.get(2) {
            None => false,
            Some(expr) => match self.evaluate(expr)? {
                Some(Value::Bool(flag)) => flag,
                _ => return Ok(None),
            },
        };

        Ok(Some(if ignore_case {
            (left.to_lowercase(), right.to_lowercase(), true)
        } else {
            (left, right, false)
        }))
    }
}

impl ExprVisitor for RowEvaluator<'_> {
    type Output = Option<Value>;
    type Error = StoreError;

    fn visit_literal(&mut self, value: &Value) -> StoreResult<Option<Value>> {
        Ok(Some(value.clone()))
    }

    fn visit_parameter(&mut self, name: &str) -> StoreResult<Option<Value>> {
        Ok(self
            .parameters
            .iter()
            .find(|parameter| parameter.name == name)
            .map(|parameter| parameter.value.clone()))
    }

    fn visit_path(&mut self, path: &Path) -> StoreResult<Option<Value>> {
        let Some((_, root)) = self
            .scopes
            .iter()
            .rev()
            .find(|(alias, _)| *alias == path.root)
        else {
            return Ok(None);
        };

        let mut current = root;
        for segment in &path.segments {
            current = match (segment, current) {
                (Segment::Field(field), Value::Object(map)) => match map.get(field) {
                    Some(value) => value,
                    None => return Ok(None),
                },
                (Segment::Index(index), Value::Array(array)) => match array.get(*index) {
                    Some(value) => value,
                    None => return Ok(None),
                },
                _ => return Ok(None),
            };
        }

        Ok(Some(current.clone()))
    }

    fn visit_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> StoreResult<Option<Value>> {
        let left = self.visit_expr(left)?;
        let right = self.visit_expr(right)?;

        Ok(match op {
            BinaryOp::And => match (left, right) {
                (Some(Value::Bool(false)), _) | (_, Some(Value::Bool(false))) => Some(Value::Bool(false)),
                (Some(Value::Bool(true)), Some(Value::Bool(true))) => Some(Value::Bool(true)),
                _ => None,
            },
            BinaryOp::Or => match (left, right) {
                (Some(Value::Bool(true)), _) | (_, Some(Value::Bool(true))) => Some(Value::Bool(true)),
                (Some(Value::Bool(false)), Some(Value::Bool(false))) => Some(Value::Bool(false)),
                _ => None,
            },
            BinaryOp::Eq | BinaryOp::Ne => {
                let (Some(left), Some(right)) = (left, right) else {
                    return Ok(None);
                };
                equals(&left, &right).map(|equal| Value::Bool(equal == (op == BinaryOp::Eq)))
            }
            BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
                let (Some(left), Some(right)) = (left, right) else {
                    return Ok(None);
                };
                Comparable::from(&left)
                    .partial_cmp(&Comparable::from(&right))
                    .map(|ordering| {
                        Value::Bool(match op {
                            BinaryOp::Lt => ordering == Ordering::Less,
                            BinaryOp::Le => ordering != Ordering::Greater,
                            BinaryOp::Gt => ordering == Ordering::Greater,
                            _ => ordering != Ordering::Less,
                        })
                    })
            }
        })
    }

    fn visit_not(&mut self, expr: &Expr) -> StoreResult<Option<Value>> {
        Ok(match self.visit_expr(expr)? {
            Some(Value::Bool(value)) => Some(Value::Bool(!value)),
            _ => None,
        })
    }

    fn visit_call(&mut self, function: Function, args: &[Expr]) -> StoreResult<Option<Value>> {
        Ok(match function {
            Function::IsDefined => Some(Value::Bool(self.evaluate(&args[0])?.is_some())),
            Function::StartsWith => self
                .string_args(args)?
                .map(|(s, prefix, _)| Value::Bool(s.starts_with(&prefix))),
            Function::EndsWith => self
                .string_args(args)?
                .map(|(s, suffix, _)| Value::Bool(s.ends_with(&suffix))),
            Function::Contains => self
                .string_args(args)?
                .map(|(s, needle, _)| Value::Bool(s.contains(&needle))),
            Function::ArrayContains => {
                let Some(Value::Array(array)) = self.evaluate(&args[0])? else {
                    return Ok(None);
                };
                let Some(expected) = self.evaluate(&args[1])? else {
                    return Ok(None);
                };
                let partial = match args.get(2) {
                    None => false,
                    Some(expr) => match self.evaluate(expr)? {
                        Some(Value::Bool(flag)) => flag,
                        _ => return Ok(None),
                    },
                };

                Some(Value::Bool(array.iter().any(|item| {
                    if partial {
                        contains_partially(item, &expected)
                    } else {
                        equals(item, &expected) == Some(true)
                    }
                })))
            }
            Function::Lower => match self.evaluate(&args[0])? {
                Some(Value::String(s)) => Some(Value::String(s.to_lowercase())),
                _ => None,
            },
            Function::Upper => match self.evaluate(&args[0])? {
                Some(Value::String(s)) => Some(Value::String(s.to_uppercase())),
                _ => None,
            },
        })
    }

    fn visit_exists(&mut self, subquery: &SubQuery) -> StoreResult<Option<Value>> {
        let Some(Value::Array(items)) = self.visit_expr(&subquery.source)? else {
            return Ok(Some(Value::Bool(false)));
        };

        for item in items {
            self.scopes.push((subquery.alias.clone(), item));

            let found = match &subquery.filter {
                Some(filter) => self.matches(filter),
                None => Ok(true),
            }
            .and_then(|passed| match (&subquery.value, passed) {
                (Some(value), true) => Ok(self.evaluate(value)?.is_some()),
                (None, passed) => Ok(passed),
                (_, false) => Ok(false),
            });

            self.scopes.pop();
            if found? {
                return Ok(Some(Value::Bool(true)));
            }
        }

        Ok(Some(Value::Bool(false)))
    }
}

/// Runs a parsed query over `rows` and returns the projected results in order.
pub(crate) fn execute<'r>(
    query: &SelectQuery,
    parameters: &[QueryParameter],
    rows: impl IntoIterator<Item = &'r Value>,
) -> StoreResult<Vec<Value>> {
    let mut selected = Vec::new();

    for row in rows {
        let mut evaluator = RowEvaluator::new(&query.alias, row, parameters);

        if let Some(filter) = &query.filter {
            if !evaluator.matches(filter)? {
                continue;
            }
        }

        let sort_key = match &query.order_by {
            Some(order_by) => evaluator.evaluate(&order_by.expr)?,
            None => None,
        };
        selected.push((row, sort_key));
    }

    if let Some(order_by) = &query.order_by {
        selected.sort_by(|(_, left), (_, right)| match order_by.direction {
            SortDirection::Asc => sort_order(left, right),
            SortDirection::Desc => sort_order(right, left),
        });
    }

    let mut results = Vec::with_capacity(selected.len());

    for (row, _) in selected
        .into_iter()
        .take(query.top.unwrap_or(usize::MAX))
    {
        match &query.projection {
            Projection::All => results.push(row.clone()),
            Projection::Value(expr) => {
                if let Some(value) = RowEvaluator::new(&query.alias, row, parameters).evaluate(expr)? {
                    results.push(value);
                }
            }
            Projection::Fields(fields) => {
                let mut evaluator = RowEvaluator::new(&query.alias, row, parameters);
                let mut projected = Map::new();

                for (expr, name) in fields {
                    if let Some(value) = evaluator.evaluate(expr)? {
                        projected.insert(name.clone(), value);
                    }
                }
                results.push(Value::Object(projected));
            }
        }
    }

    Ok(results)
}

/// Detects filters that pin a query to one partition: an equality between the partition key
/// path and a literal or parameter, on its own or inside a conjunction.
struct PartitionPin<'a> {
    alias: &'a str,
    path: &'a [&'a str],
}

impl PartitionPin<'_> {
    fn is_partition_path(&self, expr: &Expr) -> bool {
        match expr {
            Expr::Path(path) => {
                path.root == self.alias
                    && path.segments.len() == self.path.len()
                    && path
                        .segments
                        .iter()
                        .zip(self.path)
                        .all(|(segment, expected)| {
                            matches!(segment, Segment::Field(field) if field == expected)
                        })
            }
            _ => false,
        }
    }
}

fn is_constant(expr: &Expr) -> bool {
    matches!(expr, Expr::Literal(_) | Expr::Parameter(_))
}

impl ExprVisitor for PartitionPin<'_> {
    type Output = bool;
    type Error = Infallible;

    fn visit_literal(&mut self, _value: &Value) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn visit_parameter(&mut self, _name: &str) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn visit_path(&mut self, _path: &Path) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn visit_binary(&mut self, op: BinaryOp, left: &Expr, right: &Expr) -> Result<bool, Infallible> {
        Ok(match op {
            BinaryOp::And => self.visit_expr(left)? || self.visit_expr(right)?,
            BinaryOp::Eq => {
                (self.is_partition_path(left) && is_constant(right))
                    || (is_constant(left) && self.is_partition_path(right))
            }
            _ => false,
        })
    }

    fn visit_not(&mut self, _expr: &Expr) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn visit_call(&mut self, _function: Function, _args: &[Expr]) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn visit_exists(&mut self, _subquery: &SubQuery) -> Result<bool, Infallible> {
        Ok(false)
    }
}

/// Whether the query's filter restricts it to a single value of the partition key at `path`.
pub(crate) fn pins_partition(query: &SelectQuery, path: &[&str]) -> bool {
    let mut pin = PartitionPin {
        alias: &query.alias,
        path,
    };

    match &query.filter {
        Some(filter) => match pin.visit_expr(filter) {
            Ok(pinned) => pinned,
            Err(never) => match never {},
        },
        None => false,
    }
}
