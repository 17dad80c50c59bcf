//! Filter conditions and their compilation to the store's expression syntax.
//!
//! A [`Cond`] is one comparison against a field. Conditions accumulate in a
//! [`FilterExpr`] and compile to fragments joined by `and`: string operands
//! are single-quoted, numeric and boolean operands are bare. `exclude` chains
//! compile the negated counterpart of each fragment.

use crate::entity::value::Value;
use crate::error::{QuiverError, Result};

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `>=`
    Gte,
    /// `<`
    Lt,
    /// `<=`
    Lte,
    /// `like '%v%'`
    Contains,
    /// `like 'v%'`
    StartsWith,
    /// `like '%v'`
    EndsWith,
    /// `in (...)`
    In,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    One(Value),
    Many(Vec<Value>),
}

/// One comparison against a field.
#[derive(Debug, Clone, PartialEq)]
pub struct Cond {
    field: String,
    op: CmpOp,
    operand: Operand,
}

impl Cond {
    fn one<F: Into<String>, V: Into<Value>>(field: F, op: CmpOp, value: V) -> Self {
        Cond {
            field: field.into(),
            op,
            operand: Operand::One(value.into()),
        }
    }

    /// `field = value`
    pub fn eq<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::Eq, value)
    }

    /// `field != value`
    pub fn ne<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::Ne, value)
    }

    /// `field > value`
    pub fn gt<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::Gt, value)
    }

    /// `field >= value`
    pub fn gte<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::Gte, value)
    }

    /// `field < value`
    pub fn lt<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::Lt, value)
    }

    /// `field <= value`
    pub fn lte<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::Lte, value)
    }

    /// `field like '%value%'`
    pub fn contains<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::Contains, value)
    }

    /// `field like 'value%'`
    pub fn starts_with<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::StartsWith, value)
    }

    /// `field like '%value'`
    pub fn ends_with<F: Into<String>, V: Into<Value>>(field: F, value: V) -> Self {
        Self::one(field, CmpOp::EndsWith, value)
    }

    /// `field in (values...)`
    pub fn is_in<F: Into<String>, V: Into<Value>, I: IntoIterator<Item = V>>(
        field: F,
        values: I,
    ) -> Self {
        Cond {
            field: field.into(),
            op: CmpOp::In,
            operand: Operand::Many(values.into_iter().map(Into::into).collect()),
        }
    }

    /// Build a condition from the `field` / `field__op` keyword form.
    ///
    /// A bare field name means equality; the suffix selects the operator
    /// (`gt`, `gte`, `lt`, `lte`, `eq`, `ne`, `contains`, `startswith`,
    /// `endswith`, `in`). The `in` suffix expects a JSON array operand.
    pub fn from_key<V: Into<Value>>(key: &str, value: V) -> Result<Self> {
        let value = value.into();
        let Some((field, op)) = key.split_once("__") else {
            return Ok(Self::one(key, CmpOp::Eq, value));
        };

        let op = match op {
            "eq" => CmpOp::Eq,
            "ne" => CmpOp::Ne,
            "gt" => CmpOp::Gt,
            "gte" => CmpOp::Gte,
            "lt" => CmpOp::Lt,
            "lte" => CmpOp::Lte,
            "contains" => CmpOp::Contains,
            "startswith" => CmpOp::StartsWith,
            "endswith" => CmpOp::EndsWith,
            "in" => {
                let Value::Json(serde_json::Value::Array(items)) = value else {
                    return Err(QuiverError::query(format!(
                        "'{key}' expects a JSON array operand"
                    )));
                };
                let values = items
                    .into_iter()
                    .map(json_scalar)
                    .collect::<Result<Vec<_>>>()?;
                return Ok(Cond {
                    field: field.to_string(),
                    op: CmpOp::In,
                    operand: Operand::Many(values),
                });
            }
            other => {
                return Err(QuiverError::query(format!(
                    "Unknown filter operator '{other}' in '{key}'"
                )));
            }
        };
        Ok(Self::one(field, op, value))
    }

    /// The field this condition compares.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Compile this condition to an expression fragment.
    pub fn compile(&self, negated: bool) -> Result<String> {
        let field = &self.field;
        match self.op {
            CmpOp::Eq | CmpOp::Ne => {
                let flip = self.op == CmpOp::Ne;
                let symbol = if negated != flip { "!=" } else { "=" };
                Ok(format!("{field} {symbol} {}", self.scalar_literal()?))
            }
            CmpOp::Gt | CmpOp::Gte | CmpOp::Lt | CmpOp::Lte => {
                let symbol = match (self.op, negated) {
                    (CmpOp::Gt, false) | (CmpOp::Lte, true) => ">",
                    (CmpOp::Gte, false) | (CmpOp::Lt, true) => ">=",
                    (CmpOp::Lt, false) | (CmpOp::Gte, true) => "<",
                    _ => "<=",
                };
                Ok(format!("{field} {symbol} {}", self.scalar_literal()?))
            }
            CmpOp::Contains | CmpOp::StartsWith | CmpOp::EndsWith => {
                let Operand::One(Value::String(s)) = &self.operand else {
                    return Err(QuiverError::query(format!(
                        "Pattern match on '{field}' requires a string operand"
                    )));
                };
                let escaped = escape(s);
                let pattern = match self.op {
                    CmpOp::Contains => format!("%{escaped}%"),
                    CmpOp::StartsWith => format!("{escaped}%"),
                    _ => format!("%{escaped}"),
                };
                let like = if negated { "not like" } else { "like" };
                Ok(format!("{field} {like} '{pattern}'"))
            }
            CmpOp::In => {
                let Operand::Many(values) = &self.operand else {
                    return Err(QuiverError::query(format!(
                        "Membership test on '{field}' requires a list operand"
                    )));
                };
                let literals = values
                    .iter()
                    .map(literal)
                    .collect::<Result<Vec<_>>>()?
                    .join(",");
                let keyword = if negated { "not in" } else { "in" };
                Ok(format!("{field} {keyword} ({literals})"))
            }
        }
    }

    fn scalar_literal(&self) -> Result<String> {
        match &self.operand {
            Operand::One(value) => literal(value),
            Operand::Many(_) => Err(QuiverError::query(format!(
                "Comparison on '{}' requires a scalar operand",
                self.field
            ))),
        }
    }
}

fn escape(s: &str) -> String {
    s.replace('\'', "\\'")
}

/// Render a value as a filter literal: strings quoted, numbers and booleans
/// bare. Vector and JSON values cannot appear in filter expressions.
fn literal(value: &Value) -> Result<String> {
    match value {
        Value::Null => Ok("null".to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Int(i) => Ok(i.to_string()),
        Value::Float(f) => Ok(f.to_string()),
        Value::String(s) => Ok(format!("'{}'", escape(s))),
        other => Err(QuiverError::query(format!(
            "Cannot use a {} value in a filter expression",
            other.kind_name()
        ))),
    }
}

fn json_scalar(value: serde_json::Value) -> Result<Value> {
    match value {
        serde_json::Value::Bool(b) => Ok(Value::Bool(b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Value::Int(i))
            } else if let Some(f) = n.as_f64() {
                Ok(Value::Float(f))
            } else {
                Err(QuiverError::query(format!("Unsupported number: {n}")))
            }
        }
        serde_json::Value::String(s) => Ok(Value::String(s)),
        other => Err(QuiverError::query(format!(
            "Unsupported membership operand: {other}"
        ))),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Fragment {
    Cond { cond: Cond, negated: bool },
    Raw(String),
}

/// An accumulated conjunction of filter fragments.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpr {
    fragments: Vec<Fragment>,
}

impl FilterExpr {
    /// Append a condition.
    pub fn push(&mut self, cond: Cond, negated: bool) {
        self.fragments.push(Fragment::Cond { cond, negated });
    }

    /// Append a raw expression, ANDed verbatim with the other fragments.
    pub fn push_raw<S: Into<String>>(&mut self, expr: S) {
        self.fragments.push(Fragment::Raw(expr.into()));
    }

    /// Check whether any fragment has been accumulated.
    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    /// Compile the conjunction; empty input compiles to the empty string,
    /// which the store reads as "match everything".
    pub fn compile(&self) -> Result<String> {
        let parts = self
            .fragments
            .iter()
            .map(|fragment| match fragment {
                Fragment::Cond { cond, negated } => cond.compile(*negated),
                Fragment::Raw(expr) => Ok(expr.clone()),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(parts.join(" and "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comparison_fragments() {
        assert_eq!(
            Cond::gt("views", 100i64).compile(false).unwrap(),
            "views > 100"
        );
        assert_eq!(
            Cond::lte("price", 9.5f64).compile(false).unwrap(),
            "price <= 9.5"
        );
        assert_eq!(
            Cond::eq("category", "tech").compile(false).unwrap(),
            "category = 'tech'"
        );
        assert_eq!(
            Cond::ne("published", true).compile(false).unwrap(),
            "published != true"
        );
    }

    #[test]
    fn test_negation_inverts_operators() {
        assert_eq!(
            Cond::eq("category", "tech").compile(true).unwrap(),
            "category != 'tech'"
        );
        assert_eq!(
            Cond::gt("views", 100i64).compile(true).unwrap(),
            "views <= 100"
        );
        assert_eq!(
            Cond::gte("views", 100i64).compile(true).unwrap(),
            "views < 100"
        );
        assert_eq!(
            Cond::contains("title", "rust").compile(true).unwrap(),
            "title not like '%rust%'"
        );
        assert_eq!(
            Cond::is_in("category", ["a", "b"]).compile(true).unwrap(),
            "category not in ('a','b')"
        );
    }

    #[test]
    fn test_pattern_fragments() {
        assert_eq!(
            Cond::contains("title", "rust").compile(false).unwrap(),
            "title like '%rust%'"
        );
        assert_eq!(
            Cond::starts_with("title", "intro").compile(false).unwrap(),
            "title like 'intro%'"
        );
        assert_eq!(
            Cond::ends_with("title", "guide").compile(false).unwrap(),
            "title like '%guide'"
        );
        assert!(Cond::contains("views", 10i64).compile(false).is_err());
    }

    #[test]
    fn test_membership_fragment() {
        assert_eq!(
            Cond::is_in("views", [1i64, 2, 3]).compile(false).unwrap(),
            "views in (1,2,3)"
        );
        assert_eq!(
            Cond::is_in("category", ["tech", "ai"]).compile(false).unwrap(),
            "category in ('tech','ai')"
        );
    }

    #[test]
    fn test_string_quoting_and_escaping() {
        assert_eq!(
            Cond::eq("title", "it's").compile(false).unwrap(),
            "title = 'it\\'s'"
        );
    }

    #[test]
    fn test_from_key_parses_operator_suffix() {
        let cond = Cond::from_key("views__gt", 100i64).unwrap();
        assert_eq!(cond.compile(false).unwrap(), "views > 100");

        let cond = Cond::from_key("category", "tech").unwrap();
        assert_eq!(cond.compile(false).unwrap(), "category = 'tech'");

        let cond = Cond::from_key("title__startswith", "intro").unwrap();
        assert_eq!(cond.compile(false).unwrap(), "title like 'intro%'");

        let cond = Cond::from_key("category__in", serde_json::json!(["a", "b"])).unwrap();
        assert_eq!(cond.compile(false).unwrap(), "category in ('a','b')");

        assert!(Cond::from_key("views__unknown", 1i64).is_err());
        assert!(Cond::from_key("views__in", 1i64).is_err());
    }

    #[test]
    fn test_filter_expr_joins_with_and() {
        let mut expr = FilterExpr::default();
        expr.push(Cond::gt("views", 100i64), false);
        expr.push(Cond::eq("category", "tech"), false);
        expr.push_raw("score >= 0.5");

        assert_eq!(
            expr.compile().unwrap(),
            "views > 100 and category = 'tech' and score >= 0.5"
        );
    }

    #[test]
    fn test_empty_filter_compiles_to_empty_string() {
        assert_eq!(FilterExpr::default().compile().unwrap(), "");
    }

    #[test]
    fn test_vector_operand_is_rejected() {
        let err = Cond::eq("embedding", vec![0.1f32, 0.2])
            .compile(false)
            .unwrap_err();
        assert!(err.to_string().contains("vector"));
    }
}
