//! Dynamic search predicate construction.
//!
//! Builds a single conjunctive WHERE fragment plus the ordered bind list
//! from a set of optional filter dimensions. The two stay in lockstep by
//! construction: every placeholder appended to the SQL pushes its value in
//! the same call, so binding order is derivable by scanning the predicate
//! left to right. No database handle is involved; the builder is testable
//! in isolation.

use rusqlite::types::{ToSqlOutput, Value};
use rusqlite::ToSql;

/// Membership lists longer than this are emitted as an OR-chain of
/// equality tests instead of a single `IN (…)` expression.
pub const DEFAULT_OR_CHAIN_THRESHOLD: usize = 100;

/// A value bound to one `?` placeholder.
#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Text(String),
    Int(i64),
}

impl ToSql for BindValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            BindValue::Text(s) => ToSqlOutput::Owned(Value::Text(s.clone())),
            BindValue::Int(i) => ToSqlOutput::Owned(Value::Integer(*i)),
        })
    }
}

impl From<&str> for BindValue {
    fn from(s: &str) -> Self {
        BindValue::Text(s.to_string())
    }
}

impl From<String> for BindValue {
    fn from(s: String) -> Self {
        BindValue::Text(s)
    }
}

impl From<i64> for BindValue {
    fn from(i: i64) -> Self {
        BindValue::Int(i)
    }
}

/// Finished predicate: conjunctive expression plus binds in placeholder order.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    expr: String,
    binds: Vec<BindValue>,
}

impl Predicate {
    /// `" WHERE …"` fragment, or the empty string when no dimension
    /// contributed a clause (an empty filter set matches everything).
    pub fn where_clause(&self) -> String {
        if self.expr.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.expr)
        }
    }

    /// The bare conjunctive expression, without the WHERE keyword.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    pub fn binds(&self) -> &[BindValue] {
        &self.binds
    }

    pub fn is_empty(&self) -> bool {
        self.expr.is_empty()
    }

    /// Number of `?` placeholders in the predicate text. Always equal to
    /// `binds().len()`.
    pub fn placeholder_count(&self) -> usize {
        self.expr.matches('?').count()
    }
}

/// Builder over optional filter dimensions. Clauses compose with AND in
/// call order; an omitted or empty dimension contributes nothing.
#[derive(Debug)]
pub struct PredicateBuilder {
    clauses: Vec<String>,
    binds: Vec<BindValue>,
    or_chain_threshold: usize,
}

impl Default for PredicateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PredicateBuilder {
    pub fn new() -> Self {
        Self::with_or_chain_threshold(DEFAULT_OR_CHAIN_THRESHOLD)
    }

    pub fn with_or_chain_threshold(threshold: usize) -> Self {
        Self {
            clauses: Vec::new(),
            binds: Vec::new(),
            or_chain_threshold: threshold.max(1),
        }
    }

    /// `column = ?`
    pub fn eq(&mut self, column: &str, value: impl Into<BindValue>) -> &mut Self {
        self.clauses.push(format!("{column} = ?"));
        self.binds.push(value.into());
        self
    }

    /// Membership test over `values`. Empty list contributes no clause.
    /// Lists longer than the OR-chain threshold fall back to
    /// [`PredicateBuilder::or_chain`] with identical semantics.
    pub fn in_list(&mut self, column: &str, values: &[String]) -> &mut Self {
        match values.len() {
            0 => self,
            1 => self.eq(column, values[0].as_str()),
            n if n > self.or_chain_threshold => self.or_chain(column, values),
            n => {
                let placeholders = vec!["?"; n].join(", ");
                self.clauses.push(format!("{column} IN ({placeholders})"));
                self.binds
                    .extend(values.iter().map(|v| BindValue::Text(v.clone())));
                self
            }
        }
    }

    /// `(column = ? OR column = ? OR …)`. Empty list contributes no clause.
    pub fn or_chain(&mut self, column: &str, values: &[String]) -> &mut Self {
        if values.is_empty() {
            return self;
        }
        let chain = values
            .iter()
            .map(|_| format!("{column} = ?"))
            .collect::<Vec<_>>()
            .join(" OR ");
        self.clauses.push(format!("({chain})"));
        self.binds
            .extend(values.iter().map(|v| BindValue::Text(v.clone())));
        self
    }

    /// Inclusive range over an epoch-seconds column. Either bound optional.
    pub fn time_range(&mut self, column: &str, from: Option<i64>, to: Option<i64>) -> &mut Self {
        if let Some(from) = from {
            self.clauses.push(format!("{column} >= ?"));
            self.binds.push(BindValue::Int(from));
        }
        if let Some(to) = to {
            self.clauses.push(format!("{column} <= ?"));
            self.binds.push(BindValue::Int(to));
        }
        self
    }

    pub fn build(self) -> Predicate {
        Predicate {
            expr: self.clauses.join(" AND "),
            binds: self.binds,
        }
    }
}
