//! View: 질의 가능한 결과 집합
//!
//! A view is a header plus ordered records. Every pipeline stage takes a view
//! and produces the next one; source tables in the catalog are views too.
//!
//! ```rust
//! use tabq_core::{Value, View};
//!
//! let view = View::from_rows("t", &["c1", "c2"], vec![
//!     vec![Value::from(1), Value::from("a")],
//!     vec![Value::from(2), Value::from("b")],
//! ]).unwrap();
//! assert_eq!(view.len(), 2);
//! assert_eq!(view.column_names(), vec!["c1", "c2"]);
//! ```

mod group_key;
mod header;
pub mod operations;
mod record;

pub use group_key::{GroupKey, KeyPart};
pub use header::{FieldNameMatch, Header, HeaderField};
pub use record::{Cell, GroupCell, Record};

use crate::error::{QueryError, QueryResult};
use crate::sql::ast::Expr;
use crate::value::Value;

/// Column projected by SELECT, kept until [`View::fix`] narrows the view.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectedColumn {
    /// Position in the header
    pub index: usize,
    /// Output name (alias, column name or expression text)
    pub name: String,
}

/// 결과 뷰
#[derive(Debug, Clone, PartialEq, Default)]
pub struct View {
    pub(crate) header: Header,
    pub(crate) records: Vec<Record>,
    pub(crate) is_grouped: bool,
    /// Expressions whose values already exist as a column
    pub(crate) materialized: Vec<(Expr, usize)>,
    pub(crate) selected: Option<Vec<SelectedColumn>>,
    /// Catalog table this view was loaded from
    pub(crate) source: Option<String>,
    /// Sort keys of every record after ORDER BY (WITH TIES)
    pub(crate) sort_values: Option<Vec<Vec<Value>>>,
}

impl View {
    /// Build a view, checking that every record matches the header width.
    pub fn new(header: Header, records: Vec<Record>) -> QueryResult<Self> {
        if let Some(bad) = records.iter().find(|r| r.len() != header.len()) {
            return Err(QueryError::FieldLengthNotMatch {
                expected: header.len(),
                actual: bad.len(),
            });
        }
        Ok(Self::from_parts(header, records))
    }

    pub(crate) fn from_parts(header: Header, records: Vec<Record>) -> Self {
        Self {
            header,
            records,
            ..Default::default()
        }
    }

    /// Table view over decoded rows.
    pub fn from_rows<S: AsRef<str>>(qualifier: &str, columns: &[S], rows: Vec<Vec<Value>>) -> QueryResult<Self> {
        let header = Header::from_table(qualifier, columns);
        Self::new(header, rows.into_iter().map(Record::new).collect())
    }

    /// One record, no fields: the source of `SELECT` without `FROM`.
    pub fn dual() -> Self {
        Self::from_parts(Header::default(), vec![Record::new(Vec::new())])
    }

    /// Header without records.
    pub(crate) fn shell(header: Header) -> Self {
        Self::from_parts(header, Vec::new())
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn record(&self, index: usize) -> Option<&Record> {
        self.records.get(index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn field_count(&self) -> usize {
        self.header.len()
    }

    pub fn is_grouped(&self) -> bool {
        self.is_grouped
    }

    pub fn source(&self) -> Option<&str> {
        self.source.as_deref()
    }

    pub fn selected(&self) -> Option<&[SelectedColumn]> {
        self.selected.as_deref()
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.header.column_names()
    }

    /// Rows as plain values; Group Cells contribute their first value.
    pub fn to_rows(&self) -> Vec<Vec<Value>> {
        self.records.iter().map(Record::to_values).collect()
    }

    /// Values of one column by name.
    pub fn column(&self, name: &str) -> QueryResult<Vec<Value>> {
        let index = self.header.field_index(None, name, FieldNameMatch::IgnoreCase)?;
        self.records
            .iter()
            .map(|r| r.value(index).cloned())
            .collect()
    }

    /// Column holding the already computed value of `expr`.
    pub fn materialized_index(&self, expr: &Expr) -> Option<usize> {
        self.materialized
            .iter()
            .rev()
            .find(|(e, _)| e == expr)
            .map(|(_, i)| *i)
    }

    pub(crate) fn set_source(&mut self, name: impl Into<String>) {
        self.source = Some(name.into());
    }

    pub(crate) fn push_materialized(&mut self, expr: Expr, index: usize) {
        self.materialized.push((expr, index));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::col;

    fn table() -> View {
        View::from_rows(
            "t",
            &["c1", "c2"],
            vec![
                vec![Value::from(1), Value::from("a")],
                vec![Value::from(2), Value::from("b")],
            ],
        )
        .unwrap()
    }

    #[test]
    fn width_mismatch_is_rejected() {
        let err = View::from_rows("t", &["c1", "c2"], vec![vec![Value::from(1)]]).unwrap_err();
        assert_eq!(err, QueryError::FieldLengthNotMatch { expected: 2, actual: 1 });
    }

    #[test]
    fn dual_has_one_empty_record() {
        let dual = View::dual();
        assert_eq!(dual.len(), 1);
        assert_eq!(dual.field_count(), 0);
    }

    #[test]
    fn column_values_and_rows() {
        let view = table();
        assert_eq!(view.column("C2").unwrap(), vec![Value::from("a"), Value::from("b")]);
        assert_eq!(view.to_rows()[1], vec![Value::from(2), Value::from("b")]);
        assert!(matches!(view.column("c9"), Err(QueryError::FieldNotExist(_))));
    }

    #[test]
    fn materialized_lookup_prefers_latest() {
        let mut view = table();
        view.push_materialized(col("c1"), 0);
        view.push_materialized(col("c1"), 1);
        assert_eq!(view.materialized_index(&col("c1")), Some(1));
        assert_eq!(view.materialized_index(&col("c2")), None);
    }
}
