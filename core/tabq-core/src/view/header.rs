//! Header: ordered column attributes of a view
//!
//! The position in `fields` is the only source of truth for a column's index.
//! `index` is derived from `fields` and rebuilt after every structural change.

use crate::error::{QueryError, QueryResult};
use ahash::AHashMap;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

/// 컬럼 이름 매칭 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldNameMatch {
    /// Column names match regardless of case
    #[default]
    IgnoreCase,
    /// Column names must match exactly
    Exact,
}

/// 헤더의 컬럼 속성
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HeaderField {
    /// Table qualifier (alias or table name); empty for derived columns
    pub view: String,
    pub column: String,
    /// 1-based position in the source table, 0 for derived columns
    pub number: usize,
    pub is_from_table: bool,
    pub is_group_key: bool,
    /// Derived from an aggregate function
    pub is_aggregate: bool,
}

impl HeaderField {
    pub fn table(view: impl Into<String>, column: impl Into<String>, number: usize) -> Self {
        Self {
            view: view.into(),
            column: column.into(),
            number,
            is_from_table: true,
            ..Default::default()
        }
    }

    pub fn derived(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ..Default::default()
        }
    }

    /// `view.column`, or `column` for derived fields.
    pub fn display_name(&self) -> String {
        if self.view.is_empty() {
            self.column.clone()
        } else {
            format!("{}.{}", self.view, self.column)
        }
    }
}

/// 뷰 헤더
#[derive(Debug, Clone, Default)]
pub struct Header {
    fields: Vec<HeaderField>,
    /// lower-cased column name → positions
    index: AHashMap<String, SmallVec<[usize; 2]>>,
}

impl PartialEq for Header {
    fn eq(&self, other: &Self) -> bool {
        self.fields == other.fields
    }
}

impl Header {
    pub fn new(fields: Vec<HeaderField>) -> Self {
        let mut header = Self {
            fields,
            index: AHashMap::new(),
        };
        header.rebuild_index();
        header
    }

    /// Header of a table loaded by a reader.
    pub fn from_table<S: AsRef<str>>(qualifier: &str, columns: &[S]) -> Self {
        Self::new(
            columns
                .iter()
                .enumerate()
                .map(|(i, c)| HeaderField::table(qualifier, c.as_ref(), i + 1))
                .collect(),
        )
    }

    /// Header made only of derived (unqualified) columns.
    pub fn derived<S: AsRef<str>>(columns: &[S]) -> Self {
        Self::new(columns.iter().map(|c| HeaderField::derived(c.as_ref())).collect())
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (i, field) in self.fields.iter().enumerate() {
            self.index
                .entry(field.column.to_lowercase())
                .or_default()
                .push(i);
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn fields(&self) -> &[HeaderField] {
        &self.fields
    }

    pub fn field(&self, index: usize) -> Option<&HeaderField> {
        self.fields.get(index)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.column.as_str()).collect()
    }

    /// Look up a column.
    ///
    /// `Ok(None)` when nothing matches, `FieldAmbiguous` when several
    /// columns match. Qualifiers always match case-insensitively.
    pub fn find_index(
        &self,
        qualifier: Option<&str>,
        name: &str,
        matching: FieldNameMatch,
    ) -> QueryResult<Option<usize>> {
        let Some(candidates) = self.index.get(&name.to_lowercase()) else {
            return Ok(None);
        };

        let mut found: Option<usize> = None;
        for &i in candidates {
            let field = &self.fields[i];
            if matching == FieldNameMatch::Exact && field.column != name {
                continue;
            }
            if let Some(q) = qualifier
                && !field.view.eq_ignore_ascii_case(q)
            {
                continue;
            }
            if found.is_some() {
                return Err(QueryError::FieldAmbiguous(reference_name(qualifier, name)));
            }
            found = Some(i);
        }
        Ok(found)
    }

    /// Like [`find_index`](Self::find_index) but a missing column is `FieldNotExist`.
    pub fn field_index(
        &self,
        qualifier: Option<&str>,
        name: &str,
        matching: FieldNameMatch,
    ) -> QueryResult<usize> {
        self.find_index(qualifier, name, matching)?
            .ok_or_else(|| QueryError::FieldNotExist(reference_name(qualifier, name)))
    }

    /// Positions of table columns, optionally restricted to one qualifier (`t.*`).
    pub fn table_field_indices(&self, qualifier: Option<&str>) -> Vec<usize> {
        self.fields
            .iter()
            .enumerate()
            .filter(|(_, f)| f.is_from_table)
            .filter(|(_, f)| qualifier.is_none_or(|q| f.view.eq_ignore_ascii_case(q)))
            .map(|(i, _)| i)
            .collect()
    }

    /// New header with `fields` appended.
    pub fn append(&self, fields: impl IntoIterator<Item = HeaderField>) -> Header {
        let mut all = self.fields.clone();
        all.extend(fields);
        Header::new(all)
    }

    /// Concatenation of two headers (join).
    pub fn merge(left: &Header, right: &Header) -> Header {
        left.append(right.fields.iter().cloned())
    }

    /// New header made of the given positions.
    pub fn project(&self, indices: &[usize]) -> Header {
        Header::new(indices.iter().filter_map(|&i| self.fields.get(i).cloned()).collect())
    }

    /// Retag every table column with a new qualifier (table alias).
    pub fn update_qualifier(&mut self, alias: &str) {
        for field in self.fields.iter_mut().filter(|f| f.is_from_table) {
            field.view = alias.to_string();
        }
    }

    pub(crate) fn push_field(&mut self, field: HeaderField) -> usize {
        self.fields.push(field);
        self.rebuild_index();
        self.fields.len() - 1
    }

    pub(crate) fn field_mut(&mut self, index: usize) -> Option<&mut HeaderField> {
        self.fields.get_mut(index)
    }

    /// ALTER TABLE ADD: insert fields at `at`, renumbering table columns.
    pub(crate) fn insert_fields(&mut self, at: usize, fields: Vec<HeaderField>) {
        let at = at.min(self.fields.len());
        self.fields.splice(at..at, fields);
        self.renumber();
    }

    /// ALTER TABLE DROP.
    pub(crate) fn remove_fields(&mut self, indices: &[usize]) {
        let mut i = 0;
        self.fields.retain(|_| {
            let keep = !indices.contains(&i);
            i += 1;
            keep
        });
        self.renumber();
    }

    /// ALTER TABLE RENAME.
    pub(crate) fn rename_field(&mut self, index: usize, name: &str) {
        if let Some(field) = self.fields.get_mut(index) {
            field.column = name.to_string();
        }
        self.rebuild_index();
    }

    fn renumber(&mut self) {
        let mut number = 0;
        for field in self.fields.iter_mut().filter(|f| f.is_from_table) {
            number += 1;
            field.number = number;
        }
        self.rebuild_index();
    }
}

fn reference_name(qualifier: Option<&str>, name: &str) -> String {
    match qualifier {
        Some(q) => format!("{q}.{name}"),
        None => name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_by_default() {
        let header = Header::from_table("t", &["Id", "name"]);
        assert_eq!(header.field_index(None, "id", FieldNameMatch::IgnoreCase).unwrap(), 0);
        assert_eq!(header.field_index(Some("T"), "NAME", FieldNameMatch::IgnoreCase).unwrap(), 1);
        assert!(matches!(
            header.field_index(None, "id", FieldNameMatch::Exact),
            Err(QueryError::FieldNotExist(_))
        ));
    }

    #[test]
    fn duplicate_names_are_ambiguous_only_when_unqualified() {
        let header = Header::merge(
            &Header::from_table("a", &["c1", "c2"]),
            &Header::from_table("b", &["c1"]),
        );
        assert!(matches!(
            header.field_index(None, "c1", FieldNameMatch::IgnoreCase),
            Err(QueryError::FieldAmbiguous(_))
        ));
        assert_eq!(header.field_index(Some("b"), "c1", FieldNameMatch::IgnoreCase).unwrap(), 2);
        assert_eq!(header.field_index(None, "c2", FieldNameMatch::IgnoreCase).unwrap(), 1);
    }

    #[test]
    fn index_rebuilt_after_alter() {
        let mut header = Header::from_table("t", &["a", "b", "c"]);
        header.remove_fields(&[1]);
        assert_eq!(header.field_index(None, "c", FieldNameMatch::IgnoreCase).unwrap(), 1);
        assert_eq!(header.field(1).unwrap().number, 2);

        header.insert_fields(0, vec![HeaderField::table("t", "z", 0)]);
        assert_eq!(header.field_index(None, "z", FieldNameMatch::IgnoreCase).unwrap(), 0);
        assert_eq!(header.field(2).unwrap().number, 3);

        header.rename_field(0, "first");
        assert!(header.find_index(None, "z", FieldNameMatch::IgnoreCase).unwrap().is_none());
        assert_eq!(header.field_index(None, "first", FieldNameMatch::IgnoreCase).unwrap(), 0);
    }

    #[test]
    fn table_fields_by_qualifier() {
        let mut header = Header::merge(
            &Header::from_table("a", &["c1"]),
            &Header::from_table("b", &["c2", "c3"]),
        );
        header.push_field(HeaderField::derived("expr"));
        assert_eq!(header.table_field_indices(None), vec![0, 1, 2]);
        assert_eq!(header.table_field_indices(Some("B")), vec![1, 2]);
    }
}
