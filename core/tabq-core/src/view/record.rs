//! Record, Cell and Group Cell

use crate::error::{QueryError, QueryResult};
use crate::value::Value;

/// GROUP BY로 묶인 여러 행의 값 (원래 행 순서 유지)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupCell(Vec<Value>);

impl GroupCell {
    pub fn new(values: Vec<Value>) -> Self {
        Self(values)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[Value] {
        &self.0
    }

    pub fn get(&self, member: usize) -> Option<&Value> {
        self.0.get(member)
    }

    /// Explicit "first value of group" extraction.
    pub fn first(&self) -> Option<&Value> {
        self.0.first()
    }
}

/// 셀: 단일 값 또는 그룹 셀
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Value(Value),
    Group(GroupCell),
}

impl Cell {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Group(_) => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Cell::Group(_))
    }

    /// Value seen by group member `member`. A plain cell is shared by every member.
    pub fn member(&self, member: usize) -> Option<&Value> {
        match self {
            Cell::Value(v) => Some(v),
            Cell::Group(g) => g.get(member),
        }
    }
}

impl From<Value> for Cell {
    fn from(v: Value) -> Self {
        Cell::Value(v)
    }
}

/// 레코드: 헤더와 같은 길이의 셀 시퀀스
///
/// The meaning of each position comes from the owning view's header.
/// `group_len` is the number of source rows collapsed into this record
/// (1 for plain rows).
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    cells: Vec<Cell>,
    group_len: usize,
}

impl Record {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            cells: values.into_iter().map(Cell::Value).collect(),
            group_len: 1,
        }
    }

    /// Every column becomes a Group Cell.
    pub fn new_group(columns: Vec<Vec<Value>>) -> Self {
        let group_len = columns.first().map(Vec::len).unwrap_or(0);
        Self {
            cells: columns.into_iter().map(|c| Cell::Group(GroupCell::new(c))).collect(),
            group_len,
        }
    }

    pub(crate) fn from_cells(cells: Vec<Cell>, group_len: usize) -> Self {
        Self { cells, group_len }
    }

    /// Record of `width` copies of `blank` (outer join padding).
    pub fn padded(width: usize, blank: &Value) -> Self {
        Self::new(vec![blank.clone(); width])
    }

    /// Concatenation of two records (join candidate).
    pub fn concat(left: &Record, right: &Record) -> Self {
        let mut cells = Vec::with_capacity(left.len() + right.len());
        cells.extend(left.cells.iter().cloned());
        cells.extend(right.cells.iter().cloned());
        Self {
            cells,
            group_len: left.group_len.max(right.group_len),
        }
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn group_len(&self) -> usize {
        self.group_len
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, index: usize) -> Option<&Cell> {
        self.cells.get(index)
    }

    /// Plain value at `index`; a Group Cell here is a misuse.
    pub fn value(&self, index: usize) -> QueryResult<&Value> {
        match self.cells.get(index) {
            Some(Cell::Value(v)) => Ok(v),
            Some(Cell::Group(_)) => Err(QueryError::GroupedFieldMisuse {
                expr: format!("field #{}", index + 1),
                message: "grouped field can only be used in an aggregate function".to_string(),
            }),
            None => Err(QueryError::FieldNotExist(format!("field #{}", index + 1))),
        }
    }

    pub(crate) fn push(&mut self, cell: Cell) {
        self.cells.push(cell);
    }

    pub(crate) fn set(&mut self, index: usize, cell: Cell) {
        if let Some(slot) = self.cells.get_mut(index) {
            *slot = cell;
        }
    }

    pub(crate) fn insert_cells(&mut self, at: usize, cells: Vec<Cell>) {
        let at = at.min(self.cells.len());
        self.cells.splice(at..at, cells);
    }

    pub(crate) fn remove_cells(&mut self, indices: &[usize]) {
        let mut i = 0;
        self.cells.retain(|_| {
            let keep = !indices.contains(&i);
            i += 1;
            keep
        });
    }

    /// Values of the given positions; Group Cells contribute their first value.
    pub(crate) fn project(&self, indices: &[usize]) -> Vec<Cell> {
        indices
            .iter()
            .map(|&i| self.cells.get(i).cloned().unwrap_or(Cell::Value(Value::Null)))
            .collect()
    }

    /// Plain values, with Group Cells reduced to their first value.
    pub fn to_values(&self) -> Vec<Value> {
        self.cells
            .iter()
            .map(|c| match c {
                Cell::Value(v) => v.clone(),
                Cell::Group(g) => g.first().cloned().unwrap_or(Value::Null),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_record_keeps_member_order() {
        let record = Record::new_group(vec![
            vec![Value::Integer(1), Value::Integer(1)],
            vec![Value::from("a"), Value::from("b")],
        ]);
        assert_eq!(record.group_len(), 2);
        match record.cell(1).unwrap() {
            Cell::Group(g) => assert_eq!(g.values(), &[Value::from("a"), Value::from("b")]),
            Cell::Value(_) => panic!("expected group cell"),
        }
    }

    #[test]
    fn group_cell_is_not_a_plain_value() {
        let record = Record::new_group(vec![vec![Value::Integer(1)]]);
        assert!(matches!(record.value(0), Err(QueryError::GroupedFieldMisuse { .. })));
        assert_eq!(record.to_values(), vec![Value::Integer(1)]);
    }

    #[test]
    fn plain_cell_is_shared_by_members() {
        let cell = Cell::Value(Value::Integer(7));
        assert_eq!(cell.member(3), Some(&Value::Integer(7)));
        let group = Cell::Group(GroupCell::new(vec![Value::Integer(1)]));
        assert_eq!(group.member(3), None);
    }

    #[test]
    fn alter_cells() {
        let mut record = Record::new(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        record.remove_cells(&[0, 2]);
        record.insert_cells(0, vec![Cell::Value(Value::Null)]);
        assert_eq!(record.to_values(), vec![Value::Null, Value::Integer(2)]);
    }
}
