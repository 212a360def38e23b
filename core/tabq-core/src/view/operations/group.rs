//! GROUP BY
//!
//! 그룹은 키가 처음 나타난 순서를 유지합니다. 키가 아닌 셀은 원래 행 순서대로
//! 값을 모은 Group Cell이 되고, 키 셀은 단일 값으로 남습니다.

use super::map_records;
use crate::error::QueryResult;
use crate::sql::ast::Expr;
use crate::sql::eval::evaluate;
use crate::sql::filter::Filter;
use crate::value::Value;
use crate::view::{Cell, GroupCell, GroupKey, HeaderField, Record, View};
use ahash::AHashMap;

impl View {
    /// Group records by `keys`.
    pub fn group_by(&self, keys: &[Expr], filter: &Filter<'_>) -> QueryResult<View> {
        if self.is_grouped {
            return self.ungroup().group_by(keys, filter);
        }

        let matching = filter.context().field_name_match();
        // Some(index) for a key that is already a column of this view
        let mut key_columns: Vec<Option<usize>> = Vec::with_capacity(keys.len());
        for key in keys {
            let index = match key {
                Expr::Column(c) => self.header.find_index(c.qualifier.as_deref(), &c.name, matching)?,
                other => self.materialized_index(other),
            };
            key_columns.push(index);
        }

        let key_values = map_records(self, filter, |scope, _| {
            keys.iter().map(|k| evaluate(k, scope)).collect::<QueryResult<Vec<Value>>>()
        })?;

        let mut positions: AHashMap<GroupKey, usize> = AHashMap::new();
        let mut groups: Vec<Vec<usize>> = Vec::new();
        for (i, values) in key_values.iter().enumerate() {
            let next = groups.len();
            let group = *positions.entry(GroupKey::from_values(values)).or_insert(next);
            if group == next {
                groups.push(Vec::new());
            }
            groups[group].push(i);
        }

        let mut header = self.header.clone();
        let mut materialized = self.materialized.clone();
        for index in key_columns.iter().flatten() {
            if let Some(field) = header.field_mut(*index) {
                field.is_group_key = true;
            }
        }
        let computed: Vec<usize> = key_columns
            .iter()
            .enumerate()
            .filter(|(_, c)| c.is_none())
            .map(|(k, _)| k)
            .collect();
        for &k in &computed {
            let mut field = HeaderField::derived(keys[k].to_string());
            field.is_group_key = true;
            let index = header.push_field(field);
            materialized.push((keys[k].clone(), index));
        }

        let records = groups
            .iter()
            .map(|members| {
                let first = members[0];
                let mut cells: Vec<Cell> = (0..self.header.len())
                    .map(|col| {
                        if key_columns.contains(&Some(col)) {
                            Cell::Value(plain(&self.records[first], col))
                        } else {
                            Cell::Group(GroupCell::new(
                                members
                                    .iter()
                                    .map(|&m| plain(&self.records[m], col))
                                    .collect(),
                            ))
                        }
                    })
                    .collect();
                cells.extend(computed.iter().map(|&k| Cell::Value(key_values[first][k].clone())));
                Record::from_cells(cells, members.len())
            })
            .collect::<Vec<_>>();

        tracing::debug!(target: "tabq::select", input = self.len(), groups = records.len(), "group by");
        Ok(View {
            header,
            records,
            is_grouped: true,
            materialized,
            selected: None,
            source: self.source.clone(),
            sort_values: None,
        })
    }

    /// The whole view as one group. An empty view yields one group with
    /// empty Group Cells.
    pub fn group_all(&self) -> View {
        if self.is_grouped {
            return self.clone();
        }
        let cells = (0..self.header.len())
            .map(|col| {
                Cell::Group(GroupCell::new(
                    self.records
                        .iter()
                        .map(|r| plain(r, col))
                        .collect(),
                ))
            })
            .collect();
        View {
            header: self.header.clone(),
            records: vec![Record::from_cells(cells, self.len())],
            is_grouped: true,
            materialized: self.materialized.clone(),
            selected: None,
            source: self.source.clone(),
            sort_values: None,
        }
    }

    /// Expand every group back into its member rows.
    pub(crate) fn ungroup(&self) -> View {
        let mut records = Vec::with_capacity(self.records.iter().map(Record::group_len).sum());
        for record in &self.records {
            for member in 0..record.group_len() {
                records.push(Record::new(
                    record
                        .cells()
                        .iter()
                        .map(|c| c.member(member).cloned().unwrap_or_default())
                        .collect(),
                ));
            }
        }
        let mut header = self.header.clone();
        for i in 0..header.len() {
            if let Some(field) = header.field_mut(i) {
                field.is_group_key = false;
            }
        }
        View {
            header,
            records,
            is_grouped: false,
            materialized: self.materialized.clone(),
            selected: None,
            source: self.source.clone(),
            sort_values: None,
        }
    }
}

fn plain(record: &Record, col: usize) -> Value {
    record.cell(col).and_then(|c| c.member(0)).cloned().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::super::testing::{context, int_rows, table};
    use crate::sql::ast::{col, lit};
    use crate::sql::filter::{Filter, Variables};
    use crate::value::Value;
    use crate::view::{Cell, GroupCell};

    #[test]
    fn groups_in_insertion_order_with_ordered_cells() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table(
            "t",
            &["c1", "c2"],
            vec![
                vec![Value::from(1), Value::from("a")],
                vec![Value::from(1), Value::from("b")],
                vec![Value::from(2), Value::from("c")],
            ],
        );

        let grouped = view.group_by(&[col("c1")], &filter).unwrap();
        assert!(grouped.is_grouped());
        assert_eq!(grouped.len(), 2);
        assert!(grouped.header().field(0).unwrap().is_group_key);
        let first = &grouped.records()[0];
        assert_eq!(first.value(0).unwrap(), &Value::from(1));
        assert_eq!(
            first.cell(1).unwrap(),
            &Cell::Group(GroupCell::new(vec![Value::from("a"), Value::from("b")]))
        );
        assert_eq!(grouped.records()[1].group_len(), 1);
    }

    #[test]
    fn numeric_strings_share_a_group_and_nulls_group_together() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table(
            "t",
            &["c1"],
            vec![vec![Value::from("1")], vec![Value::from(1)], vec![Value::Null], vec![Value::Null]],
        );
        let grouped = view.group_by(&[col("c1")], &filter).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.records()[1].group_len(), 2);
    }

    #[test]
    fn computed_keys_are_appended_and_materialized() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table("t", &["c1"], int_rows(&[1, 2, 3, 4]));
        let key = col("c1") % lit(2);
        let grouped = view.group_by(std::slice::from_ref(&key), &filter).unwrap();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped.field_count(), 2);
        assert_eq!(grouped.materialized_index(&key), Some(1));
        assert_eq!(grouped.records()[0].value(1).unwrap(), &Value::from(1));
    }

    #[test]
    fn regrouping_by_same_keys_keeps_groups() {
        let ctx = context();
        let vars = Variables::new();
        let filter = Filter::new(&ctx, &vars);
        let view = table("t", &["c1"], int_rows(&[3, 1, 3, 2, 1]));
        let once = view.group_by(&[col("c1")], &filter).unwrap();
        let twice = once.group_by(&[col("c1")], &filter).unwrap();
        assert_eq!(once.len(), 3);
        assert_eq!(twice.to_rows(), once.to_rows());
    }

    #[test]
    fn group_all_of_empty_view() {
        let view = table("t", &["c1"], Vec::new());
        let grouped = view.group_all();
        assert_eq!(grouped.len(), 1);
        assert_eq!(grouped.records()[0].group_len(), 0);
        assert_eq!(grouped.records()[0].cell(0).unwrap(), &Cell::Group(GroupCell::default()));
    }
}
