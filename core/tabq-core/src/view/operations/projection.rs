//! SELECT fields, DISTINCT and fix

use super::map_records;
use crate::error::{QueryError, QueryResult};
use crate::sql::ast::{Expr, SelectField};
use crate::sql::eval::evaluate;
use crate::sql::filter::Filter;
use crate::sql::functions::contains_aggregate;
use crate::value::Value;
use crate::view::{Cell, GroupKey, Header, HeaderField, Record, SelectedColumn, View};
use ahash::AHashSet;

/// Output column before evaluation: an existing column or an expression to compute.
enum Output<'e> {
    Existing(usize),
    Computed(&'e Expr),
}

impl View {
    /// Evaluate select fields and append the computed ones as derived columns.
    ///
    /// Plain column references and already materialized expressions reuse
    /// their column. The projected columns are recorded in `selected` until
    /// [`fix`](Self::fix) narrows the view.
    pub fn select(&self, fields: &[SelectField], filter: &Filter<'_>) -> QueryResult<View> {
        let matching = filter.context().field_name_match();
        let mut outputs: Vec<(Output<'_>, String)> = Vec::with_capacity(fields.len());

        for field in fields {
            match &field.expr {
                Expr::AllColumns(qualifier) => {
                    let indices = self.header.table_field_indices(qualifier.as_deref());
                    if indices.is_empty()
                        && let Some(q) = qualifier
                    {
                        return Err(QueryError::FieldNotExist(format!("{q}.*")));
                    }
                    for index in indices {
                        self.check_not_grouped(index, &field.expr)?;
                        let name = self.header.fields()[index].column.clone();
                        outputs.push((Output::Existing(index), name));
                    }
                }
                Expr::Column(c) => {
                    let name = field.alias.clone().unwrap_or_else(|| c.name.clone());
                    match self.header.find_index(c.qualifier.as_deref(), &c.name, matching)? {
                        Some(index) => {
                            self.check_not_grouped(index, &field.expr)?;
                            outputs.push((Output::Existing(index), name));
                        }
                        None => outputs.push((Output::Computed(&field.expr), name)),
                    }
                }
                expr => {
                    let name = field.alias.clone().unwrap_or_else(|| expr.to_string());
                    match self.materialized_index(expr) {
                        Some(index) => outputs.push((Output::Existing(index), name)),
                        None => outputs.push((Output::Computed(expr), name)),
                    }
                }
            }
        }

        if filter.context().config.strict_column_names {
            let mut seen = AHashSet::with_capacity(outputs.len());
            for (_, name) in &outputs {
                if !seen.insert(name.to_lowercase()) {
                    return Err(QueryError::DuplicateColumnName(name.clone()));
                }
            }
        }

        let computed: Vec<&Expr> = outputs
            .iter()
            .filter_map(|(o, _)| match o {
                Output::Computed(e) => Some(*e),
                Output::Existing(_) => None,
            })
            .collect();
        let values = if computed.is_empty() {
            Vec::new()
        } else {
            map_records(self, filter, |scope, _| {
                computed.iter().map(|e| evaluate(e, scope)).collect::<QueryResult<Vec<Value>>>()
            })?
        };

        let mut view = self.clone();
        view.sort_values = None;
        let mut selected = Vec::with_capacity(outputs.len());
        for (output, name) in outputs {
            let index = match output {
                Output::Existing(index) => index,
                Output::Computed(expr) => {
                    let mut field = HeaderField::derived(name.clone());
                    field.is_aggregate = contains_aggregate(expr);
                    let index = view.header.push_field(field);
                    view.push_materialized(expr.clone(), index);
                    index
                }
            };
            selected.push(SelectedColumn { index, name });
        }
        if !computed.is_empty() {
            for (record, row) in view.records.iter_mut().zip(values) {
                for value in row {
                    record.push(Cell::Value(value));
                }
            }
        }
        view.selected = Some(selected);
        Ok(view)
    }

    fn check_not_grouped(&self, index: usize, expr: &Expr) -> QueryResult<()> {
        if self.is_grouped && !self.header.fields()[index].is_group_key {
            return Err(QueryError::GroupedFieldMisuse {
                expr: expr.to_string(),
                message: "field is not a group key".to_string(),
            });
        }
        Ok(())
    }

    fn output_indices(&self) -> Vec<usize> {
        match &self.selected {
            Some(selected) => selected.iter().map(|s| s.index).collect(),
            None => (0..self.header.len()).collect(),
        }
    }

    /// Remove records whose selected values repeat an earlier record.
    pub fn distinct(&self) -> View {
        let indices = self.output_indices();
        let mut seen = AHashSet::with_capacity(self.len());
        let records = self
            .records
            .iter()
            .filter(|r| {
                let values: Vec<Value> = r
                    .project(&indices)
                    .iter()
                    .map(|c| first_value(c))
                    .collect();
                seen.insert(GroupKey::from_values(&values))
            })
            .cloned()
            .collect();
        let mut view = self.with_records(records);
        view.sort_values = None;
        view
    }

    /// Narrow the view to its selected columns with a fresh header.
    ///
    /// Every column becomes an unqualified table column so the result can be
    /// queried again; grouping and materialization metadata is dropped.
    pub fn fix(self) -> View {
        let indices = self.output_indices();
        let fields = match &self.selected {
            Some(selected) => selected
                .iter()
                .enumerate()
                .map(|(i, s)| HeaderField::table("", s.name.clone(), i + 1))
                .collect(),
            None => self
                .header
                .fields()
                .iter()
                .enumerate()
                .map(|(i, f)| HeaderField::table("", f.column.clone(), i + 1))
                .collect(),
        };
        let records = self
            .records
            .iter()
            .map(|r| Record::new(r.project(&indices).iter().map(first_value).collect()))
            .collect();
        View {
            header: Header::new(fields),
            records,
            ..Default::default()
        }
    }
}

fn first_value(cell: &Cell) -> Value {
    match cell {
        Cell::Value(v) => v.clone(),
        Cell::Group(g) => g.first().cloned().unwrap_or_default(),
    }
}
