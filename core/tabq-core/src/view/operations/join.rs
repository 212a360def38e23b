//! JOIN
//!
//! 조인 결과의 셀 순서는 항상 왼쪽 다음 오른쪽입니다. USING / NATURAL 조인은
//! 공통 컬럼을 맨 앞에 한 번만 두고 나머지 왼쪽, 나머지 오른쪽 컬럼이 뒤따릅니다.
//! 외부 조인의 빈 쪽은 설정의 blank 값으로 채워집니다.

use crate::error::{QueryError, QueryResult};
use crate::sql::ast::{JoinConstraint, JoinKind};
use crate::sql::eval::evaluate_condition;
use crate::sql::filter::Filter;
use crate::value::{ComparisonOperator, Value};
use crate::view::{Cell, FieldNameMatch, Header, HeaderField, Record, View};
use ahash::AHashSet;

/// Column layout of a join output.
enum Layout {
    /// Left cells then right cells
    Concat,
    /// `(left, right)` positions of the common columns
    Merged(Vec<(usize, usize)>),
}

impl View {
    /// Join `self` (left) with `right`.
    pub fn join(
        &self,
        right: &View,
        kind: JoinKind,
        constraint: &JoinConstraint,
        filter: &Filter<'_>,
    ) -> QueryResult<View> {
        let ctx = filter.context();
        let matching = ctx.field_name_match();
        let blank = ctx.config.blank_value();
        let tz = ctx.timezone();

        let (layout, condition) = match (kind, constraint) {
            (JoinKind::Cross, JoinConstraint::None) => (Layout::Concat, None),
            (JoinKind::Cross, _) => {
                return Err(QueryError::JoinConditionError(
                    "CROSS JOIN does not take a join condition".to_string(),
                ));
            }
            (_, JoinConstraint::None) => {
                return Err(QueryError::JoinConditionError(format!(
                    "{} JOIN requires a join condition",
                    format!("{kind:?}").to_uppercase()
                )));
            }
            (_, JoinConstraint::On(expr)) => (Layout::Concat, Some(expr)),
            (_, JoinConstraint::Using(columns)) => {
                let pairs = columns
                    .iter()
                    .map(|name| {
                        let l = self.header.find_index(None, name, matching)?;
                        let r = right.header.find_index(None, name, matching)?;
                        match (l, r) {
                            (Some(l), Some(r)) => Ok((l, r)),
                            _ => Err(QueryError::JoinConditionError(format!(
                                "column {name} does not exist on both sides of the join"
                            ))),
                        }
                    })
                    .collect::<QueryResult<Vec<_>>>()?;
                (Layout::Merged(pairs), None)
            }
            (_, JoinConstraint::Natural) => (Layout::Merged(natural_pairs(self, right, matching)?), None),
        };

        let candidate_header = Header::merge(&self.header, &right.header);
        let candidate_view = View::shell(candidate_header.clone());
        let matches = |l: &Record, r: &Record| -> QueryResult<bool> {
            match (&layout, condition) {
                (Layout::Concat, None) => Ok(true),
                (Layout::Concat, Some(expr)) => {
                    let candidate = Record::concat(l, r);
                    let scope = filter.with_record(&candidate_view, &candidate);
                    Ok(evaluate_condition(expr, &scope)?.is_true())
                }
                (Layout::Merged(pairs), _) => {
                    for &(li, ri) in pairs {
                        if !ComparisonOperator::Equal.evaluate(l.value(li)?, r.value(ri)?, tz).is_true() {
                            return Ok(false);
                        }
                    }
                    Ok(true)
                }
            }
        };

        let prefer_right = kind == JoinKind::Right;
        let build = |l: Option<&Record>, r: Option<&Record>| -> Record {
            output_record(&layout, self.field_count(), right.field_count(), l, r, prefer_right, &blank)
        };

        // RIGHT JOIN drives from the right side
        let (driver, other) = if prefer_right { (right, self) } else { (self, right) };
        let keep_unmatched_driver = matches!(kind, JoinKind::Left | JoinKind::Right | JoinKind::Full);

        let per_driver = ctx.parallel.map_records(driver.len(), |i| {
            let d = &driver.records[i];
            let mut out = Vec::new();
            let mut matched = Vec::new();
            for (j, o) in other.records.iter().enumerate() {
                let (l, r) = if prefer_right { (o, d) } else { (d, o) };
                if matches(l, r)? {
                    out.push(build(Some(l), Some(r)));
                    matched.push(j);
                }
            }
            if out.is_empty() && keep_unmatched_driver {
                out.push(if prefer_right { build(None, Some(d)) } else { build(Some(d), None) });
            }
            Ok((out, matched))
        })?;

        let mut records = Vec::new();
        let mut matched_right = AHashSet::new();
        for (out, matched) in per_driver {
            records.extend(out);
            if kind == JoinKind::Full {
                matched_right.extend(matched);
            }
        }
        if kind == JoinKind::Full {
            for (j, r) in right.records.iter().enumerate() {
                if !matched_right.contains(&j) {
                    records.push(build(None, Some(r)));
                }
            }
        }

        let header = match &layout {
            Layout::Concat => candidate_header,
            Layout::Merged(pairs) => merged_header(&self.header, &right.header, pairs, prefer_right),
        };

        tracing::debug!(
            target: "tabq::select",
            ?kind,
            left = self.len(),
            right = right.len(),
            output = records.len(),
            "join"
        );
        Ok(View::from_parts(header, records))
    }
}

fn natural_pairs(left: &View, right: &View, matching: FieldNameMatch) -> QueryResult<Vec<(usize, usize)>> {
    let mut pairs = Vec::new();
    for li in left.header.table_field_indices(None) {
        let name = &left.header.fields()[li].column;
        if let Some(ri) = right.header.find_index(None, name, matching)?
            && right.header.fields()[ri].is_from_table
        {
            pairs.push((li, ri));
        }
    }
    Ok(pairs)
}

fn merged_header(left: &Header, right: &Header, pairs: &[(usize, usize)], prefer_right: bool) -> Header {
    let mut fields: Vec<HeaderField> = pairs
        .iter()
        .map(|&(li, ri)| {
            if prefer_right {
                right.fields()[ri].clone()
            } else {
                left.fields()[li].clone()
            }
        })
        .collect();
    fields.extend(
        left.fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| !pairs.iter().any(|p| p.0 == *i))
            .map(|(_, f)| f.clone()),
    );
    fields.extend(
        right
            .fields()
            .iter()
            .enumerate()
            .filter(|(i, _)| !pairs.iter().any(|p| p.1 == *i))
            .map(|(_, f)| f.clone()),
    );
    Header::new(fields)
}

fn output_record(
    layout: &Layout,
    left_width: usize,
    right_width: usize,
    l: Option<&Record>,
    r: Option<&Record>,
    prefer_right: bool,
    blank: &Value,
) -> Record {
    let cell = |record: Option<&Record>, i: usize| -> Cell {
        record
            .and_then(|rec| rec.cell(i).cloned())
            .unwrap_or_else(|| Cell::Value(blank.clone()))
    };
    match layout {
        Layout::Concat => {
            let l = l.cloned().unwrap_or_else(|| Record::padded(left_width, blank));
            let r = r.cloned().unwrap_or_else(|| Record::padded(right_width, blank));
            Record::concat(&l, &r)
        }
        Layout::Merged(pairs) => {
            let mut cells = Vec::with_capacity(left_width + right_width - pairs.len());
            for &(li, ri) in pairs {
                let from_right = match (l, r) {
                    (Some(_), Some(_)) => prefer_right,
                    (None, _) => true,
                    (_, None) => false,
                };
                cells.push(if from_right { cell(r, ri) } else { cell(l, li) });
            }
            cells.extend((0..left_width).filter(|i| !pairs.iter().any(|p| p.0 == *i)).map(|i| cell(l, i)));
            cells.extend((0..right_width).filter(|i| !pairs.iter().any(|p| p.1 == *i)).map(|i| cell(r, i)));
            Record::from_cells(cells, 1)
        }
    }
}
