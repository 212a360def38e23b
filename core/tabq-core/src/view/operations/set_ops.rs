//! UNION / INTERSECT / EXCEPT
//!
//! 두 입력 모두 fix 된 뷰여야 합니다. 중복 판정은 전체 튜플의 그룹 키로 하며
//! 처음 나타난 레코드를 남깁니다. `ALL` 변형은 다중집합 의미를 따릅니다.

use crate::error::{QueryError, QueryResult};
use crate::sql::ast::SetOperator;
use crate::view::{GroupKey, Record, View};
use ahash::{AHashMap, AHashSet};

fn key(record: &Record) -> GroupKey {
    GroupKey::from_values(&record.to_values())
}

impl View {
    /// Combine two result sets. The header of `self` names the output.
    pub fn combine(&self, op: SetOperator, all: bool, right: &View) -> QueryResult<View> {
        if self.field_count() != right.field_count() {
            return Err(QueryError::CombinedSetFieldLength {
                left: self.field_count(),
                right: right.field_count(),
            });
        }

        let records: Vec<Record> = match (op, all) {
            (SetOperator::Union, true) => self.records.iter().chain(&right.records).cloned().collect(),
            (SetOperator::Union, false) => {
                let mut seen = AHashSet::new();
                self.records
                    .iter()
                    .chain(&right.records)
                    .filter(|r| seen.insert(key(r)))
                    .cloned()
                    .collect()
            }
            (SetOperator::Intersect, false) => {
                let other: AHashSet<GroupKey> = right.records.iter().map(key).collect();
                let mut seen = AHashSet::new();
                self.records
                    .iter()
                    .filter(|r| {
                        let k = key(r);
                        other.contains(&k) && seen.insert(k)
                    })
                    .cloned()
                    .collect()
            }
            (SetOperator::Except, false) => {
                let other: AHashSet<GroupKey> = right.records.iter().map(key).collect();
                let mut seen = AHashSet::new();
                self.records
                    .iter()
                    .filter(|r| {
                        let k = key(r);
                        !other.contains(&k) && seen.insert(k)
                    })
                    .cloned()
                    .collect()
            }
            (SetOperator::Intersect, true) | (SetOperator::Except, true) => {
                let mut counts: AHashMap<GroupKey, usize> = AHashMap::new();
                for r in &right.records {
                    *counts.entry(key(r)).or_default() += 1;
                }
                let keep_matched = op == SetOperator::Intersect;
                self.records
                    .iter()
                    .filter(|r| {
                        let matched = match counts.get_mut(&key(r)) {
                            Some(n) if *n > 0 => {
                                *n -= 1;
                                true
                            }
                            _ => false,
                        };
                        matched == keep_matched
                    })
                    .cloned()
                    .collect()
            }
        };

        tracing::debug!(
            target: "tabq::select",
            ?op,
            all,
            left = self.len(),
            right = right.len(),
            output = records.len(),
            "set operation"
        );
        Ok(View::from_parts(self.header.clone(), records))
    }
}

#[cfg(test)]
mod tests {
    use super::super::testing::{int_rows, table};
    use crate::error::QueryError;
    use crate::sql::ast::SetOperator;
    use crate::value::Value;

    #[test]
    fn union_dedups_keeping_first() {
        let v = table("t", &["c1"], int_rows(&[1, 2, 1]));
        assert_eq!(v.combine(SetOperator::Union, false, &v).unwrap().to_rows(), int_rows(&[1, 2]));
        assert_eq!(v.combine(SetOperator::Union, true, &v).unwrap().len(), 6);
    }

    #[test]
    fn intersect_and_except() {
        let l = table("l", &["c1"], int_rows(&[1, 1, 2, 3]));
        let r = table("r", &["c1"], int_rows(&[1, 3, 4]));
        assert_eq!(l.combine(SetOperator::Intersect, false, &r).unwrap().to_rows(), int_rows(&[1, 3]));
        assert_eq!(l.combine(SetOperator::Intersect, true, &r).unwrap().to_rows(), int_rows(&[1, 3]));
        assert_eq!(l.combine(SetOperator::Except, false, &r).unwrap().to_rows(), int_rows(&[2]));
        assert_eq!(l.combine(SetOperator::Except, true, &r).unwrap().to_rows(), int_rows(&[1, 2]));
    }

    #[test]
    fn nulls_are_equal_for_dedup() {
        let v = table("t", &["c1"], vec![vec![Value::Null], vec![Value::Null]]);
        assert_eq!(v.combine(SetOperator::Union, false, &v).unwrap().len(), 1);
    }

    #[test]
    fn width_mismatch() {
        let l = table("l", &["a"], Vec::new());
        let r = table("r", &["a", "b"], Vec::new());
        assert_eq!(
            l.combine(SetOperator::Union, false, &r).unwrap_err(),
            QueryError::CombinedSetFieldLength { left: 1, right: 2 }
        );
    }
}
