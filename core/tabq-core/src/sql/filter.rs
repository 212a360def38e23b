//! Filter: scope stack used to resolve identifiers
//!
//! 프레임은 바깥쪽부터 쌓이고, 해석은 가장 안쪽 프레임 → 변수(한정자 없는 이름만)
//! → 바깥 프레임 순서로 진행합니다. 모호성은 한 프레임 안에서만 보고되며
//! 안쪽 프레임에서 찾은 이름은 바깥 프레임을 가립니다.

use crate::catalog::Catalog;
use crate::config::ExecutionConfig;
use crate::error::{QueryError, QueryResult};
use crate::sql::ast::ColumnRef;
use crate::sql::executor::ParallelQueryExecutor;
use crate::sql::functions::{FunctionContext, FunctionRegistry};
use crate::value::Value;
use crate::view::{Cell, FieldNameMatch, Record, View};
use ahash::AHashMap;
use chrono::{DateTime, FixedOffset};
use std::sync::Arc;

/// Statement-wide execution context shared by every scope.
#[derive(Debug)]
pub struct QueryContext {
    pub config: ExecutionConfig,
    pub catalog: Arc<Catalog>,
    pub functions: Arc<FunctionRegistry>,
    pub parallel: ParallelQueryExecutor,
    /// Timestamp fixed at statement start
    pub now: DateTime<FixedOffset>,
}

impl QueryContext {
    pub fn new(
        config: ExecutionConfig,
        catalog: Arc<Catalog>,
        functions: Arc<FunctionRegistry>,
        parallel: ParallelQueryExecutor,
    ) -> Self {
        let now = config.statement_time();
        Self {
            config,
            catalog,
            functions,
            parallel,
            now,
        }
    }

    pub fn timezone(&self) -> &FixedOffset {
        &self.config.timezone
    }

    pub fn field_name_match(&self) -> FieldNameMatch {
        self.config.field_name_match
    }

    pub fn function_context(&self) -> FunctionContext {
        FunctionContext {
            now: self.now,
            timezone: self.config.timezone,
        }
    }
}

/// 사용자 변수 (`@name`). Names are case-insensitive and stored without the sigil.
#[derive(Debug, Clone, Default)]
pub struct Variables(AHashMap<String, Value>);

impl Variables {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare(&mut self, name: &str, value: Value) -> QueryResult<()> {
        let key = name.to_lowercase();
        if self.0.contains_key(&key) {
            return Err(QueryError::VariableRedeclared(name.to_string()));
        }
        self.0.insert(key, value);
        Ok(())
    }

    pub fn set(&mut self, name: &str, value: Value) -> QueryResult<()> {
        match self.0.get_mut(&name.to_lowercase()) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(QueryError::UndeclaredVariable(name.to_string())),
        }
    }

    pub fn get(&self, name: &str) -> QueryResult<&Value> {
        self.lookup(name)
            .ok_or_else(|| QueryError::UndeclaredVariable(name.to_string()))
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.0.get(&name.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One scope: a view and the record currently being evaluated.
#[derive(Debug, Clone, Copy)]
pub struct ScopeFrame<'a> {
    pub view: &'a View,
    pub record: &'a Record,
    /// Group member seen by Group Cells (inside an aggregate argument)
    pub member: Option<usize>,
}

impl<'a> ScopeFrame<'a> {
    /// Read cell `index` as seen from this frame.
    pub fn read(&self, index: usize, expr: &impl std::fmt::Display) -> QueryResult<Value> {
        match self.record.cell(index) {
            Some(Cell::Value(v)) => Ok(v.clone()),
            Some(Cell::Group(group)) => match self.member {
                Some(m) => Ok(group.get(m).cloned().unwrap_or_default()),
                None => Err(QueryError::GroupedFieldMisuse {
                    expr: expr.to_string(),
                    message: "grouped field can only be used in an aggregate function".to_string(),
                }),
            },
            None => Err(QueryError::FieldNotExist(expr.to_string())),
        }
    }
}

/// 스코프 스택
///
/// A filter is one link of a scope chain: the frames pushed on this link
/// plus a borrowed reference to the enclosing link. Per-record children
/// ([`Filter::with_record`]) borrow their parent instead of copying it.
#[derive(Debug, Clone)]
pub struct Filter<'a> {
    ctx: &'a QueryContext,
    variables: &'a Variables,
    /// Set only on links that introduced inline tables; lookups walk outward
    inline_tables: Option<Arc<AHashMap<String, Arc<View>>>>,
    outer: Option<&'a Filter<'a>>,
    /// Frames of this link, outermost first
    frames: Vec<ScopeFrame<'a>>,
}

impl<'a> Filter<'a> {
    pub fn new(ctx: &'a QueryContext, variables: &'a Variables) -> Self {
        Self {
            ctx,
            variables,
            inline_tables: None,
            outer: None,
            frames: Vec::new(),
        }
    }

    pub fn context(&self) -> &'a QueryContext {
        self.ctx
    }

    pub fn variables(&self) -> &'a Variables {
        self.variables
    }

    pub fn push(&mut self, frame: ScopeFrame<'a>) {
        self.frames.push(frame);
    }

    /// Pop a frame pushed on this link; enclosing links are never popped.
    pub fn pop(&mut self) -> Option<ScopeFrame<'a>> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len() + self.outer.map_or(0, Filter::depth)
    }

    /// Innermost frame.
    pub fn current(&self) -> Option<&ScopeFrame<'a>> {
        match self.frames.last() {
            Some(frame) => Some(frame),
            None => self.outer.and_then(Filter::current),
        }
    }

    /// Every visible frame, innermost first.
    fn frames_inward_out(&self) -> impl Iterator<Item = &ScopeFrame<'a>> + '_ {
        std::iter::successors(Some(self), |link| link.outer).flat_map(|link| link.frames.iter().rev())
    }

    /// Child scope evaluating `record` of `view`.
    pub fn with_record<'b>(&'b self, view: &'b View, record: &'b Record) -> Filter<'b>
    where
        'a: 'b,
    {
        Filter {
            ctx: self.ctx,
            variables: self.variables,
            inline_tables: None,
            outer: Some(self),
            frames: vec![ScopeFrame {
                view,
                record,
                member: None,
            }],
        }
    }

    /// Scope for a nested query: current frames become outer frames.
    pub fn create_scope(&self) -> Filter<'a> {
        self.clone()
    }

    /// Select the group member seen by the innermost frame of this link.
    pub fn set_member(&mut self, member: Option<usize>) {
        if let Some(frame) = self.frames.last_mut() {
            frame.member = member;
        }
    }

    fn visible_inline_tables(&self) -> Option<&Arc<AHashMap<String, Arc<View>>>> {
        std::iter::successors(Some(self), |link| link.outer).find_map(|link| link.inline_tables.as_ref())
    }

    /// Scope with additional inline tables (WITH clause); later names shadow.
    pub fn with_inline_tables(&self, tables: Vec<(String, View)>) -> Filter<'a> {
        let mut child = self.clone();
        if !tables.is_empty() {
            let mut map = self.visible_inline_tables().map(|m| (**m).clone()).unwrap_or_default();
            for (name, view) in tables {
                map.insert(name.to_lowercase(), Arc::new(view));
            }
            child.inline_tables = Some(Arc::new(map));
        }
        child
    }

    pub fn inline_table(&self, name: &str) -> Option<Arc<View>> {
        self.visible_inline_tables()?.get(&name.to_lowercase()).cloned()
    }

    /// Resolve a column reference.
    pub fn resolve_column(&self, column: &ColumnRef) -> QueryResult<Value> {
        let qualifier = column.qualifier.as_deref();
        let matching = self.ctx.field_name_match();
        let display = ColumnDisplay(column);

        let mut frames = self.frames_inward_out();
        if let Some(frame) = frames.next()
            && let Some(index) = frame.view.header.find_index(qualifier, &column.name, matching)?
        {
            return frame.read(index, &display);
        }
        if qualifier.is_none()
            && let Some(value) = self.variables.lookup(&column.name)
        {
            return Ok(value.clone());
        }
        for frame in frames {
            if let Some(index) = frame.view.header.find_index(qualifier, &column.name, matching)? {
                return frame.read(index, &display);
            }
        }
        Err(QueryError::FieldNotExist(display.to_string()))
    }
}

struct ColumnDisplay<'c>(&'c ColumnRef);

impl std::fmt::Display for ColumnDisplay<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.0.qualifier {
            Some(q) => write!(f, "{q}.{}", self.0.name),
            None => f.write_str(&self.0.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{Header, HeaderField};

    fn context() -> QueryContext {
        QueryContext::new(
            ExecutionConfig::default(),
            Arc::new(Catalog::new()),
            Arc::new(FunctionRegistry::new()),
            ParallelQueryExecutor::new(),
        )
    }

    fn column(qualifier: Option<&str>, name: &str) -> ColumnRef {
        ColumnRef {
            qualifier: qualifier.map(str::to_string),
            name: name.to_string(),
        }
    }

    #[test]
    fn innermost_frame_shadows_outer() {
        let ctx = context();
        let vars = Variables::new();
        let outer = View::from_rows("a", &["c1", "c2"], vec![vec![Value::from(1), Value::from(2)]]).unwrap();
        let inner = View::from_rows("b", &["c1"], vec![vec![Value::from(10)]]).unwrap();

        let base = Filter::new(&ctx, &vars);
        let outer_scope = base.with_record(&outer, &outer.records[0]);
        let scope = outer_scope.create_scope();
        let scope = scope.with_record(&inner, &inner.records[0]);

        assert_eq!(scope.resolve_column(&column(None, "c1")).unwrap(), Value::from(10));
        assert_eq!(scope.resolve_column(&column(None, "c2")).unwrap(), Value::from(2));
        assert_eq!(scope.resolve_column(&column(Some("a"), "c1")).unwrap(), Value::from(1));
        assert!(matches!(
            scope.resolve_column(&column(None, "c3")),
            Err(QueryError::FieldNotExist(_))
        ));
    }

    #[test]
    fn ambiguity_is_reported_within_one_frame() {
        let ctx = context();
        let vars = Variables::new();
        let header = Header::merge(&Header::from_table("a", &["c1"]), &Header::from_table("b", &["c1"]));
        let view = View::new(header, vec![Record::new(vec![Value::from(1), Value::from(2)])]).unwrap();
        let base = Filter::new(&ctx, &vars);
        let scope = base.with_record(&view, &view.records[0]);
        assert_eq!(
            scope.resolve_column(&column(None, "c1")).unwrap_err(),
            QueryError::FieldAmbiguous("c1".to_string())
        );
        assert_eq!(scope.resolve_column(&column(Some("b"), "c1")).unwrap(), Value::from(2));
    }

    #[test]
    fn variables_resolve_between_inner_and_outer_frames() {
        let ctx = context();
        let mut vars = Variables::new();
        vars.declare("limit", Value::from(5)).unwrap();
        assert!(matches!(vars.declare("LIMIT", Value::Null), Err(QueryError::VariableRedeclared(_))));
        assert!(matches!(vars.set("other", Value::Null), Err(QueryError::UndeclaredVariable(_))));

        let outer = View::from_rows("a", &["limit"], vec![vec![Value::from(1)]]).unwrap();
        let inner = View::from_rows("b", &["x"], vec![vec![Value::from(0)]]).unwrap();
        let base = Filter::new(&ctx, &vars);
        let outer_scope = base.with_record(&outer, &outer.records[0]);
        let scope = outer_scope.with_record(&inner, &inner.records[0]);
        assert_eq!(scope.resolve_column(&column(None, "limit")).unwrap(), Value::from(5));
    }

    #[test]
    fn group_cells_need_a_member() {
        let ctx = context();
        let vars = Variables::new();
        let mut field = HeaderField::table("t", "c1", 1);
        field.is_group_key = false;
        let mut view = View::new(
            Header::new(vec![field]),
            vec![Record::new_group(vec![vec![Value::from(1), Value::from(2)]])],
        )
        .unwrap();
        view.is_grouped = true;

        let base = Filter::new(&ctx, &vars);
        let mut scope = base.with_record(&view, &view.records[0]);
        assert!(matches!(
            scope.resolve_column(&column(None, "c1")),
            Err(QueryError::GroupedFieldMisuse { .. })
        ));
        scope.set_member(Some(1));
        assert_eq!(scope.resolve_column(&column(None, "c1")).unwrap(), Value::from(2));
    }

    #[test]
    fn record_children_borrow_the_enclosing_chain() {
        let ctx = context();
        let vars = Variables::new();
        let outer = View::from_rows("a", &["c1", "c2"], vec![vec![Value::from(1), Value::from(2)]]).unwrap();
        let inner = View::from_rows("b", &["c1"], vec![vec![Value::from(10)], vec![Value::from(20)]]).unwrap();

        let base = Filter::new(&ctx, &vars);
        let with = base.with_inline_tables(vec![("w".to_string(), View::dual())]);
        let outer_scope = with.with_record(&outer, &outer.records[0]);
        assert_eq!(outer_scope.depth(), 1);

        let mut scope = outer_scope.create_scope();
        for (record, expected) in inner.records.iter().zip([10, 20]) {
            scope.push(ScopeFrame {
                view: &inner,
                record,
                member: None,
            });
            assert_eq!(scope.depth(), 2);
            assert_eq!(scope.resolve_column(&column(None, "c1")).unwrap(), Value::from(expected));
            assert_eq!(scope.resolve_column(&column(None, "c2")).unwrap(), Value::from(2));
            scope.pop();
        }
        assert_eq!(scope.depth(), 1);

        let child = outer_scope.with_record(&inner, &inner.records[1]);
        assert_eq!(child.depth(), 2);
        assert_eq!(child.current().map(|f| f.view.len()), Some(2));
        assert!(child.inline_table("W").is_some());
        assert_eq!(child.resolve_column(&column(Some("a"), "c1")).unwrap(), Value::from(1));
    }

    #[test]
    fn inline_tables_are_case_insensitive() {
        let ctx = context();
        let vars = Variables::new();
        let base = Filter::new(&ctx, &vars);
        let scope = base.with_inline_tables(vec![("Recent".to_string(), View::dual())]);
        assert!(scope.inline_table("recent").is_some());
        assert!(base.inline_table("recent").is_none());
    }
}
