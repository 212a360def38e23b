//! Statement tree consumed by the executor
//!
//! 파서가 만들어 넘겨주는 구문 트리. `Display`는 정규화된 SQL 텍스트를 만들며
//! 별칭이 없는 select 필드의 기본 컬럼 이름으로 쓰입니다.

mod builder;
mod display;
pub mod visit;

pub use builder::*;

use crate::sql::functions::{Binding, BindingSlot};
use crate::value::{ArithmeticOperator, ComparisonOperator, Value};

/// 컬럼 참조 (`c1`, `t.c1`)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ColumnRef {
    pub qualifier: Option<String>,
    pub name: String,
}

/// `IS [NOT] ...` 검사 대상
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsTest {
    Null,
    True,
    False,
    Unknown,
}

/// ANY / ALL
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Quantifier {
    Any,
    All,
}

/// 표현식
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Column(ColumnRef),
    /// `*` or `t.*`
    AllColumns(Option<String>),
    /// `@name`; stored without the sigil
    Variable(String),
    Arithmetic {
        left: Box<Expr>,
        op: ArithmeticOperator,
        right: Box<Expr>,
    },
    UnaryMinus(Box<Expr>),
    /// `a || b || ...`
    Concat(Vec<Expr>),
    Comparison {
        left: Box<Expr>,
        op: ComparisonOperator,
        right: Box<Expr>,
    },
    Is {
        expr: Box<Expr>,
        test: IsTest,
        negated: bool,
    },
    Between {
        expr: Box<Expr>,
        low: Box<Expr>,
        high: Box<Expr>,
        negated: bool,
    },
    Like {
        expr: Box<Expr>,
        pattern: Box<Expr>,
        negated: bool,
    },
    InList {
        expr: Box<Expr>,
        list: Vec<Expr>,
        negated: bool,
    },
    InSubquery {
        expr: Box<Expr>,
        query: Box<SelectQuery>,
        negated: bool,
    },
    /// `expr op ANY (subquery)` / `expr op ALL (subquery)`
    Quantified {
        left: Box<Expr>,
        op: ComparisonOperator,
        quantifier: Quantifier,
        query: Box<SelectQuery>,
    },
    Exists(Box<SelectQuery>),
    /// Scalar subquery
    Subquery(Box<SelectQuery>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Case {
        operand: Option<Box<Expr>>,
        branches: Vec<(Expr, Expr)>,
        else_result: Option<Box<Expr>>,
    },
    Function(FunctionCall),
    Analytic(AnalyticCall),
}

/// 함수 호출 지점
///
/// The binding is cached per call site (see [`FunctionCall::bind`]).
/// Equality ignores the binding so that materialized expressions still match
/// an unbound copy of the same call.
#[derive(Clone)]
pub struct FunctionCall {
    pub name: String,
    pub distinct: bool,
    pub args: Vec<Expr>,
    pub(crate) binding: BindingSlot,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Self {
            name: name.into(),
            distinct: false,
            args,
            binding: BindingSlot::default(),
        }
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    /// Binding most recently resolved for this call site, if any.
    pub fn binding(&self) -> Option<Binding> {
        self.binding.latest()
    }

    /// `COUNT(*)`
    pub fn is_count_all(&self) -> bool {
        self.name.eq_ignore_ascii_case("COUNT") && matches!(self.args.as_slice(), [Expr::AllColumns(None)])
    }
}

impl PartialEq for FunctionCall {
    fn eq(&self, other: &Self) -> bool {
        self.name.eq_ignore_ascii_case(&other.name) && self.distinct == other.distinct && self.args == other.args
    }
}

impl std::fmt::Debug for FunctionCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionCall")
            .field("name", &self.name)
            .field("distinct", &self.distinct)
            .field("args", &self.args)
            .finish()
    }
}

/// 분석(윈도우) 함수 호출: `func(args) OVER (PARTITION BY ... ORDER BY ...)`
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticCall {
    pub function: FunctionCall,
    pub partition_by: Vec<Expr>,
    pub order_by: Vec<OrderItem>,
}

/// 정렬 방향
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

/// NULL 정렬 위치
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullPosition {
    First,
    Last,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderItem {
    pub expr: Expr,
    pub direction: SortDirection,
    /// `None` means FIRST for ASC and LAST for DESC
    pub nulls: Option<NullPosition>,
}

impl OrderItem {
    pub fn nulls_first(&self) -> bool {
        match self.nulls {
            Some(NullPosition::First) => true,
            Some(NullPosition::Last) => false,
            None => self.direction == SortDirection::Asc,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LimitClause {
    pub count: Expr,
    pub percent: bool,
    pub with_ties: bool,
}

/// 집합 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOperator {
    Union,
    Intersect,
    Except,
}

/// WITH 절의 인라인 테이블
#[derive(Debug, Clone, PartialEq)]
pub struct InlineTable {
    pub name: String,
    /// Optional column rename list
    pub columns: Vec<String>,
    pub query: Box<SelectQuery>,
}

/// SELECT 쿼리
#[derive(Debug, Clone, PartialEq)]
pub struct SelectQuery {
    pub with: Vec<InlineTable>,
    pub body: QueryBody,
    pub order_by: Vec<OrderItem>,
    pub limit: Option<LimitClause>,
    pub offset: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum QueryBody {
    Entity(Box<SelectEntity>),
    SetOperation {
        left: Box<QueryBody>,
        op: SetOperator,
        all: bool,
        right: Box<QueryBody>,
    },
}

/// SELECT ... FROM ... WHERE ... GROUP BY ... HAVING ...
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectEntity {
    pub distinct: bool,
    pub fields: Vec<SelectField>,
    pub from: Vec<TableExpr>,
    pub where_clause: Option<Expr>,
    pub group_by: Vec<Expr>,
    pub having: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SelectField {
    pub expr: Expr,
    pub alias: Option<String>,
}

/// FROM 절 항목
#[derive(Debug, Clone, PartialEq)]
pub enum TableExpr {
    Table { name: String, alias: Option<String> },
    Subquery { query: Box<SelectQuery>, alias: String },
    Join(Box<Join>),
}

/// 조인 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Cross,
    Inner,
    Left,
    Right,
    Full,
}

#[derive(Debug, Clone, PartialEq)]
pub enum JoinConstraint {
    None,
    On(Expr),
    Using(Vec<String>),
    Natural,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Join {
    pub left: TableExpr,
    pub right: TableExpr,
    pub kind: JoinKind,
    pub constraint: JoinConstraint,
}

/// 문장
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    Select(SelectQuery),
    Insert(InsertStatement),
    Update(UpdateStatement),
    Delete(DeleteStatement),
    AlterTable(AlterTableStatement),
    /// `DECLARE @a := 1, @b`
    DeclareVariable(Vec<(String, Option<Expr>)>),
    /// `SET @a = expr`
    SetVariable { name: String, value: Expr },
}

#[derive(Debug, Clone, PartialEq)]
pub enum InsertSource {
    Values(Vec<Vec<Expr>>),
    Query(Box<SelectQuery>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsertStatement {
    pub table: String,
    /// Empty means every column in table order
    pub columns: Vec<String>,
    pub source: InsertSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateStatement {
    pub table: String,
    pub alias: Option<String>,
    pub assignments: Vec<(String, Expr)>,
    pub where_clause: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeleteStatement {
    pub table: String,
    pub alias: Option<String>,
    pub where_clause: Option<Expr>,
}

/// ALTER TABLE ADD 위치
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ColumnPosition {
    First,
    #[default]
    Last,
    After(String),
    Before(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefault {
    pub name: String,
    pub default: Option<Expr>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AlterOperation {
    Add {
        columns: Vec<ColumnDefault>,
        position: ColumnPosition,
    },
    Drop(Vec<String>),
    Rename { from: String, to: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct AlterTableStatement {
    pub table: String,
    pub operation: AlterOperation,
}
