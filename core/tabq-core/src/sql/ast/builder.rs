//! Statement tree builders
//!
//! Convenience constructors for callers that assemble trees by hand
//! (embedders without a parser, tests, benchmarks).

use super::*;
use std::ops;

/// 컬럼 참조
pub fn col(name: &str) -> Expr {
    Expr::Column(ColumnRef {
        qualifier: None,
        name: name.to_string(),
    })
}

/// 테이블 한정 컬럼 참조 (`t.c1`)
pub fn qcol(qualifier: &str, name: &str) -> Expr {
    Expr::Column(ColumnRef {
        qualifier: Some(qualifier.to_string()),
        name: name.to_string(),
    })
}

pub fn lit(value: impl Into<Value>) -> Expr {
    Expr::Literal(value.into())
}

pub fn null() -> Expr {
    Expr::Literal(Value::Null)
}

pub fn var(name: &str) -> Expr {
    Expr::Variable(name.trim_start_matches('@').to_string())
}

pub fn wildcard() -> Expr {
    Expr::AllColumns(None)
}

pub fn func(name: &str, args: Vec<Expr>) -> Expr {
    Expr::Function(FunctionCall::new(name, args))
}

pub fn count_all() -> Expr {
    func("COUNT", vec![wildcard()])
}

pub fn analytic(name: &str, args: Vec<Expr>, partition_by: Vec<Expr>, order_by: Vec<OrderItem>) -> Expr {
    Expr::Analytic(AnalyticCall {
        function: FunctionCall::new(name, args),
        partition_by,
        order_by,
    })
}

pub fn exists(query: SelectQuery) -> Expr {
    Expr::Exists(Box::new(query))
}

pub fn subquery(query: SelectQuery) -> Expr {
    Expr::Subquery(Box::new(query))
}

pub fn case_when(branches: Vec<(Expr, Expr)>, else_result: Option<Expr>) -> Expr {
    Expr::Case {
        operand: None,
        branches,
        else_result: else_result.map(Box::new),
    }
}

impl Expr {
    fn comparison(self, op: ComparisonOperator, rhs: Expr) -> Expr {
        Expr::Comparison {
            left: Box::new(self),
            op,
            right: Box::new(rhs),
        }
    }

    pub fn equal(self, rhs: Expr) -> Expr {
        self.comparison(ComparisonOperator::Equal, rhs)
    }

    pub fn not_equal(self, rhs: Expr) -> Expr {
        self.comparison(ComparisonOperator::NotEqual, rhs)
    }

    pub fn lt(self, rhs: Expr) -> Expr {
        self.comparison(ComparisonOperator::Less, rhs)
    }

    pub fn le(self, rhs: Expr) -> Expr {
        self.comparison(ComparisonOperator::LessOrEqual, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Expr {
        self.comparison(ComparisonOperator::Greater, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Expr {
        self.comparison(ComparisonOperator::GreaterOrEqual, rhs)
    }

    pub fn and(self, rhs: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(rhs))
    }

    pub fn or(self, rhs: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    pub fn is_null(self) -> Expr {
        Expr::Is {
            expr: Box::new(self),
            test: IsTest::Null,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> Expr {
        Expr::Is {
            expr: Box::new(self),
            test: IsTest::Null,
            negated: true,
        }
    }

    pub fn between(self, low: Expr, high: Expr) -> Expr {
        Expr::Between {
            expr: Box::new(self),
            low: Box::new(low),
            high: Box::new(high),
            negated: false,
        }
    }

    pub fn like(self, pattern: Expr) -> Expr {
        Expr::Like {
            expr: Box::new(self),
            pattern: Box::new(pattern),
            negated: false,
        }
    }

    pub fn in_list(self, list: Vec<Expr>) -> Expr {
        Expr::InList {
            expr: Box::new(self),
            list,
            negated: false,
        }
    }

    pub fn in_query(self, query: SelectQuery) -> Expr {
        Expr::InSubquery {
            expr: Box::new(self),
            query: Box::new(query),
            negated: false,
        }
    }

    pub fn any(self, op: ComparisonOperator, query: SelectQuery) -> Expr {
        Expr::Quantified {
            left: Box::new(self),
            op,
            quantifier: Quantifier::Any,
            query: Box::new(query),
        }
    }

    pub fn all(self, op: ComparisonOperator, query: SelectQuery) -> Expr {
        Expr::Quantified {
            left: Box::new(self),
            op,
            quantifier: Quantifier::All,
            query: Box::new(query),
        }
    }

    pub fn concat(self, rhs: Expr) -> Expr {
        match self {
            Expr::Concat(mut items) => {
                items.push(rhs);
                Expr::Concat(items)
            }
            other => Expr::Concat(vec![other, rhs]),
        }
    }

    /// Select field with an alias.
    pub fn alias(self, name: &str) -> SelectField {
        SelectField {
            expr: self,
            alias: Some(name.to_string()),
        }
    }
}

macro_rules! arithmetic_operator {
    ($trait:ident, $method:ident, $op:ident) => {
        impl ops::$trait for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                Expr::Arithmetic {
                    left: Box::new(self),
                    op: ArithmeticOperator::$op,
                    right: Box::new(rhs),
                }
            }
        }
    };
}

arithmetic_operator!(Add, add, Add);
arithmetic_operator!(Sub, sub, Subtract);
arithmetic_operator!(Mul, mul, Multiply);
arithmetic_operator!(Div, div, Divide);
arithmetic_operator!(Rem, rem, Modulo);

impl ops::Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::UnaryMinus(Box::new(self))
    }
}

impl ops::Not for Expr {
    type Output = Expr;

    fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }
}

impl From<Expr> for SelectField {
    fn from(expr: Expr) -> Self {
        SelectField { expr, alias: None }
    }
}

impl OrderItem {
    pub fn asc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Asc,
            nulls: None,
        }
    }

    pub fn desc(expr: Expr) -> Self {
        Self {
            expr,
            direction: SortDirection::Desc,
            nulls: None,
        }
    }

    pub fn nulls(mut self, position: NullPosition) -> Self {
        self.nulls = Some(position);
        self
    }
}

impl TableExpr {
    pub fn table(name: &str) -> Self {
        TableExpr::Table {
            name: name.to_string(),
            alias: None,
        }
    }

    pub fn aliased(name: &str, alias: &str) -> Self {
        TableExpr::Table {
            name: name.to_string(),
            alias: Some(alias.to_string()),
        }
    }

    pub fn subquery(query: SelectQuery, alias: &str) -> Self {
        TableExpr::Subquery {
            query: Box::new(query),
            alias: alias.to_string(),
        }
    }

    pub fn join(self, kind: JoinKind, right: TableExpr, constraint: JoinConstraint) -> Self {
        TableExpr::Join(Box::new(Join {
            left: self,
            right,
            kind,
            constraint,
        }))
    }
}

impl SelectEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn distinct(mut self) -> Self {
        self.distinct = true;
        self
    }

    pub fn field(mut self, field: impl Into<SelectField>) -> Self {
        self.fields.push(field.into());
        self
    }

    pub fn fields(mut self, fields: impl IntoIterator<Item = Expr>) -> Self {
        self.fields.extend(fields.into_iter().map(SelectField::from));
        self
    }

    pub fn from(mut self, table: TableExpr) -> Self {
        self.from.push(table);
        self
    }

    pub fn from_table(self, name: &str) -> Self {
        self.from(TableExpr::table(name))
    }

    pub fn filter(mut self, condition: Expr) -> Self {
        self.where_clause = Some(condition);
        self
    }

    pub fn group_by(mut self, keys: Vec<Expr>) -> Self {
        self.group_by = keys;
        self
    }

    pub fn having(mut self, condition: Expr) -> Self {
        self.having = Some(condition);
        self
    }

    pub fn into_query(self) -> SelectQuery {
        SelectQuery::new(QueryBody::Entity(Box::new(self)))
    }
}

impl QueryBody {
    pub fn combine(self, op: SetOperator, all: bool, right: QueryBody) -> Self {
        QueryBody::SetOperation {
            left: Box::new(self),
            op,
            all,
            right: Box::new(right),
        }
    }
}

impl From<SelectEntity> for QueryBody {
    fn from(entity: SelectEntity) -> Self {
        QueryBody::Entity(Box::new(entity))
    }
}

impl SelectQuery {
    pub fn new(body: QueryBody) -> Self {
        Self {
            with: Vec::new(),
            body,
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn with_table(mut self, name: &str, columns: &[&str], query: SelectQuery) -> Self {
        self.with.push(InlineTable {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            query: Box::new(query),
        });
        self
    }

    pub fn order_by(mut self, items: Vec<OrderItem>) -> Self {
        self.order_by = items;
        self
    }

    pub fn limit(mut self, count: i64) -> Self {
        self.limit = Some(LimitClause {
            count: lit(count),
            percent: false,
            with_ties: false,
        });
        self
    }

    pub fn limit_clause(mut self, count: Expr, percent: bool, with_ties: bool) -> Self {
        self.limit = Some(LimitClause {
            count,
            percent,
            with_ties,
        });
        self
    }

    pub fn offset(mut self, count: i64) -> Self {
        self.offset = Some(lit(count));
        self
    }
}
