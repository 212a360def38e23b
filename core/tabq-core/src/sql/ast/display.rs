//! Canonical SQL text of statement nodes

use super::*;
use std::fmt::{self, Display, Formatter, Write};

fn write_list<T: Display>(f: &mut Formatter<'_>, items: &[T], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_literal(f: &mut Formatter<'_>, value: &Value) -> fmt::Result {
    match value {
        Value::String(s) => {
            f.write_char('\'')?;
            f.write_str(&s.replace('\'', "''"))?;
            f.write_char('\'')
        }
        Value::Datetime(_) => write!(f, "'{value}'"),
        other => write!(f, "{other}"),
    }
}

fn write_operand(f: &mut Formatter<'_>, expr: &Expr, parenthesize: bool) -> fmt::Result {
    if parenthesize { write!(f, "({expr})") } else { write!(f, "{expr}") }
}

fn precedence(op: ArithmeticOperator) -> u8 {
    match op {
        ArithmeticOperator::Add | ArithmeticOperator::Subtract => 1,
        _ => 2,
    }
}

fn child_precedence(child: &Expr) -> Option<u8> {
    match child {
        Expr::Arithmetic { op, .. } => Some(precedence(*op)),
        _ => None,
    }
}

fn not(negated: bool) -> &'static str {
    if negated { "NOT " } else { "" }
}

impl Display for ColumnRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match &self.qualifier {
            Some(q) => write!(f, "{q}.{}", self.name),
            None => f.write_str(&self.name),
        }
    }
}

impl Display for Expr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Literal(v) => write_literal(f, v),
            Expr::Column(c) => write!(f, "{c}"),
            Expr::AllColumns(None) => f.write_str("*"),
            Expr::AllColumns(Some(q)) => write!(f, "{q}.*"),
            Expr::Variable(name) => write!(f, "@{name}"),
            Expr::Arithmetic { left, op, right } => {
                let p = precedence(*op);
                write_operand(f, left, child_precedence(left).is_some_and(|c| c < p))?;
                write!(f, " {op} ")?;
                write_operand(f, right, child_precedence(right).is_some_and(|c| c <= p))
            }
            Expr::UnaryMinus(e) => write!(f, "-{e}"),
            Expr::Concat(items) => write_list(f, items, " || "),
            Expr::Comparison { left, op, right } => write!(f, "{left} {op} {right}"),
            Expr::Is { expr, test, negated } => {
                let test = match test {
                    IsTest::Null => "NULL",
                    IsTest::True => "TRUE",
                    IsTest::False => "FALSE",
                    IsTest::Unknown => "UNKNOWN",
                };
                write!(f, "{expr} IS {}{test}", not(*negated))
            }
            Expr::Between { expr, low, high, negated } => {
                write!(f, "{expr} {}BETWEEN {low} AND {high}", not(*negated))
            }
            Expr::Like { expr, pattern, negated } => write!(f, "{expr} {}LIKE {pattern}", not(*negated)),
            Expr::InList { expr, list, negated } => {
                write!(f, "{expr} {}IN (", not(*negated))?;
                write_list(f, list, ", ")?;
                f.write_char(')')
            }
            Expr::InSubquery { expr, query, negated } => write!(f, "{expr} {}IN ({query})", not(*negated)),
            Expr::Quantified { left, op, quantifier, query } => {
                let q = match quantifier {
                    Quantifier::Any => "ANY",
                    Quantifier::All => "ALL",
                };
                write!(f, "{left} {op} {q} ({query})")
            }
            Expr::Exists(query) => write!(f, "EXISTS ({query})"),
            Expr::Subquery(query) => write!(f, "({query})"),
            Expr::And(l, r) => {
                write_operand(f, l, matches!(**l, Expr::Or(..)))?;
                f.write_str(" AND ")?;
                write_operand(f, r, matches!(**r, Expr::Or(..)))
            }
            Expr::Or(l, r) => write!(f, "{l} OR {r}"),
            Expr::Not(e) => write!(f, "NOT {e}"),
            Expr::Case { operand, branches, else_result } => {
                f.write_str("CASE")?;
                if let Some(op) = operand {
                    write!(f, " {op}")?;
                }
                for (when, then) in branches {
                    write!(f, " WHEN {when} THEN {then}")?;
                }
                if let Some(e) = else_result {
                    write!(f, " ELSE {e}")?;
                }
                f.write_str(" END")
            }
            Expr::Function(call) => write!(f, "{call}"),
            Expr::Analytic(call) => write!(f, "{call}"),
        }
    }
}

impl Display for FunctionCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.name.to_uppercase())?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.args, ", ")?;
        f.write_char(')')
    }
}

impl Display for AnalyticCall {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{} OVER (", self.function)?;
        if !self.partition_by.is_empty() {
            f.write_str("PARTITION BY ")?;
            write_list(f, &self.partition_by, ", ")?;
            if !self.order_by.is_empty() {
                f.write_char(' ')?;
            }
        }
        if !self.order_by.is_empty() {
            f.write_str("ORDER BY ")?;
            write_list(f, &self.order_by, ", ")?;
        }
        f.write_char(')')
    }
}

impl Display for OrderItem {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if self.direction == SortDirection::Desc {
            f.write_str(" DESC")?;
        }
        match self.nulls {
            Some(NullPosition::First) => f.write_str(" NULLS FIRST"),
            Some(NullPosition::Last) => f.write_str(" NULLS LAST"),
            None => Ok(()),
        }
    }
}

impl Display for SelectField {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.expr)?;
        if let Some(alias) = &self.alias {
            write!(f, " AS {alias}")?;
        }
        Ok(())
    }
}

impl Display for TableExpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            TableExpr::Table { name, alias: Some(alias) } => write!(f, "{name} AS {alias}"),
            TableExpr::Table { name, alias: None } => f.write_str(name),
            TableExpr::Subquery { query, alias } => write!(f, "({query}) AS {alias}"),
            TableExpr::Join(join) => {
                let kind = match (join.kind, &join.constraint) {
                    (JoinKind::Cross, _) => "CROSS JOIN",
                    (JoinKind::Inner, JoinConstraint::Natural) => "NATURAL JOIN",
                    (JoinKind::Inner, _) => "INNER JOIN",
                    (JoinKind::Left, JoinConstraint::Natural) => "NATURAL LEFT JOIN",
                    (JoinKind::Left, _) => "LEFT JOIN",
                    (JoinKind::Right, JoinConstraint::Natural) => "NATURAL RIGHT JOIN",
                    (JoinKind::Right, _) => "RIGHT JOIN",
                    (JoinKind::Full, JoinConstraint::Natural) => "NATURAL FULL JOIN",
                    (JoinKind::Full, _) => "FULL JOIN",
                };
                write!(f, "{} {kind} {}", join.left, join.right)?;
                match &join.constraint {
                    JoinConstraint::On(cond) => write!(f, " ON {cond}"),
                    JoinConstraint::Using(cols) => {
                        f.write_str(" USING (")?;
                        write_list(f, cols, ", ")?;
                        f.write_char(')')
                    }
                    JoinConstraint::None | JoinConstraint::Natural => Ok(()),
                }
            }
        }
    }
}

impl Display for SelectEntity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str("SELECT ")?;
        if self.distinct {
            f.write_str("DISTINCT ")?;
        }
        write_list(f, &self.fields, ", ")?;
        if !self.from.is_empty() {
            f.write_str(" FROM ")?;
            write_list(f, &self.from, ", ")?;
        }
        if let Some(cond) = &self.where_clause {
            write!(f, " WHERE {cond}")?;
        }
        if !self.group_by.is_empty() {
            f.write_str(" GROUP BY ")?;
            write_list(f, &self.group_by, ", ")?;
        }
        if let Some(cond) = &self.having {
            write!(f, " HAVING {cond}")?;
        }
        Ok(())
    }
}

impl Display for QueryBody {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            QueryBody::Entity(entity) => write!(f, "{entity}"),
            QueryBody::SetOperation { left, op, all, right } => {
                let op = match op {
                    SetOperator::Union => "UNION",
                    SetOperator::Intersect => "INTERSECT",
                    SetOperator::Except => "EXCEPT",
                };
                let all = if *all { " ALL" } else { "" };
                write!(f, "{left} {op}{all} {right}")
            }
        }
    }
}

impl Display for SelectQuery {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        if !self.with.is_empty() {
            f.write_str("WITH ")?;
            for (i, table) in self.with.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                f.write_str(&table.name)?;
                if !table.columns.is_empty() {
                    f.write_str(" (")?;
                    write_list(f, &table.columns, ", ")?;
                    f.write_char(')')?;
                }
                write!(f, " AS ({})", table.query)?;
            }
            f.write_char(' ')?;
        }
        write!(f, "{}", self.body)?;
        if !self.order_by.is_empty() {
            f.write_str(" ORDER BY ")?;
            write_list(f, &self.order_by, ", ")?;
        }
        if let Some(limit) = &self.limit {
            write!(f, " LIMIT {}", limit.count)?;
            if limit.percent {
                f.write_str(" PERCENT")?;
            }
            if limit.with_ties {
                f.write_str(" WITH TIES")?;
            }
        }
        if let Some(offset) = &self.offset {
            write!(f, " OFFSET {offset}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expression_text() {
        let expr = (col("c1") + lit(1)).gt(lit("a'b"));
        assert_eq!(expr.to_string(), "c1 + 1 > 'a''b'");
        assert_eq!(func("sum", vec![qcol("t", "c2")]).to_string(), "SUM(t.c2)");
        assert_eq!(count_all().to_string(), "COUNT(*)");
        let nested = (col("a") + col("b")) * col("c");
        assert_eq!(nested.to_string(), "(a + b) * c");
    }

    #[test]
    fn query_text() {
        let query = SelectEntity::new()
            .field(col("c1"))
            .from_table("t")
            .filter(col("c1").gt(lit(1)))
            .into_query()
            .order_by(vec![OrderItem::desc(col("c1"))])
            .limit(2);
        assert_eq!(query.to_string(), "SELECT c1 FROM t WHERE c1 > 1 ORDER BY c1 DESC LIMIT 2");
    }

    #[test]
    fn analytic_text() {
        let call = analytic("rank", vec![], vec![col("c1")], vec![OrderItem::asc(col("c2"))]);
        assert_eq!(call.to_string(), "RANK() OVER (PARTITION BY c1 ORDER BY c2)");
    }
}
