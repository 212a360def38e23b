//! Expression evaluation
//!
//! `evaluate` walks an expression against a [`Filter`]. It never mutates the
//! scanned view: materialized columns (GROUP BY expressions, analytic calls,
//! earlier select fields) are read back instead of being recomputed.

use crate::error::{QueryError, QueryResult};
use crate::sql::ast::{Expr, FunctionCall, IsTest, Quantifier, SelectQuery};
use crate::sql::executor::select::run_query;
use crate::sql::filter::Filter;
use crate::sql::functions::Binding;
use crate::value::{ComparisonOperator, Ternary, Value, arithmetic, concat, negate};
use crate::view::GroupKey;
use ahash::AHashSet;

/// Evaluate `expr` in the scope of `filter`.
pub fn evaluate(expr: &Expr, filter: &Filter<'_>) -> QueryResult<Value> {
    if !is_leaf(expr)
        && let Some(frame) = filter.current()
        && let Some(index) = frame.view.materialized_index(expr)
    {
        return frame.read(index, expr);
    }

    let tz = filter.context().timezone();
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Column(column) => filter.resolve_column(column),
        Expr::AllColumns(_) => Err(QueryError::InvalidArguments(format!(
            "{expr} is only allowed in select fields and COUNT(*)"
        ))),
        Expr::Variable(name) => filter.variables().get(name).cloned(),
        Expr::Arithmetic { left, op, right } => {
            let l = evaluate(left, filter)?;
            let r = evaluate(right, filter)?;
            arithmetic(*op, &l, &r).map_err(|e| e.in_expression(expr))
        }
        Expr::UnaryMinus(inner) => negate(&evaluate(inner, filter)?).map_err(|e| e.in_expression(expr)),
        Expr::Concat(items) => {
            let values = items
                .iter()
                .map(|e| evaluate(e, filter))
                .collect::<QueryResult<Vec<_>>>()?;
            Ok(concat(&values))
        }
        Expr::Comparison { left, op, right } => {
            let l = evaluate(left, filter)?;
            let r = evaluate(right, filter)?;
            Ok(Value::Ternary(op.evaluate(&l, &r, tz)))
        }
        Expr::Is { expr: inner, test, negated } => {
            let value = evaluate(inner, filter)?;
            let holds = match test {
                IsTest::Null => value.is_null(),
                IsTest::True => value.to_ternary() == Ternary::True,
                IsTest::False => value.to_ternary() == Ternary::False,
                IsTest::Unknown => value.to_ternary() == Ternary::Unknown,
            };
            Ok(Value::Ternary(Ternary::from_bool(holds != *negated)))
        }
        Expr::Between { expr: inner, low, high, negated } => {
            let value = evaluate(inner, filter)?;
            let low = evaluate(low, filter)?;
            let high = evaluate(high, filter)?;
            let result = ComparisonOperator::GreaterOrEqual
                .evaluate(&value, &low, tz)
                .and(ComparisonOperator::LessOrEqual.evaluate(&value, &high, tz));
            Ok(Value::Ternary(negate_if(result, *negated)))
        }
        Expr::Like { expr: inner, pattern, negated } => {
            let value = evaluate(inner, filter)?;
            let pattern = evaluate(pattern, filter)?;
            let result = match (value.to_text(), pattern.to_text()) {
                (Some(text), Some(pattern)) => Ternary::from_bool(like_match(&text, &pattern)),
                _ => Ternary::Unknown,
            };
            Ok(Value::Ternary(negate_if(result, *negated)))
        }
        Expr::InList { expr: inner, list, negated } => {
            let value = evaluate(inner, filter)?;
            let candidates = list
                .iter()
                .map(|e| evaluate(e, filter))
                .collect::<QueryResult<Vec<_>>>()?;
            let result = quantify(&value, ComparisonOperator::Equal, Quantifier::Any, &candidates, filter);
            Ok(Value::Ternary(negate_if(result, *negated)))
        }
        Expr::InSubquery { expr: inner, query, negated } => {
            let value = evaluate(inner, filter)?;
            let candidates = subquery_column(query, filter)?;
            let result = quantify(&value, ComparisonOperator::Equal, Quantifier::Any, &candidates, filter);
            Ok(Value::Ternary(negate_if(result, *negated)))
        }
        Expr::Quantified { left, op, quantifier, query } => {
            let value = evaluate(left, filter)?;
            let candidates = subquery_column(query, filter)?;
            Ok(Value::Ternary(quantify(&value, *op, *quantifier, &candidates, filter)))
        }
        Expr::Exists(query) => {
            let view = run_query(query, &filter.create_scope())?;
            Ok(Value::Ternary(Ternary::from_bool(!view.is_empty())))
        }
        Expr::Subquery(query) => {
            let view = run_query(query, &filter.create_scope())?;
            if view.field_count() != 1 {
                return Err(QueryError::SubqueryTooManyFields(query.to_string()));
            }
            match view.records() {
                [] => Ok(Value::Null),
                [record] => Ok(record.to_values().into_iter().next().unwrap_or_default()),
                _ => Err(QueryError::SubqueryTooManyRows(query.to_string())),
            }
        }
        Expr::And(left, right) => {
            let l = evaluate(left, filter)?.to_ternary();
            if l == Ternary::False {
                return Ok(Value::Ternary(Ternary::False));
            }
            let r = evaluate(right, filter)?.to_ternary();
            Ok(Value::Ternary(l.and(r)))
        }
        Expr::Or(left, right) => {
            let l = evaluate(left, filter)?.to_ternary();
            if l == Ternary::True {
                return Ok(Value::Ternary(Ternary::True));
            }
            let r = evaluate(right, filter)?.to_ternary();
            Ok(Value::Ternary(l.or(r)))
        }
        Expr::Not(inner) => Ok(Value::Ternary(!evaluate(inner, filter)?.to_ternary())),
        Expr::Case { operand, branches, else_result } => {
            let operand = operand.as_ref().map(|e| evaluate(e, filter)).transpose()?;
            for (when, then) in branches {
                let when = evaluate(when, filter)?;
                let matched = match &operand {
                    Some(value) => ComparisonOperator::Equal.evaluate(value, &when, tz).is_true(),
                    None => when.to_ternary().is_true(),
                };
                if matched {
                    return evaluate(then, filter);
                }
            }
            match else_result {
                Some(e) => evaluate(e, filter),
                None => Ok(Value::Null),
            }
        }
        Expr::Function(call) => call_function(call, expr, filter),
        Expr::Analytic(_) => Err(QueryError::InvalidArguments(format!(
            "analytic function {expr} is only allowed in select fields and ORDER BY"
        ))),
    }
}

/// Evaluate `expr` as a condition.
pub fn evaluate_condition(expr: &Expr, filter: &Filter<'_>) -> QueryResult<Ternary> {
    Ok(evaluate(expr, filter)?.to_ternary())
}

fn is_leaf(expr: &Expr) -> bool {
    matches!(
        expr,
        Expr::Literal(_) | Expr::Column(_) | Expr::AllColumns(_) | Expr::Variable(_)
    )
}

fn negate_if(t: Ternary, negated: bool) -> Ternary {
    if negated { !t } else { t }
}

fn quantify(
    value: &Value,
    op: ComparisonOperator,
    quantifier: Quantifier,
    candidates: &[Value],
    filter: &Filter<'_>,
) -> Ternary {
    let tz = filter.context().timezone();
    let results = candidates.iter().map(|c| op.evaluate(value, c, tz));
    match quantifier {
        Quantifier::Any => results.fold(Ternary::False, Ternary::or),
        Quantifier::All => results.fold(Ternary::True, Ternary::and),
    }
}

/// Values of the single column produced by a subquery.
fn subquery_column(query: &SelectQuery, filter: &Filter<'_>) -> QueryResult<Vec<Value>> {
    let view = run_query(query, &filter.create_scope())?;
    if view.field_count() != 1 {
        return Err(QueryError::SubqueryTooManyFields(query.to_string()));
    }
    Ok(view
        .records()
        .iter()
        .map(|r| r.to_values().into_iter().next().unwrap_or_default())
        .collect())
}

fn call_function(call: &FunctionCall, expr: &Expr, filter: &Filter<'_>) -> QueryResult<Value> {
    let ctx = filter.context();
    match call.bind(&ctx.functions, false)? {
        Binding::Scalar(function) => {
            let args = evaluate_args(&call.args, filter)?;
            function
                .call(&args, &ctx.function_context())
                .map_err(|e| e.in_expression(expr))
        }
        Binding::UserScalar(udf) => {
            let args = evaluate_args(&call.args, filter)?;
            udf.call(&args).map_err(|e| e.in_expression(expr))
        }
        Binding::Aggregate(function) => aggregate(call, expr, filter, |values, extra| {
            function.apply(values, extra, ctx.timezone())
        }),
        Binding::UserAggregate(udf) => aggregate(call, expr, filter, |values, _| udf.aggregate(values)),
        Binding::Analytic(_) => Err(QueryError::InvalidArguments(format!(
            "analytic function {expr} requires an OVER clause"
        ))),
    }
}

fn evaluate_args(args: &[Expr], filter: &Filter<'_>) -> QueryResult<Vec<Value>> {
    args.iter().map(|a| evaluate(a, filter)).collect()
}

/// Evaluate an aggregate call over the members of the current group.
///
/// The first argument is evaluated once per member; the remaining arguments
/// are constant per group and evaluated once.
fn aggregate(
    call: &FunctionCall,
    expr: &Expr,
    filter: &Filter<'_>,
    apply: impl FnOnce(&[Value], &[Value]) -> QueryResult<Value>,
) -> QueryResult<Value> {
    let frame = filter
        .current()
        .filter(|f| f.view.is_grouped())
        .ok_or_else(|| QueryError::GroupedFieldMisuse {
            expr: expr.to_string(),
            message: "aggregate function is used for records that are not grouped".to_string(),
        })?;
    if frame.member.is_some() {
        return Err(QueryError::GroupedFieldMisuse {
            expr: expr.to_string(),
            message: "aggregate functions cannot be nested".to_string(),
        });
    }

    let group_len = frame.record.group_len();
    if call.is_count_all() {
        return Ok(Value::Integer(group_len as i64));
    }

    let Some((first, rest)) = call.args.split_first() else {
        return Err(QueryError::FunctionArgumentError {
            name: call.name.to_uppercase(),
            expected: "at least 1 argument".to_string(),
        });
    };

    let mut member_scope = filter.clone();
    let mut values = Vec::with_capacity(group_len);
    for member in 0..group_len {
        member_scope.set_member(Some(member));
        values.push(evaluate(first, &member_scope)?);
    }
    if call.distinct {
        let mut seen = AHashSet::with_capacity(values.len());
        values.retain(|v| seen.insert(GroupKey::from_values([v])));
    }

    if group_len == 0 {
        member_scope.set_member(None);
    } else {
        member_scope.set_member(Some(0));
    }
    let extra = evaluate_args(rest, &member_scope)?;

    apply(&values, &extra).map_err(|e| e.in_expression(expr))
}

enum LikeToken {
    AnySequence,
    AnyChar,
    Char(char),
}

fn like_tokens(pattern: &str) -> Vec<LikeToken> {
    let mut tokens = Vec::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        tokens.push(match c {
            '%' => LikeToken::AnySequence,
            '_' => LikeToken::AnyChar,
            '\\' => LikeToken::Char(chars.next().unwrap_or('\\')),
            other => LikeToken::Char(other),
        });
    }
    tokens
}

/// Case-insensitive LIKE with `%`, `_` and `\` escapes.
pub fn like_match(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.to_lowercase().chars().collect();
    let pattern = like_tokens(&pattern.to_lowercase());

    let (mut ti, mut pi) = (0, 0);
    // (pattern index of the last %, text index it currently covers up to)
    let mut backtrack: Option<(usize, usize)> = None;
    while ti < text.len() {
        match pattern.get(pi) {
            Some(LikeToken::AnySequence) => {
                backtrack = Some((pi, ti));
                pi += 1;
            }
            Some(LikeToken::AnyChar) => {
                ti += 1;
                pi += 1;
            }
            Some(LikeToken::Char(c)) if *c == text[ti] => {
                ti += 1;
                pi += 1;
            }
            _ => match backtrack {
                Some((star, covered)) => {
                    pi = star + 1;
                    ti = covered + 1;
                    backtrack = Some((star, covered + 1));
                }
                None => return false,
            },
        }
    }
    pattern[pi..].iter().all(|t| matches!(t, LikeToken::AnySequence))
}
