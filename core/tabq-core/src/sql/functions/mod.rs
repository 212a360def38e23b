//! Function registry
//!
//! 이름(대문자) → 함수 정의. 각 호출 지점은 실행 전에 한 번 바인딩되며
//! 이후 평가는 바인딩된 구현을 직접 호출합니다. 사용자 정의 함수만
//! 런타임에 등록/조회됩니다.
//!
//! 캐시된 바인딩은 레지스트리 id와 등록 세대(generation)로 표시되므로
//! 다른 레지스트리에서 실행하거나 UDF를 다시 등록하면 새로 바인딩됩니다.

mod aggregate;
mod analytic;
mod scalar;
mod udf;

pub use aggregate::AggregateFunction;
pub use analytic::AnalyticFunction;
pub use scalar::{FunctionContext, ScalarFunction};
pub use udf::{AggregateState, AggregateUdf, ScalarUdf};

use crate::error::{QueryError, QueryResult};
use crate::sql::ast::{Expr, FunctionCall, visit};
use ahash::AHashMap;
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

static NEXT_REGISTRY_ID: AtomicU64 = AtomicU64::new(1);

/// 인자 개수 제약
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Range(usize, usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(self, n: usize) -> bool {
        match self {
            Arity::Exact(e) => n == e,
            Arity::Range(lo, hi) => (lo..=hi).contains(&n),
            Arity::AtLeast(lo) => n >= lo,
        }
    }

    pub fn check(self, name: &str, n: usize) -> QueryResult<()> {
        if self.accepts(n) {
            Ok(())
        } else {
            Err(QueryError::FunctionArgumentError {
                name: name.to_uppercase(),
                expected: self.to_string(),
            })
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plural = |n: usize| if n == 1 { "" } else { "s" };
        match *self {
            Arity::Exact(n) => write!(f, "exactly {n} argument{}", plural(n)),
            Arity::Range(lo, hi) => write!(f, "{lo} to {hi} arguments"),
            Arity::AtLeast(n) => write!(f, "at least {n} argument{}", plural(n)),
        }
    }
}

/// 내장 함수 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    Scalar(ScalarFunction),
    Aggregate(AggregateFunction),
    Analytic(AnalyticFunction),
}

#[derive(Debug, Clone, Copy)]
pub struct FunctionDef {
    pub name: &'static str,
    pub arity: Arity,
    pub kind: FunctionKind,
}

/// 호출 지점에 캐시되는 바인딩
#[derive(Clone)]
pub enum Binding {
    Scalar(ScalarFunction),
    Aggregate(AggregateFunction),
    Analytic(AnalyticFunction),
    UserScalar(Arc<ScalarUdf>),
    UserAggregate(Arc<AggregateUdf>),
}

impl Binding {
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Binding::Aggregate(_) | Binding::UserAggregate(_))
    }
}

impl fmt::Debug for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Binding::Scalar(func) => write!(f, "Scalar({func:?})"),
            Binding::Aggregate(func) => write!(f, "Aggregate({func:?})"),
            Binding::Analytic(func) => write!(f, "Analytic({func:?})"),
            Binding::UserScalar(udf) => write!(f, "UserScalar({})", udf.name()),
            Binding::UserAggregate(udf) => write!(f, "UserAggregate({})", udf.name()),
        }
    }
}

/// Registry identity plus its registration generation at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct RegistryStamp {
    id: u64,
    generation: u64,
}

/// 호출 지점의 바인딩 캐시
#[derive(Default)]
pub(crate) struct BindingSlot(RwLock<Option<(RegistryStamp, Binding)>>);

impl BindingSlot {
    fn get(&self, stamp: RegistryStamp) -> Option<Binding> {
        match &*self.0.read() {
            Some((cached, binding)) if *cached == stamp => Some(binding.clone()),
            _ => None,
        }
    }

    /// Most recent binding regardless of the registry that produced it.
    pub(crate) fn latest(&self) -> Option<Binding> {
        self.0.read().as_ref().map(|(_, binding)| binding.clone())
    }

    fn store(&self, stamp: RegistryStamp, binding: Binding) {
        *self.0.write() = Some((stamp, binding));
    }
}

impl Clone for BindingSlot {
    fn clone(&self) -> Self {
        Self(RwLock::new(self.0.read().clone()))
    }
}

/// 함수 레지스트리
pub struct FunctionRegistry {
    id: u64,
    generation: AtomicU64,
    builtins: AHashMap<&'static str, Vec<FunctionDef>>,
    scalar_udfs: RwLock<AHashMap<String, Arc<ScalarUdf>>>,
    aggregate_udfs: RwLock<AHashMap<String, Arc<AggregateUdf>>>,
}

impl FunctionRegistry {
    /// Registry with every built-in function.
    pub fn new() -> Self {
        let mut builtins: AHashMap<&'static str, Vec<FunctionDef>> = AHashMap::new();
        let defs = scalar::definitions()
            .into_iter()
            .chain(aggregate::definitions())
            .chain(analytic::definitions());
        for def in defs {
            builtins.entry(def.name).or_default().push(def);
        }
        Self {
            id: NEXT_REGISTRY_ID.fetch_add(1, Ordering::Relaxed),
            generation: AtomicU64::new(0),
            builtins,
            scalar_udfs: RwLock::new(AHashMap::new()),
            aggregate_udfs: RwLock::new(AHashMap::new()),
        }
    }

    /// Register a user scalar function; replaces one with the same name.
    pub fn register_scalar(&self, udf: ScalarUdf) {
        self.scalar_udfs.write().insert(udf.name().to_uppercase(), Arc::new(udf));
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Register a user aggregate function; replaces one with the same name.
    pub fn register_aggregate(&self, udf: AggregateUdf) {
        self.aggregate_udfs.write().insert(udf.name().to_uppercase(), Arc::new(udf));
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn stamp(&self) -> RegistryStamp {
        RegistryStamp {
            id: self.id,
            generation: self.generation.load(Ordering::Acquire),
        }
    }

    /// True when `name` is a built-in or user function.
    pub fn contains(&self, name: &str) -> bool {
        let upper = name.to_uppercase();
        self.builtins.contains_key(upper.as_str())
            || self.scalar_udfs.read().contains_key(&upper)
            || self.aggregate_udfs.read().contains_key(&upper)
    }

    /// Resolve a call site.
    ///
    /// `over` is true when the call is wrapped by an `OVER (...)` clause; in
    /// that case analytic functions and aggregates qualify, otherwise scalar
    /// functions and aggregates do.
    pub fn resolve(&self, name: &str, argc: usize, over: bool) -> QueryResult<Binding> {
        let upper = name.to_uppercase();

        if let Some(defs) = self.builtins.get(upper.as_str()) {
            let def = defs
                .iter()
                .find(|d| match d.kind {
                    FunctionKind::Analytic(_) => over,
                    FunctionKind::Scalar(_) => !over,
                    FunctionKind::Aggregate(_) => true,
                })
                .ok_or_else(|| {
                    QueryError::InvalidArguments(if over {
                        format!("function {upper} cannot be used as an analytic function")
                    } else {
                        format!("analytic function {upper} requires an OVER clause")
                    })
                })?;
            def.arity.check(&upper, argc)?;
            return Ok(match def.kind {
                FunctionKind::Scalar(f) => Binding::Scalar(f),
                FunctionKind::Aggregate(f) => Binding::Aggregate(f),
                FunctionKind::Analytic(f) => Binding::Analytic(f),
            });
        }

        if let Some(udf) = self.aggregate_udfs.read().get(&upper) {
            udf.arity().check(&upper, argc)?;
            return Ok(Binding::UserAggregate(Arc::clone(udf)));
        }
        if !over && let Some(udf) = self.scalar_udfs.read().get(&upper) {
            udf.arity().check(&upper, argc)?;
            return Ok(Binding::UserScalar(Arc::clone(udf)));
        }

        Err(QueryError::FunctionNotExist(upper))
    }

    /// Bind every call site in `expr` and in its subqueries.
    pub fn bind_expr(&self, expr: &Expr) -> QueryResult<()> {
        visit::try_for_each_expr(expr, &mut |e| self.bind_node(e))
    }

    pub(crate) fn bind_node(&self, expr: &Expr) -> QueryResult<()> {
        match expr {
            Expr::Function(call) => call.bind(self, false).map(|_| ()),
            Expr::Analytic(call) => call.function.bind(self, true).map(|_| ()),
            _ => Ok(()),
        }
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut scalar: Vec<String> = self.scalar_udfs.read().keys().cloned().collect();
        let mut aggregate: Vec<String> = self.aggregate_udfs.read().keys().cloned().collect();
        scalar.sort_unstable();
        aggregate.sort_unstable();
        f.debug_struct("FunctionRegistry")
            .field("id", &self.id)
            .field("generation", &self.generation.load(Ordering::Acquire))
            .field("builtins", &self.builtins.len())
            .field("scalar_udfs", &scalar)
            .field("aggregate_udfs", &aggregate)
            .finish()
    }
}

impl FunctionCall {
    /// Resolve this call site against `registry`.
    ///
    /// The binding is cached until the call site meets a different registry
    /// or a user function is registered on this one.
    pub fn bind(&self, registry: &FunctionRegistry, over: bool) -> QueryResult<Binding> {
        // read the stamp first so a concurrent registration forces a rebind
        let stamp = registry.stamp();
        if let Some(binding) = self.binding.get(stamp) {
            return Ok(binding);
        }
        let argc = if self.is_count_all() { 1 } else { self.args.len() };
        let binding = registry.resolve(&self.name, argc, over)?;
        if self.distinct && !binding.is_aggregate() {
            return Err(QueryError::InvalidArguments(format!(
                "DISTINCT is only allowed in aggregate functions: {self}"
            )));
        }
        self.binding.store(stamp, binding.clone());
        Ok(binding)
    }

    /// True when this call site is bound to an aggregate.
    pub fn is_aggregate(&self) -> bool {
        self.binding().is_some_and(|b| b.is_aggregate())
    }
}

/// True when `expr` contains an aggregate call of its own scope
/// (analytic calls and subqueries excluded).
pub fn contains_aggregate(expr: &Expr) -> bool {
    visit::any_in_scope(expr, false, &|e| matches!(e, Expr::Function(call) if call.is_aggregate()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::ast::{analytic, col, count_all, func};

    #[test]
    fn resolves_builtins_case_insensitively() {
        let registry = FunctionRegistry::new();
        assert!(matches!(
            registry.resolve("upper", 1, false).unwrap(),
            Binding::Scalar(ScalarFunction::Upper)
        ));
        assert!(matches!(
            registry.resolve("Sum", 1, false).unwrap(),
            Binding::Aggregate(AggregateFunction::Sum)
        ));
        assert!(matches!(
            registry.resolve("sum", 1, true).unwrap(),
            Binding::Aggregate(AggregateFunction::Sum)
        ));
    }

    #[test]
    fn unknown_name_and_bad_arity() {
        let registry = FunctionRegistry::new();
        assert_eq!(
            registry.resolve("nope", 0, false).unwrap_err(),
            QueryError::FunctionNotExist("NOPE".to_string())
        );
        assert!(matches!(
            registry.resolve("abs", 2, false),
            Err(QueryError::FunctionArgumentError { .. })
        ));
    }

    #[test]
    fn analytic_requires_over() {
        let registry = FunctionRegistry::new();
        assert!(registry.resolve("row_number", 0, false).is_err());
        assert!(registry.resolve("row_number", 0, true).is_ok());
        assert!(registry.resolve("upper", 1, true).is_err());
    }

    #[test]
    fn binding_is_cached_per_call_site() {
        let registry = FunctionRegistry::new();
        let expr = func("count", vec![col("c1")]);
        registry.bind_expr(&expr).unwrap();
        assert!(contains_aggregate(&expr));

        let expr = count_all();
        registry.bind_expr(&expr).unwrap();
        assert!(contains_aggregate(&expr));

        let expr = analytic("rank", vec![], vec![], vec![]);
        registry.bind_expr(&expr).unwrap();
        assert!(!contains_aggregate(&expr));
    }

    #[test]
    fn user_functions_resolve_after_builtins() {
        let registry = FunctionRegistry::new();
        registry.register_scalar(ScalarUdf::new("double", Arity::Exact(1), |args| {
            crate::value::arithmetic(
                crate::value::ArithmeticOperator::Multiply,
                &args[0],
                &crate::value::Value::Integer(2),
            )
        }));
        assert!(registry.contains("DOUBLE"));
        assert!(matches!(registry.resolve("double", 1, false).unwrap(), Binding::UserScalar(_)));
    }

    fn constant(name: &str, value: i64) -> ScalarUdf {
        ScalarUdf::new(name, Arity::Exact(0), move |_| Ok(crate::value::Value::Integer(value)))
    }

    #[test]
    fn debug_lists_user_function_names() {
        let registry = FunctionRegistry::new();
        registry.register_scalar(constant("answer", 42));
        let rendered = format!("{registry:?}");
        assert!(rendered.starts_with("FunctionRegistry"));
        assert!(rendered.contains("ANSWER"));
    }

    #[test]
    fn cached_binding_follows_registry_and_reregistration() {
        let first = FunctionRegistry::new();
        first.register_scalar(constant("pick", 1));
        let call = FunctionCall::new("pick", vec![]);
        let Binding::UserScalar(udf) = call.bind(&first, false).unwrap() else {
            panic!("expected a user scalar binding");
        };
        assert_eq!(udf.call(&[]).unwrap(), crate::value::Value::Integer(1));

        // same call site, different registry
        let second = FunctionRegistry::new();
        second.register_scalar(constant("pick", 2));
        let Binding::UserScalar(udf) = call.bind(&second, false).unwrap() else {
            panic!("expected a user scalar binding");
        };
        assert_eq!(udf.call(&[]).unwrap(), crate::value::Value::Integer(2));

        // re-registration on the first registry replaces the cached one
        first.register_scalar(constant("pick", 3));
        let Binding::UserScalar(udf) = call.bind(&first, false).unwrap() else {
            panic!("expected a user scalar binding");
        };
        assert_eq!(udf.call(&[]).unwrap(), crate::value::Value::Integer(3));

        // a registry without the function no longer resolves it
        let empty = FunctionRegistry::new();
        assert_eq!(
            call.bind(&empty, false).unwrap_err(),
            QueryError::FunctionNotExist("PICK".to_string())
        );
    }
}
