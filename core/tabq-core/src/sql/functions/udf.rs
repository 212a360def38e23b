//! User-defined functions
//!
//! Scalar UDF: 인자 값 → 단일 값
//! Aggregate UDF: 그룹 멤버 값들 → 단일 값 (상태 객체에 누적 후 finalize)

use super::Arity;
use crate::error::QueryResult;
use crate::value::Value;

type ScalarFn = Box<dyn Fn(&[Value]) -> QueryResult<Value> + Send + Sync>;

/// Scalar UDF
pub struct ScalarUdf {
    name: String,
    arity: Arity,
    func: ScalarFn,
}

impl ScalarUdf {
    /// 새 Scalar UDF 생성
    pub fn new<F>(name: impl Into<String>, arity: Arity, func: F) -> Self
    where
        F: Fn(&[Value]) -> QueryResult<Value> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            arity,
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    pub fn call(&self, args: &[Value]) -> QueryResult<Value> {
        self.arity.check(&self.name, args.len())?;
        (self.func)(args)
    }
}

/// Aggregate UDF 상태
pub trait AggregateState: Send {
    /// 새 값 추가
    fn accumulate(&mut self, value: &Value) -> QueryResult<()>;

    /// 최종 결과 계산
    fn finalize(&self) -> QueryResult<Value>;
}

type StateFactory = Box<dyn Fn() -> Box<dyn AggregateState> + Send + Sync>;

/// Aggregate UDF
pub struct AggregateUdf {
    name: String,
    arity: Arity,
    create_state: StateFactory,
}

impl AggregateUdf {
    /// 새 Aggregate UDF 생성. `create_state` is called once per group.
    pub fn new<F, S>(name: impl Into<String>, create_state: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: AggregateState + 'static,
    {
        Self {
            name: name.into(),
            arity: Arity::Exact(1),
            create_state: Box::new(move || Box::new(create_state())),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn arity(&self) -> Arity {
        self.arity
    }

    /// 값 배열에 대해 집계 수행
    pub fn aggregate(&self, values: &[Value]) -> QueryResult<Value> {
        let mut state = (self.create_state)();
        for value in values {
            state.accumulate(value)?;
        }
        state.finalize()
    }
}
