//! Synchronous evaluation of Pure-mode programs.
//!
//! Pure source never suspends, so its evaluation future completes on the
//! first poll. [`block_on_pure`] polls exactly once with a no-op waker and
//! reports [`RuntimeError::Suspended`] otherwise; no executor is involved.

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::pin;
use std::task::{Context, Poll, Waker};

use blockquest_codegen::{GenerationMode, ProgramSource};
use blockquest_core::LevelContext;
use tracing::debug;

use crate::ast::Program;
use crate::error::RuntimeError;
use crate::host::PureHost;
use crate::interp::{Interpreter, InterpreterConfig};
use crate::parser::{parse_expression, parse_program};
use crate::value::Value;

/// Drives a future that must not suspend.
pub fn block_on_pure<T, F>(future: F) -> Result<T, RuntimeError>
where
    F: Future<Output = Result<T, RuntimeError>>,
{
    let mut future = pin!(future);
    let mut cx = Context::from_waker(Waker::noop());
    match future.as_mut().poll(&mut cx) {
        Poll::Ready(result) => result,
        Poll::Pending => Err(RuntimeError::Suspended),
    }
}

/// A compiled Pure program, parsed once and callable many times.
#[derive(Debug, Clone)]
pub struct PureProgram {
    source: ProgramSource,
    program: Program,
    config: InterpreterConfig,
}

impl PureProgram {
    /// Parses Pure-mode source. Instrumented source is rejected: it may
    /// suspend.
    pub fn new(source: ProgramSource, config: InterpreterConfig) -> Result<Self, RuntimeError> {
        if source.mode != GenerationMode::Pure {
            return Err(RuntimeError::HostUnavailable {
                call: "pure evaluation".to_string(),
                reason: "source was compiled in instrumented mode".to_string(),
            });
        }
        let program = parse_program(&source.text)?;
        Ok(PureProgram {
            source,
            program,
            config,
        })
    }

    pub fn source(&self) -> &ProgramSource {
        &self.source
    }

    /// Runs the top-level statements, then calls procedure `name` (as named
    /// in the block graph) with `args`.
    pub fn call(
        &self,
        name: &str,
        args: &[serde_json::Value],
        level: Option<&LevelContext>,
    ) -> Result<serde_json::Value, RuntimeError> {
        let ident = self
            .source
            .procedure(name)
            .map_err(|_| RuntimeError::UndefinedFunction { name: name.to_string() })?
            .ident
            .clone();
        let mut interp = Interpreter::new(&self.program, PureHost::new(level), self.config.clone());
        block_on_pure(interp.run())?;
        let args = args.iter().map(Value::from_json).collect();
        let result = block_on_pure(interp.call(&ident, args))?;
        debug!(procedure = name, steps = interp.steps(), "pure call finished");
        Ok(result.to_json())
    }
}

/// Evaluates a predicate expression against a set of global variables.
pub fn evaluate_predicate(
    expression: &str,
    globals: &BTreeMap<String, serde_json::Value>,
    level: Option<&LevelContext>,
    config: &InterpreterConfig,
) -> Result<bool, RuntimeError> {
    let expr = parse_expression(expression)?;
    let program = Program::default();
    let mut interp = Interpreter::new(&program, PureHost::new(level), config.clone());
    for (name, value) in globals {
        interp.set_global(name, Value::from_json(value));
    }
    let value = block_on_pure(interp.evaluate(&expr))?;
    Ok(value.truthy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn suspending_future_is_reported() {
        let result: Result<(), RuntimeError> = block_on_pure(async {
            tokio::task::yield_now().await;
            Ok(())
        });
        assert_eq!(result, Err(RuntimeError::Suspended));
    }

    #[test]
    fn predicates_see_globals() {
        let globals = BTreeMap::from([
            ("best".to_string(), json!(9)),
            ("path".to_string(), json!(["A", "C"])),
        ]);
        let config = InterpreterConfig::default();
        assert!(evaluate_predicate("best == 9 && path.length == 2", &globals, None, &config).unwrap());
        assert!(!evaluate_predicate("path.includes(\"B\")", &globals, None, &config).unwrap());
        assert!(evaluate_predicate("best >", &globals, None, &config).is_err());
    }

    proptest::proptest! {
        #[test]
        fn integer_arithmetic_matches_native(a in -1000i64..1000, b in -1000i64..1000, c in 1i64..50) {
            let expected = a + b * c - (a % c);
            let globals = BTreeMap::from([
                ("a".to_string(), json!(a)),
                ("b".to_string(), json!(b)),
                ("c".to_string(), json!(c)),
                ("expected".to_string(), json!(expected)),
            ]);
            let holds = evaluate_predicate(
                "a + b * c - (a % c) == expected",
                &globals,
                None,
                &InterpreterConfig::default(),
            );
            proptest::prop_assert_eq!(holds, Ok(true));
        }
    }
}
