//! Tree-walking interpreter driven by an explicit work stack.
//!
//! Statements and expressions are broken into [`Task`]s on a heap stack,
//! with intermediate values on a second stack and one [`CallFrame`] per
//! procedure call. Script recursion therefore never nests native frames;
//! its depth is bounded by [`InterpreterConfig::max_call_depth`] alone.
//!
//! The only suspension point is a host call: [`Interpreter::run`] pops
//! tasks until one asks the host for something, awaits it, pushes the
//! result and carries on. A program that makes no host calls completes on
//! the first poll, which is what Pure evaluation relies on.
//!
//! Scoping follows the emitted code: one variable frame per function call
//! on top of the global scope. Assignment writes the innermost frame that
//! declares the name, falling back to the globals.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::ast::{BinaryOp, Expr, LogicalOp, Program, Stmt, UnaryOp};
use crate::builtins;
use crate::error::RuntimeError;
use crate::host::{HostCall, RuntimeHost};
use crate::value::Value;

/// Limits for one interpreter instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterpreterConfig {
    /// Statements and loop iterations allowed before the run is aborted.
    pub max_steps: u64,
    /// Maximum nesting of procedure calls. Default: 256.
    pub max_call_depth: usize,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        InterpreterConfig {
            max_steps: 1_000_000,
            max_call_depth: 256,
        }
    }
}

/// A procedure call in progress.
#[derive(Debug)]
struct CallFrame {
    locals: HashMap<String, Value>,
    /// Task stack height when the call started; everything above it
    /// belongs to the call.
    task_base: usize,
    value_base: usize,
}

enum LoopKind<'p> {
    While {
        cond: &'p Expr,
    },
    For {
        cond: Option<&'p Expr>,
        update: Option<&'p Stmt>,
        updated: bool,
    },
    ForOf {
        var: &'p str,
        items: std::vec::IntoIter<Value>,
    },
}

/// Marker for an active loop. Popping it starts the next iteration; `break`
/// and `continue` unwind the task stack down to it.
struct Loop<'p> {
    kind: LoopKind<'p>,
    body: &'p [Stmt],
    entered: bool,
}

impl<'p> Loop<'p> {
    fn new(kind: LoopKind<'p>, body: &'p [Stmt]) -> Self {
        Loop {
            kind,
            body,
            entered: false,
        }
    }

    /// The `for` update still owed for the iteration that just ended.
    fn take_update(&mut self) -> Option<&'p Stmt> {
        match &mut self.kind {
            LoopKind::For {
                update: Some(update),
                updated,
                ..
            } if !*updated => {
                *updated = true;
                Some(*update)
            }
            _ => None,
        }
    }
}

/// One unit of pending work.
enum Task<'p> {
    /// Runs `stmts[next..]`.
    Stmts { stmts: &'p [Stmt], next: usize },
    Exec(&'p Stmt),
    /// Pushes the value of an expression.
    Eval(&'p Expr),
    Discard,
    Declare(&'p str),
    Store(&'p Expr),
    SetIndex,
    SetMember(&'p str),
    Branch { then: &'p [Stmt], otherwise: &'p [Stmt] },
    Loop(Loop<'p>),
    LoopTest,
    BeginForOf { var: &'p str, body: &'p [Stmt] },
    Return,
    /// Bottom of a call frame: the body ran off its end.
    Leave,
    MakeList(usize),
    MakeMap(&'p [(String, Expr)]),
    Unary(UnaryOp),
    Binary(BinaryOp),
    ShortCircuit { op: LogicalOp, rhs: &'p Expr },
    GetIndex,
    GetMember(&'p str),
    CallNamed { name: &'p str, argc: usize },
    CallMath { name: &'p str, argc: usize },
    CallHost { receiver: &'p str, method: &'p str, argc: usize },
    CallMethod { name: &'p str, argc: usize },
}

/// Executes a parsed [`Program`] against a [`RuntimeHost`].
pub struct Interpreter<'p, H> {
    program: &'p Program,
    host: H,
    config: InterpreterConfig,
    globals: IndexMap<String, Value>,
    frames: Vec<CallFrame>,
    tasks: Vec<Task<'p>>,
    values: Vec<Value>,
    steps: u64,
}

impl<'p, H: RuntimeHost> Interpreter<'p, H> {
    pub fn new(program: &'p Program, host: H, config: InterpreterConfig) -> Self {
        Interpreter {
            program,
            host,
            config,
            globals: IndexMap::new(),
            frames: Vec::new(),
            tasks: Vec::new(),
            values: Vec::new(),
            steps: 0,
        }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    pub fn into_host(self) -> H {
        self.host
    }

    pub fn globals(&self) -> &IndexMap<String, Value> {
        &self.globals
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    /// Statements and loop iterations executed so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    /// Runs the top-level statements.
    pub async fn run(&mut self) -> Result<(), RuntimeError> {
        self.reset();
        let program = self.program;
        self.tasks.push(Task::Stmts {
            stmts: &program.body,
            next: 0,
        });
        self.drive().await
    }

    /// Calls a declared function by identifier.
    pub async fn call(&mut self, name: &str, args: Vec<Value>) -> Result<Value, RuntimeError> {
        self.reset();
        self.invoke(name, args)?;
        self.drive().await?;
        Ok(self.pop_value())
    }

    /// Evaluates a free-standing expression in the global scope.
    pub async fn evaluate(&mut self, expr: &'p Expr) -> Result<Value, RuntimeError> {
        self.reset();
        self.tasks.push(Task::Eval(expr));
        self.drive().await?;
        Ok(self.pop_value())
    }

    fn reset(&mut self) {
        self.tasks.clear();
        self.values.clear();
        self.frames.clear();
    }

    async fn drive(&mut self) -> Result<(), RuntimeError> {
        while let Some(task) = self.tasks.pop() {
            if let Some(call) = self.step(task)? {
                trace!(%call, "host call");
                let value = self.host.perform(call).await?;
                self.values.push(value);
            }
        }
        Ok(())
    }

    fn tick(&mut self) -> Result<(), RuntimeError> {
        self.steps += 1;
        if self.steps > self.config.max_steps {
            return Err(RuntimeError::StepLimitExceeded {
                limit: self.config.max_steps,
            });
        }
        if self.host.is_stopped() {
            return Err(RuntimeError::Stopped);
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Stacks and variables
    // -----------------------------------------------------------------------

    fn pop_value(&mut self) -> Value {
        self.values.pop().unwrap_or_default()
    }

    fn take_args(&mut self, argc: usize) -> Vec<Value> {
        let at = self.values.len().saturating_sub(argc);
        self.values.split_off(at)
    }

    fn push_evals(&mut self, exprs: &'p [Expr]) {
        for expr in exprs.iter().rev() {
            self.tasks.push(Task::Eval(expr));
        }
    }

    fn lookup(&self, name: &str) -> Value {
        if let Some(value) = self.frames.last().and_then(|frame| frame.locals.get(name)) {
            return value.clone();
        }
        match self.globals.get(name) {
            Some(value) => value.clone(),
            None => {
                warn!(variable = name, "undefined variable read as null");
                Value::Null
            }
        }
    }

    fn declare(&mut self, name: &str, value: Value) {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.locals.insert(name.to_string(), value);
            }
            None => {
                self.globals.insert(name.to_string(), value);
            }
        }
    }

    fn assign(&mut self, name: &str, value: Value) {
        if let Some(slot) = self.frames.last_mut().and_then(|frame| frame.locals.get_mut(name)) {
            *slot = value;
            return;
        }
        self.globals.insert(name.to_string(), value);
    }

    // -----------------------------------------------------------------------
    // Calls and control transfer
    // -----------------------------------------------------------------------

    fn invoke(&mut self, name: &str, args: Vec<Value>) -> Result<(), RuntimeError> {
        let program = self.program;
        let function = program
            .functions
            .get(name)
            .ok_or_else(|| RuntimeError::UndefinedFunction { name: name.to_string() })?;
        if self.frames.len() >= self.config.max_call_depth {
            return Err(RuntimeError::CallDepthExceeded {
                function: name.to_string(),
                limit: self.config.max_call_depth,
            });
        }

        let mut args = args.into_iter();
        let locals = function
            .params
            .iter()
            .map(|param| (param.clone(), args.next().unwrap_or_default()))
            .collect();
        self.frames.push(CallFrame {
            locals,
            task_base: self.tasks.len(),
            value_base: self.values.len(),
        });
        self.tasks.push(Task::Leave);
        self.tasks.push(Task::Stmts {
            stmts: &function.body,
            next: 0,
        });
        Ok(())
    }

    /// Ends the innermost call with `value`. At top level, ends the program.
    fn finish_frame(&mut self, value: Value) {
        match self.frames.pop() {
            Some(frame) => {
                self.tasks.truncate(frame.task_base);
                self.values.truncate(frame.value_base);
                self.values.push(value);
            }
            None => self.tasks.clear(),
        }
    }

    /// `break` (keep = false) or `continue` (keep = true). Outside any loop
    /// both leave the current call with `null`.
    fn unwind_loop(&mut self, keep: bool) {
        let floor = self.frames.last().map_or(0, |frame| frame.task_base);
        while self.tasks.len() > floor {
            if let Some(Task::Loop(lp)) = self.tasks.pop() {
                if keep {
                    self.tasks.push(Task::Loop(lp));
                }
                return;
            }
        }
        self.finish_frame(Value::Null);
    }

    fn next_iteration(&mut self, mut lp: Loop<'p>) -> Result<(), RuntimeError> {
        if lp.entered {
            if let Some(update) = lp.take_update() {
                self.tasks.push(Task::Loop(lp));
                self.tasks.push(Task::Exec(update));
                return Ok(());
            }
            self.tick()?;
        }
        lp.entered = true;
        match &mut lp.kind {
            LoopKind::While { cond } => {
                let cond = *cond;
                self.tasks.push(Task::Loop(lp));
                self.tasks.push(Task::LoopTest);
                self.tasks.push(Task::Eval(cond));
            }
            LoopKind::For { cond, updated, .. } => {
                *updated = false;
                let cond = *cond;
                self.tasks.push(Task::Loop(lp));
                self.tasks.push(Task::LoopTest);
                match cond {
                    Some(cond) => self.tasks.push(Task::Eval(cond)),
                    None => self.values.push(Value::Bool(true)),
                }
            }
            LoopKind::ForOf { var, items } => {
                let Some(item) = items.next() else {
                    return Ok(());
                };
                let var = *var;
                let body = lp.body;
                self.assign(var, item);
                self.tasks.push(Task::Loop(lp));
                self.tasks.push(Task::Stmts { stmts: body, next: 0 });
            }
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Tasks
    // -----------------------------------------------------------------------

    /// Performs one task. Returns the host call it needs, if any; the
    /// caller pushes the call's result.
    fn step(&mut self, task: Task<'p>) -> Result<Option<HostCall>, RuntimeError> {
        match task {
            Task::Stmts { stmts, next } => {
                if let Some(stmt) = stmts.get(next) {
                    if next + 1 < stmts.len() {
                        self.tasks.push(Task::Stmts { stmts, next: next + 1 });
                    }
                    self.tasks.push(Task::Exec(stmt));
                }
            }
            Task::Exec(stmt) => self.exec(stmt)?,
            Task::Eval(expr) => self.eval(expr)?,
            Task::Discard => {
                self.values.pop();
            }
            Task::Declare(name) => {
                let value = self.pop_value();
                self.declare(name, value);
            }
            Task::Store(target) => self.store(target),
            Task::SetIndex => {
                let index = self.pop_value();
                let object = self.pop_value();
                let value = self.pop_value();
                builtins::index_set(&object, &index, value);
            }
            Task::SetMember(name) => {
                let object = self.pop_value();
                let value = self.pop_value();
                builtins::index_set(&object, &Value::text(name), value);
            }
            Task::Branch { then, otherwise } => {
                let branch = if self.pop_value().truthy() { then } else { otherwise };
                self.tasks.push(Task::Stmts { stmts: branch, next: 0 });
            }
            Task::Loop(lp) => self.next_iteration(lp)?,
            Task::LoopTest => {
                let go = self.pop_value().truthy();
                let body: &'p [Stmt] = match self.tasks.last() {
                    Some(Task::Loop(lp)) => lp.body,
                    _ => &[],
                };
                if go {
                    self.tasks.push(Task::Stmts { stmts: body, next: 0 });
                } else {
                    self.tasks.pop();
                }
            }
            Task::BeginForOf { var, body } => {
                let items = builtins::iterate(&self.pop_value()).into_iter();
                self.next_iteration(Loop::new(LoopKind::ForOf { var, items }, body))?;
            }
            Task::Return => {
                let value = self.pop_value();
                self.finish_frame(value);
            }
            Task::Leave => self.finish_frame(Value::Null),
            Task::MakeList(len) => {
                let items = self.take_args(len);
                self.values.push(Value::list(items));
            }
            Task::MakeMap(entries) => {
                let values = self.take_args(entries.len());
                let map = entries.iter().map(|(key, _)| key.clone()).zip(values).collect();
                self.values.push(Value::map(map));
            }
            Task::Unary(op) => {
                let value = self.pop_value();
                self.values.push(match op {
                    UnaryOp::Not => Value::Bool(!value.truthy()),
                    UnaryOp::Neg => Value::Number(-builtins::to_number(&value)),
                });
            }
            Task::Binary(op) => {
                let rhs = self.pop_value();
                let lhs = self.pop_value();
                self.values.push(builtins::binary(op, &lhs, &rhs));
            }
            Task::ShortCircuit { op, rhs } => {
                let short_circuit = self.values.last().is_some_and(|lhs| match op {
                    LogicalOp::And => !lhs.truthy(),
                    LogicalOp::Or => lhs.truthy(),
                });
                if !short_circuit {
                    self.values.pop();
                    self.tasks.push(Task::Eval(rhs));
                }
            }
            Task::GetIndex => {
                let index = self.pop_value();
                let object = self.pop_value();
                self.values.push(builtins::index_get(&object, &index));
            }
            Task::GetMember(name) => {
                let object = self.pop_value();
                self.values.push(builtins::member_get(&object, name));
            }
            Task::CallNamed { name, argc } => {
                let args = self.take_args(argc);
                if name == "input" {
                    let key = args.first().map(Value::as_key).unwrap_or_default();
                    let value = self.host.input(&key);
                    self.values.push(value);
                } else if let Some(value) = builtins::call_function(name, &args) {
                    self.values.push(value);
                } else {
                    self.invoke(name, args)?;
                }
            }
            Task::CallMath { name, argc } => {
                let args = self.take_args(argc);
                self.values.push(builtins::call_math(name, &args).unwrap_or_else(|| {
                    warn!(function = %name, "unknown Math function returned null");
                    Value::Null
                }));
            }
            Task::CallHost { receiver, method, argc } => {
                let args = self.take_args(argc);
                let call = HostCall::decode(receiver, method, args).ok_or_else(|| RuntimeError::UnknownHostCall {
                    receiver: receiver.to_string(),
                    method: method.to_string(),
                })?;
                return Ok(Some(call));
            }
            Task::CallMethod { name, argc } => {
                let args = self.take_args(argc);
                let object = self.pop_value();
                self.values.push(builtins::call_method(&object, name, &args));
            }
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    fn exec(&mut self, stmt: &'p Stmt) -> Result<(), RuntimeError> {
        self.tick()?;
        match stmt {
            Stmt::Let { name, init } => {
                self.tasks.push(Task::Declare(name.as_str()));
                match init {
                    Some(expr) => self.tasks.push(Task::Eval(expr)),
                    None => self.values.push(Value::Null),
                }
            }
            Stmt::Assign { target, value } => {
                self.tasks.push(Task::Store(target));
                self.tasks.push(Task::Eval(value));
            }
            Stmt::Expr(expr) => {
                self.tasks.push(Task::Discard);
                self.tasks.push(Task::Eval(expr));
            }
            Stmt::If { cond, then, otherwise } => {
                self.tasks.push(Task::Branch { then, otherwise });
                self.tasks.push(Task::Eval(cond));
            }
            Stmt::While { cond, body } => {
                self.next_iteration(Loop::new(LoopKind::While { cond }, body))?;
            }
            Stmt::For { init, cond, update, body } => {
                let kind = LoopKind::For {
                    cond: cond.as_ref(),
                    update: update.as_deref(),
                    updated: false,
                };
                self.tasks.push(Task::Loop(Loop::new(kind, body)));
                if let Some(init) = init {
                    self.tasks.push(Task::Exec(init));
                }
            }
            Stmt::ForOf { var, iterable, body } => {
                self.tasks.push(Task::BeginForOf {
                    var: var.as_str(),
                    body,
                });
                self.tasks.push(Task::Eval(iterable));
            }
            Stmt::Return(value) => {
                self.tasks.push(Task::Return);
                match value {
                    Some(expr) => self.tasks.push(Task::Eval(expr)),
                    None => self.values.push(Value::Null),
                }
            }
            Stmt::Break => self.unwind_loop(false),
            Stmt::Continue => self.unwind_loop(true),
        }
        Ok(())
    }

    /// Assigns the value on top of the stack to `target`.
    fn store(&mut self, target: &'p Expr) {
        match target {
            Expr::Ident(name) => {
                let value = self.pop_value();
                self.assign(name, value);
            }
            Expr::Index { object, index } => {
                self.tasks.push(Task::SetIndex);
                self.tasks.push(Task::Eval(index));
                self.tasks.push(Task::Eval(object));
            }
            Expr::Member { object, name } => {
                self.tasks.push(Task::SetMember(name.as_str()));
                self.tasks.push(Task::Eval(object));
            }
            _ => {
                self.values.pop();
                warn!("assignment to a non-assignable expression ignored");
            }
        }
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    fn eval(&mut self, expr: &'p Expr) -> Result<(), RuntimeError> {
        match expr {
            Expr::Number(n) => self.values.push(Value::Number(*n)),
            Expr::Text(s) => self.values.push(Value::Text(s.clone())),
            Expr::Bool(b) => self.values.push(Value::Bool(*b)),
            Expr::Null => self.values.push(Value::Null),
            Expr::Ident(name) => {
                let value = self.lookup(name);
                self.values.push(value);
            }
            Expr::List(items) => {
                self.tasks.push(Task::MakeList(items.len()));
                self.push_evals(items);
            }
            Expr::Map(entries) => {
                self.tasks.push(Task::MakeMap(entries));
                for (_, item) in entries.iter().rev() {
                    self.tasks.push(Task::Eval(item));
                }
            }
            Expr::Unary { op, expr } => {
                self.tasks.push(Task::Unary(*op));
                self.tasks.push(Task::Eval(expr));
            }
            Expr::Binary { op, lhs, rhs } => {
                self.tasks.push(Task::Binary(*op));
                self.tasks.push(Task::Eval(rhs));
                self.tasks.push(Task::Eval(lhs));
            }
            Expr::Logical { op, lhs, rhs } => {
                self.tasks.push(Task::ShortCircuit { op: *op, rhs });
                self.tasks.push(Task::Eval(lhs));
            }
            Expr::Index { object, index } => {
                self.tasks.push(Task::GetIndex);
                self.tasks.push(Task::Eval(index));
                self.tasks.push(Task::Eval(object));
            }
            Expr::Member { object, name } => {
                self.tasks.push(Task::GetMember(name.as_str()));
                self.tasks.push(Task::Eval(object));
            }
            Expr::Call { callee, args } => self.eval_call(callee, args)?,
            Expr::Await(inner) => self.tasks.push(Task::Eval(inner)),
        }
        Ok(())
    }

    fn eval_call(&mut self, callee: &'p Expr, args: &'p [Expr]) -> Result<(), RuntimeError> {
        let argc = args.len();
        match callee {
            Expr::Ident(name) => self.tasks.push(Task::CallNamed {
                name: name.as_str(),
                argc,
            }),
            Expr::Member { object, name } => match object.as_ref() {
                Expr::Ident(receiver) if receiver == "Math" => self.tasks.push(Task::CallMath {
                    name: name.as_str(),
                    argc,
                }),
                Expr::Ident(receiver) if receiver == "api" || receiver == "viz" => {
                    self.tasks.push(Task::CallHost {
                        receiver: receiver.as_str(),
                        method: name.as_str(),
                        argc,
                    })
                }
                _ => {
                    self.tasks.push(Task::CallMethod {
                        name: name.as_str(),
                        argc,
                    });
                    self.push_evals(args);
                    self.tasks.push(Task::Eval(object));
                    return Ok(());
                }
            },
            other => {
                return Err(RuntimeError::NotCallable {
                    description: format!("{other:?}"),
                })
            }
        }
        self.push_evals(args);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::PureHost;
    use crate::parser::parse_program;
    use crate::pure::block_on_pure;
    use serde_json::json;

    fn run(source: &str) -> Result<IndexMap<String, Value>, RuntimeError> {
        let program = parse_program(source)?;
        let mut interp = Interpreter::new(&program, PureHost::default(), InterpreterConfig::default());
        block_on_pure(interp.run())?;
        Ok(interp.globals().clone())
    }

    #[test]
    fn for_range_is_inclusive() {
        let globals = run("let s = 0; let i = null;\nfor (i = 1; rangeContinues(i, 4, 1); i = i + 1) { s = s + i; }").unwrap();
        assert_eq!(globals["s"], Value::Number(10.0));
        assert_eq!(globals["i"], Value::Number(5.0));
    }

    #[test]
    fn procedures_see_globals_and_own_params() {
        let globals = run(
            "let total = 0;\n\
             function add(n) { total = total + n; return n * 2; }\n\
             let r = add(3);\nr = r + add(4);",
        )
        .unwrap();
        assert_eq!(globals["total"], Value::Number(7.0));
        assert_eq!(globals["r"], Value::Number(14.0));
        assert!(!globals.contains_key("n"));
    }

    #[test]
    fn lists_are_mutated_by_reference() {
        let globals = run(
            "let dp = [[0, 0], [0, 0]];\n\
             function fill(t) { t[1][1] = 5; t.push([9]); }\n\
             fill(dp);",
        )
        .unwrap();
        assert_eq!(globals["dp"].to_json(), json!([[0, 0], [0, 5], [9]]));
    }

    #[test]
    fn break_and_continue() {
        let globals = run(
            "let seen = [];\n\
             for (x of [1, 2, 3, 4, 5]) { if (x == 2) { continue; } if (x == 4) { break; } seen.push(x); }",
        )
        .unwrap();
        assert_eq!(globals["seen"].to_json(), json!([1, 3]));
    }

    #[test]
    fn recursion() {
        let globals = run(
            "function fib(n) { if (n < 2) { return n; } return fib(n - 1) + fib(n - 2); }\nlet f = fib(10);",
        )
        .unwrap();
        assert_eq!(globals["f"], Value::Number(55.0));
    }

    #[test]
    fn step_budget_stops_infinite_loops() {
        let program = parse_program("while (true) { }").unwrap();
        let config = InterpreterConfig {
            max_steps: 100,
            ..InterpreterConfig::default()
        };
        let mut interp = Interpreter::new(&program, PureHost::default(), config);
        assert_eq!(
            block_on_pure(interp.run()),
            Err(RuntimeError::StepLimitExceeded { limit: 100 })
        );
    }

    #[test]
    fn call_depth_is_bounded() {
        let err = run("function f() { return f(); }\nf();").unwrap_err();
        assert!(matches!(err, RuntimeError::CallDepthExceeded { limit: 256, .. }));
    }

    const DOWN: &str = "function down(n) { if (n <= 0) { return 0; } return 1 + down(n - 1); }\n";

    #[test]
    fn recursion_just_inside_the_depth_limit_completes() {
        // down(254) holds 255 frames at its deepest.
        let globals = run(&format!("{DOWN}let d = down(254);")).unwrap();
        assert_eq!(globals["d"], Value::Number(254.0));

        let err = run(&format!("{DOWN}let d = down(256);")).unwrap_err();
        assert_eq!(
            err,
            RuntimeError::CallDepthExceeded {
                function: "down".into(),
                limit: 256
            }
        );
    }

    #[test]
    fn deep_recursion_does_not_use_the_native_stack() {
        let source = format!("{DOWN}let d = down(20000);");
        let program = parse_program(&source).unwrap();
        let config = InterpreterConfig {
            max_call_depth: 50_000,
            ..InterpreterConfig::default()
        };
        let mut interp = Interpreter::new(&program, PureHost::default(), config);
        block_on_pure(interp.run()).unwrap();
        assert_eq!(interp.globals()["d"], Value::Number(20000.0));
    }

    #[test]
    fn continue_runs_the_for_update() {
        let globals = run(
            "let s = 0; let i = 0;\n\
             for (i = 0; i < 5; i = i + 1) { if (i == 2) { continue; } s = s + i; }",
        )
        .unwrap();
        assert_eq!(globals["s"], Value::Number(8.0));
        assert_eq!(globals["i"], Value::Number(5.0));
    }

    #[test]
    fn return_from_inside_nested_loops() {
        let globals = run(
            "function find(rows, t) {\n\
               for (row of rows) { let j = 0; while (true) { if (j >= row.length) { break; } \
                 if (row[j] == t) { return [row[0], j]; } j = j + 1; } }\n\
               return null;\n\
             }\n\
             let hit = find([[1, 2], [3, 4, 5]], 5);\nlet miss = find([[1]], 9);",
        )
        .unwrap();
        assert_eq!(globals["hit"].to_json(), json!([3, 2]));
        assert_eq!(globals["miss"], Value::Null);
    }

    #[test]
    fn call_results_combine_with_pending_operands() {
        let globals = run(
            "function sq(x) { return x * x; }\n\
             let m = {a: sq(2), b: [1, sq(3), 1 + sq(4)]};",
        )
        .unwrap();
        assert_eq!(globals["m"].to_json(), json!({"a": 4, "b": [1, 9, 17]}));
    }

    #[test]
    fn undefined_function_is_structural() {
        assert_eq!(
            run("nothing(1);").unwrap_err(),
            RuntimeError::UndefinedFunction { name: "nothing".into() }
        );
    }

    #[test]
    fn host_calls_fail_without_a_world() {
        let err = run("await api.collect();").unwrap_err();
        assert!(matches!(err, RuntimeError::HostUnavailable { .. }));
    }

    #[test]
    fn logical_operators_short_circuit() {
        let globals = run("let a = false && nothing();\nlet b = true || nothing();").unwrap();
        assert_eq!(globals["a"], Value::Bool(false));
        assert_eq!(globals["b"], Value::Bool(true));
    }
}
