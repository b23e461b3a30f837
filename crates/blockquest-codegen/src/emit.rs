//! Emission rules, one match arm per block kind.
//!
//! [`Emitter::statement`] and [`Emitter::expression`] each match
//! exhaustively on [`BlockKind`], and each arm covers both generation modes.
//! A new block kind therefore fails to compile until it has an Instrumented
//! and a Pure rule in both positions.
//!
//! Sub-expressions are shared: a value slot compiles to the same text in
//! both modes except where it reads the world (sensors) or calls a
//! procedure (awaited in Instrumented mode).

use blockquest_core::node::{
    field, slot, ArithOp, BlockKind, CompareOp, FlowKind, LogicOp, LoopMode, MinMaxOp, Sensor,
    SlotShape,
};
use blockquest_core::NodeId;

use crate::compiler::Emitter;
use crate::ident::repeat_counter;

/// Literal used for an empty or unusable value slot.
pub fn default_for(shape: SlotShape) -> &'static str {
    match shape {
        SlotShape::Number => "0",
        SlotShape::Step => "1",
        SlotShape::Boolean => "false",
        SlotShape::List => "[]",
        SlotShape::Any => "null",
    }
}

/// Formats a number so the script lexer reads it back exactly.
pub fn number_literal(n: f64) -> Option<String> {
    if !n.is_finite() {
        return None;
    }
    let text = if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    };
    if n < 0.0 {
        Some(format!("({text})"))
    } else {
        Some(text)
    }
}

/// `text` in a form that can be followed by `.member`. A bare number
/// literal would swallow the dot as its decimal point.
fn receiver(text: String) -> String {
    if text.starts_with(|c: char| c.is_ascii_digit()) {
        format!("({text})")
    } else {
        text
    }
}

fn string_literal(text: &str) -> String {
    serde_json::to_string(text).unwrap_or_else(|_| "\"\"".to_string())
}

/// Highest `n` among slots named `{prefix}{n}` under `id`.
fn numbered_slots(em: &Emitter<'_>, id: NodeId, prefixes: &[&str]) -> Option<usize> {
    em.graph
        .slot_names(id)
        .iter()
        .filter_map(|name| {
            prefixes
                .iter()
                .find_map(|p| name.strip_prefix(p))
                .and_then(|rest| rest.parse::<usize>().ok())
        })
        .max()
}

impl Emitter<'_> {
    // -----------------------------------------------------------------------
    // Statements
    // -----------------------------------------------------------------------

    /// Emits every statement in `slot_name` under `parent`, in order.
    pub(crate) fn statements(&mut self, parent: NodeId, slot_name: &str) {
        for child in self.graph.children(parent, slot_name) {
            self.statement(child);
        }
    }

    /// Emits one statement block.
    pub(crate) fn statement(&mut self, id: NodeId) {
        let graph = self.graph;
        let Some(node) = graph.node(id) else { return };
        let kind = node.kind;
        match kind {
            BlockKind::Number
            | BlockKind::Text
            | BlockKind::Boolean
            | BlockKind::Null
            | BlockKind::VariableGet
            | BlockKind::Arithmetic { .. }
            | BlockKind::Compare { .. }
            | BlockKind::Logic { .. }
            | BlockKind::Negate
            | BlockKind::MinMax { .. }
            | BlockKind::ListCreate
            | BlockKind::ListGet
            | BlockKind::ListLength
            | BlockKind::ListContains
            | BlockKind::AlgorithmInput
            | BlockKind::Sensor { .. } => {
                self.diagnose(Some(id), "expression block in statement position ignored");
            }

            BlockKind::VariableSet => {
                let var = self.var_ident(id);
                let value = self.value(id, slot::VALUE);
                self.line(&format!("{var} = {value};"));
            }
            BlockKind::VariableChange => {
                let var = self.var_ident(id);
                let delta = self.value(id, slot::DELTA);
                self.line(&format!("{var} = toNumber({var}) + {delta};"));
            }
            BlockKind::ListSet => {
                let list = self.value(id, slot::LIST);
                let index = self.value(id, slot::INDEX);
                let value = self.value(id, slot::VALUE);
                self.line(&format!("{list}[{index}] = {value};"));
            }
            BlockKind::ListPush => {
                let list = receiver(self.value(id, slot::LIST));
                let value = self.value(id, slot::VALUE);
                self.line(&format!("{list}.push({value});"));
            }

            BlockKind::MoveTo => {
                if self.instrumented() {
                    let node = self.value(id, slot::NODE);
                    self.line(&format!("await api.moveTo({node});"));
                }
            }
            BlockKind::Collect => {
                if self.instrumented() {
                    self.line("await api.collect();");
                }
            }
            BlockKind::TableUpdate => {
                if self.instrumented() {
                    let row = self.value(id, slot::ROW);
                    let col = self.value(id, slot::COL);
                    let value = self.value(id, slot::VALUE);
                    self.line(&format!("await viz.tableSet({row}, {col}, {value});"));
                }
            }
            BlockKind::FrontierPush => {
                if self.instrumented() {
                    let node = self.value(id, slot::NODE);
                    let priority = self.value(id, slot::PRIORITY);
                    self.line(&format!("await viz.frontierPush({node}, {priority});"));
                }
            }
            BlockKind::FrontierSelect => {
                if self.instrumented() {
                    let node = self.value(id, slot::NODE);
                    self.line(&format!("await viz.frontierSelect({node});"));
                }
            }

            BlockKind::ProcedureReturn => {
                if self.in_procedure {
                    let value = self.value(id, slot::VALUE);
                    self.line(&format!("return {value};"));
                } else {
                    self.diagnose(Some(id), "return outside a procedure ignored");
                    self.line("// return outside procedure");
                }
            }

            BlockKind::If => self.emit_if(id),
            BlockKind::WhileUntil { mode } => {
                let cond = self.value(id, slot::BOOL);
                let header = match mode {
                    LoopMode::While => format!("while ({cond})"),
                    LoopMode::Until => format!("while (!({cond}))"),
                };
                self.loop_body(id, &header);
            }
            BlockKind::Repeat => {
                let counter = repeat_counter(self.repeat_depth);
                let times = self.value(id, slot::TIMES);
                let header = format!(
                    "for (let {counter} = 0; {counter} < {times}; {counter} = {counter} + 1)"
                );
                self.repeat_depth += 1;
                self.loop_body(id, &header);
                self.repeat_depth -= 1;
            }
            BlockKind::ForRange => {
                let var = self.var_ident(id);
                let from = self.value(id, slot::FROM);
                let to = self.value(id, slot::TO);
                let by = self.value(id, slot::BY);
                let header = format!(
                    "for ({var} = {from}; rangeContinues({var}, {to}, {by}); {var} = {var} + {by})"
                );
                self.loop_body(id, &header);
            }
            BlockKind::ForEach => {
                let var = self.var_ident(id);
                let list = self.value(id, slot::LIST);
                self.loop_body(id, &format!("for ({var} of {list})"));
            }
            BlockKind::FlowControl { flow } => {
                let keyword = match flow {
                    FlowKind::Break => "break",
                    FlowKind::Continue => "continue",
                };
                if self.loop_depth > 0 {
                    self.line(&format!("{keyword};"));
                } else {
                    self.diagnose(Some(id), format!("{keyword} outside a loop ignored"));
                    self.line(&format!("// {keyword} outside loop"));
                }
            }

            BlockKind::ProcedureDef => {
                self.diagnose(Some(id), "procedure definition nested in a statement slot ignored");
            }
            BlockKind::ProcedureCall => match self.call(id) {
                Some(call) if self.instrumented() => self.line(&format!("await {call};")),
                Some(call) => self.line(&format!("{call};")),
                None => {
                    let name = self
                        .graph
                        .node(id)
                        .and_then(|n| n.procedure_name())
                        .unwrap_or_default()
                        .chars()
                        .map(|c| if c.is_control() { ' ' } else { c })
                        .collect::<String>();
                    self.line(&format!("// unresolved call: {name}"));
                }
            },
        }
    }

    fn loop_body(&mut self, id: NodeId, header: &str) {
        self.open(header);
        self.loop_depth += 1;
        self.statements(id, slot::DO);
        self.loop_depth -= 1;
        self.close();
    }

    fn emit_if(&mut self, id: NodeId) {
        let branches = numbered_slots(self, id, &["IF", "DO"]).map_or(1, |n| n + 1);
        for n in 0..branches {
            let cond = self.value(id, &slot::if_cond(n));
            if n == 0 {
                self.open(&format!("if ({cond})"));
            } else {
                self.reopen(&format!("else if ({cond})"));
            }
            self.statements(id, &slot::if_body(n));
        }
        if self.graph.child(id, slot::ELSE).is_some() {
            self.reopen("else");
            self.statements(id, slot::ELSE);
        }
        self.close();
    }

    // -----------------------------------------------------------------------
    // Expressions
    // -----------------------------------------------------------------------

    /// Compiles the value in `slot_name` under `parent`, or the slot's
    /// default when it is empty.
    pub(crate) fn value(&mut self, parent: NodeId, slot_name: &str) -> String {
        let shape = self
            .graph
            .node(parent)
            .map_or(SlotShape::Any, |n| n.kind.slot_shape(slot_name));
        match self.graph.child(parent, slot_name) {
            Some(child) => self.expression(child, shape),
            None => default_for(shape).to_string(),
        }
    }

    /// Compiles one expression block expected to produce `shape`.
    pub(crate) fn expression(&mut self, id: NodeId, shape: SlotShape) -> String {
        let graph = self.graph;
        let Some(node) = graph.node(id) else {
            return default_for(shape).to_string();
        };
        let kind = node.kind;
        match kind {
            BlockKind::Number => {
                let n = node.fields.get(field::NUM).and_then(|f| f.as_number()).unwrap_or(0.0);
                match number_literal(n) {
                    Some(text) => text,
                    None => {
                        self.diagnose(Some(id), "non-finite number replaced by 0");
                        "0".to_string()
                    }
                }
            }
            BlockKind::Text => string_literal(node.text(field::TEXT).unwrap_or_default()),
            BlockKind::Boolean => {
                let b = node.fields.get(field::BOOL).and_then(|f| f.as_bool()).unwrap_or(false);
                b.to_string()
            }
            BlockKind::Null => "null".to_string(),
            BlockKind::VariableGet => self.var_ident(id),
            BlockKind::Arithmetic { op } => {
                let a = self.value(id, slot::A);
                let b = self.value(id, slot::B);
                match op {
                    ArithOp::Add => format!("({a} + {b})"),
                    ArithOp::Minus => format!("({a} - {b})"),
                    ArithOp::Multiply => format!("({a} * {b})"),
                    ArithOp::Divide => format!("({a} / {b})"),
                    ArithOp::Modulo => format!("({a} % {b})"),
                    ArithOp::Power => format!("Math.pow({a}, {b})"),
                }
            }
            BlockKind::Compare { op } => {
                let a = self.value(id, slot::A);
                let b = self.value(id, slot::B);
                let sym = match op {
                    CompareOp::Eq => "==",
                    CompareOp::Neq => "!=",
                    CompareOp::Lt => "<",
                    CompareOp::Lte => "<=",
                    CompareOp::Gt => ">",
                    CompareOp::Gte => ">=",
                };
                format!("({a} {sym} {b})")
            }
            BlockKind::Logic { op } => {
                let a = self.value(id, slot::A);
                let b = self.value(id, slot::B);
                match op {
                    LogicOp::And => format!("({a} && {b})"),
                    LogicOp::Or => format!("({a} || {b})"),
                }
            }
            BlockKind::Negate => format!("(!{})", self.value(id, slot::BOOL)),
            BlockKind::MinMax { op } => {
                let a = self.value(id, slot::A);
                let b = self.value(id, slot::B);
                match op {
                    MinMaxOp::Min => format!("Math.min({a}, {b})"),
                    MinMaxOp::Max => format!("Math.max({a}, {b})"),
                }
            }
            BlockKind::ListCreate => {
                let count = numbered_slots(self, id, &["ITEM"]).map_or(0, |n| n + 1);
                let items: Vec<String> = (0..count).map(|n| self.value(id, &slot::item(n))).collect();
                format!("[{}]", items.join(", "))
            }
            BlockKind::ListGet => {
                let list = self.value(id, slot::LIST);
                let index = self.value(id, slot::INDEX);
                format!("{list}[{index}]")
            }
            BlockKind::ListLength => format!("{}.length", receiver(self.value(id, slot::VALUE))),
            BlockKind::ListContains => {
                let list = receiver(self.value(id, slot::LIST));
                let item = self.value(id, slot::ITEM);
                format!("{list}.includes({item})")
            }
            BlockKind::AlgorithmInput => {
                format!("input({})", string_literal(node.text(field::KEY).unwrap_or_default()))
            }
            BlockKind::Sensor { sensor } => {
                if self.instrumented() {
                    format!("(await api.sense(\"{}\"))", sensor.wire_name())
                } else {
                    match sensor {
                        Sensor::ItemHere | Sensor::AtGoal => "false".to_string(),
                        Sensor::CurrentNode => "null".to_string(),
                        Sensor::Neighbors => "[]".to_string(),
                    }
                }
            }

            BlockKind::ProcedureCall => match self.call(id) {
                Some(call) if self.instrumented() => format!("(await {call})"),
                Some(call) => call,
                None => "null".to_string(),
            },

            BlockKind::VariableSet
            | BlockKind::VariableChange
            | BlockKind::ListSet
            | BlockKind::ListPush
            | BlockKind::MoveTo
            | BlockKind::Collect
            | BlockKind::TableUpdate
            | BlockKind::FrontierPush
            | BlockKind::FrontierSelect
            | BlockKind::ProcedureReturn
            | BlockKind::If
            | BlockKind::WhileUntil { .. }
            | BlockKind::Repeat
            | BlockKind::ForRange
            | BlockKind::ForEach
            | BlockKind::FlowControl { .. }
            | BlockKind::ProcedureDef => {
                self.diagnose(Some(id), "statement block in value position replaced by default");
                default_for(shape).to_string()
            }
        }
    }

    /// `name(args)` for a call bound to a canonical definition, `None` when
    /// the call's name resolves to nothing.
    fn call(&mut self, id: NodeId) -> Option<String> {
        let name = self.graph.node(id)?.procedure_name().unwrap_or_default().to_string();
        let (Some(ident), Some(binding)) = (self.procedures.get(&name), self.bindings.get(&name)) else {
            self.diagnose(Some(id), format!("call to unknown procedure {name:?} compiled as no-op"));
            return None;
        };
        let ident = ident.clone();
        let arity = binding.parameters.len();
        let args: Vec<String> = (0..arity).map(|n| self.value(id, &slot::arg(n))).collect();
        Some(format!("{ident}({})", args.join(", ")))
    }
}
