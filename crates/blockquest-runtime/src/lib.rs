//! Execution runtime for compiled blockquest programs.
//!
//! Compiled source is parsed into a small AST and run by a tree-walking
//! [`Interpreter`]. The interpreter is generic over its [`RuntimeHost`]:
//! a [`PureHost`] for synchronous function tests and predicates, and a
//! [`GameHost`] that animates the agent on the level graph and records
//! visualization steps into a replay hub.
//!
//! # Modules
//!
//! - [`lexer`] -- Tokenizer for emitted source
//! - [`ast`] -- Expression and statement tree
//! - [`parser`] -- Recursive-descent parser
//! - [`value`] -- Runtime values and JSON conversion
//! - [`builtins`] -- Builtin functions, operators and methods
//! - [`interp`] -- Work-stack evaluator with heap call frames
//! - [`host`] -- Host calls and the host trait
//! - [`pure`] -- Single-poll evaluation of Pure programs
//! - [`world`] -- Simulated level world
//! - [`scene`] -- Renderer contract and a headless scene
//! - [`game`] -- Host for played runs
//! - [`error`] -- Error type

pub mod ast;
pub mod builtins;
pub mod error;
pub mod game;
pub mod host;
pub mod interp;
pub mod lexer;
pub mod parser;
pub mod pure;
pub mod scene;
pub mod value;
pub mod world;

pub use error::RuntimeError;
pub use game::{run_program, GameHost, RunControl, RunReport};
pub use host::{HostCall, PureHost, RuntimeHost};
pub use interp::{Interpreter, InterpreterConfig};
pub use pure::{block_on_pure, evaluate_predicate, PureProgram};
pub use scene::{Effect, EffectKind, HeadlessScene, SceneHandle};
pub use value::Value;
pub use world::{MoveOutcome, World, WorldState};
