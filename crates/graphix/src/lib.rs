#![doc = include_str!("../../../README.md")]

pub mod ast;
pub mod backend;
mod environment;
mod error;
mod interpreter;
pub mod io;
mod ops;
mod parse;
mod value;

pub use crate::{
    environment::{Binding, Environment},
    error::{ErrorKind, RunError, RunResult},
    interpreter::{InterpretOutcome, Interpreter},
    parse::{decode_document, decode_node},
    value::{DeclaredType, ImageValue, Value},
};
