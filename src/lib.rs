/*!

  An emoji assembly language and simulated CPU for teaching computing
  fundamentals.

  The execution pipeline is this:
  ```text
  source text -> [`lexer::tokenize`] -> `Token`s ->⋯

  ⋯-> [`parser::parse`] -> `Program` -> [`validator::analyze`] ->⋯

  ⋯-> [`Vm::load_program`] -> [`Vm::step`]/[`Vm::run`] -> output + snapshot
  ```
  `compiler::compile` wraps the front half into the single entry point hosts
  call; the `Vm` owns everything behind `load_program`. Errors at every stage
  are ordinary values in the results — nothing in this crate panics across
  its public boundary.

*/

#[macro_use] extern crate prettytable;
#[macro_use] extern crate lazy_static;

pub mod compiler;
pub mod instruction;
pub mod lexer;
pub mod memory;
pub mod opcode;
pub mod parser;
pub mod scanner;
pub mod token;
pub mod validator;
pub mod vm;

pub use compiler::{compile, compile_source, disassemble, Compilation};
pub use instruction::{Instruction, Operand};
pub use memory::{Memory, MemoryError, MemoryState, DEFAULT_MEMORY_SIZE};
pub use opcode::{Arity, Category, Opcode};
pub use parser::{ParseError, Program};
pub use token::{Token, TokenKind};
pub use validator::{Diagnostic, ProgramStats, ValidationResult};
pub use vm::{
  CpuState, EventKind, ExecutionEvent, Fault, Flags, Vm, VmState,
  DEFAULT_CYCLE_LIMIT, REGISTER_COUNT,
};
