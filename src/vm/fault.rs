/*!

  Runtime faults. Every fault is caught inside the machine's step loop and
  converted into a halted state plus a descriptive error — none of these ever
  crosses the public boundary as a panic. The cycle-limit fault is
  distinguished so hosts can tell "your program probably doesn't terminate"
  apart from ordinary mistakes.

*/

use thiserror::Error;

use crate::memory::MemoryError;
use crate::opcode::Opcode;

#[derive(Error, Clone, Eq, PartialEq, Debug)]
pub enum Fault {
  #[error("division by zero on line {line}")]
  DivisionByZero { line: usize },

  #[error("modulo by zero on line {line}")]
  ModuloByZero { line: usize },

  #[error("stack underflow: POP with nothing on the stack (line {line})")]
  StackUnderflow { line: usize },

  #[error("jump target {target} is outside the program (0..{length}) on line {line}")]
  JumpOutOfBounds { target: i64, length: usize, line: usize },

  #[error(transparent)]
  Memory(#[from] MemoryError),

  #[error("{opcode} is missing an operand on line {line}")]
  MissingOperand { opcode: Opcode, line: usize },

  #[error("invalid operand for {opcode} on line {line}")]
  InvalidOperand { opcode: Opcode, line: usize },

  #[error("execution limit reached: {limit} cycles without halting")]
  CycleLimitReached { limit: u64 },
}
