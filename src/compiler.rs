/*!

  Functions to produce a compilation artifact from source text. This is the
  single entry point the surrounding layers call, so lexer, parser, and
  validator internals never leak past it.

  The compilation pipeline is this:
  ```text
  text -> [`lexer::tokenize`] -> `Token`s -> [`parser::parse`] -> `Program` ->⋯

  ⋯-> [`validator::analyze`] -> `ValidationResult`
  ```
  The machine in `crate::vm` consumes `Program::instructions`; everything else
  in the artifact is diagnostics for the host.

*/

use std::time::SystemTime;

use crate::instruction::{Instruction, Operand};
use crate::lexer::tokenize;
use crate::opcode::Opcode;
use crate::parser::{parse, Program};
use crate::validator::{analyze, ValidationResult};

/// A `Compilation` is the result of `compile(source)`: the parsed program,
/// its static analysis, and a little provenance.
#[derive(Clone, Debug)]
pub struct Compilation {
  pub program     : Program,
  pub validation  : ValidationResult,
  /// Always `false` here: operand pre-resolution happens when the machine
  /// loads the program, not at compile time.
  pub optimized   : bool,
  pub compiled_at : SystemTime,
}

/// Compiles source text: tokenize, parse, analyze. Pure composition — errors
/// come back inside the artifact, never as panics.
pub fn compile(source: &str) -> Compilation {
  let program = compile_source(source);
  let validation = analyze(&program);
  Compilation {
    program,
    validation,
    optimized: false,
    compiled_at: SystemTime::now(),
  }
}

/// The front half of `compile`: tokenize and parse, no analysis.
pub fn compile_source(source: &str) -> Program {
  parse(tokenize(source), source)
}

/**
  Renders instructions back to readable source, one per line, each with a
  generated trailing comment describing what it does. Purely presentational;
  feeding the output back through `compile` yields the same instructions.
*/
pub fn disassemble(instructions: &[Instruction]) -> String {
  let mut listing = String::new();
  for instruction in instructions {
    let mut rendered = instruction.opcode.emoji().to_string();
    for operand in &instruction.operands {
      rendered.push(' ');
      rendered.push_str(&operand.to_string());
    }
    listing.push_str(&format!("{}  # {}\n", rendered, describe(instruction)));
  }
  listing
}

/// A human comment for one instruction, in the register-transfer style
/// learners see in the UI ("R0 = R0 + 5").
fn describe(instruction: &Instruction) -> String {
  let operand = |index: usize| -> String {
    instruction.operands
        .get(index)
        .map(Operand::to_string)
        .unwrap_or_else(|| "?".to_string())
  };

  match instruction.opcode {
    Opcode::Load  => format!("R0 = {}", operand(0)),
    Opcode::Add   => format!("R0 = R0 + {}", operand(0)),
    Opcode::Sub   => format!("R0 = R0 - {}", operand(0)),
    Opcode::Mul   => format!("R0 = R0 * {}", operand(0)),
    Opcode::Div   => format!("R0 = R0 / {}", operand(0)),
    Opcode::Mod   => format!("R0 = R0 % {}", operand(0)),
    Opcode::And   => format!("R0 = R0 & {}", operand(0)),
    Opcode::Or    => format!("R0 = R0 | {}", operand(0)),
    Opcode::Xor   => format!("R0 = R0 ^ {}", operand(0)),
    Opcode::Not   => "R0 = !R0".to_string(),
    Opcode::Cmp   => format!("compare R0 with {}", operand(0)),

    Opcode::Store => match instruction.operands.len() {
      2      => format!("mem[{}] = {}", operand(1), operand(0)),
      _other => format!("mem[{}] = R0", operand(0)),
    },
    Opcode::Copy  => match instruction.operands.len() {
      2      => format!("{} = {}", operand(0), operand(1)),
      _other => format!("{} = R0", operand(0)),
    },

    Opcode::Jump       => format!("goto {}", operand(0)),
    Opcode::JumpIfZero => format!("goto {} when the zero flag is set", operand(0)),
    Opcode::Loop       => format!("repeat the block {} times", operand(0)),
    Opcode::Return     => "end of repeat block or subroutine".to_string(),
    Opcode::Call       => format!("call subroutine at {}", operand(0)),

    Opcode::Push  => "push R0 onto the stack".to_string(),
    Opcode::Pop   => "pop the stack into R0".to_string(),
    Opcode::Print => "print R0".to_string(),
    Opcode::Input => "read the next input into R0".to_string(),
    Opcode::Halt  => "stop".to_string(),
    Opcode::Sleep => "pause (no effect)".to_string(),
    Opcode::Nop   => "do nothing".to_string(),
  }
}
