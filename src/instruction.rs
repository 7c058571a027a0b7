/*!

  Typed instructions as produced by the parser. An `Instruction` is immutable
  once built: the opcode, the operands in source order, the 1-based source line
  it came from, and the raw line text for diagnostics and round-tripping.

  Operand strings are interned. Instructions are cloned when a program is
  loaded into the machine, and an interned atom makes that clone cheap.

*/

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;

use crate::opcode::Opcode;

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Operand {
  /// An integer literal.
  Int(i64),
  /// A register reference `R0`–`R7`, held by index.
  Register(u8),
  /// A string literal, unquoted.
  Str(DefaultAtom),
}

impl Display for Operand {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Operand::Int(value)    => write!(f, "{}", value),
      Operand::Register(r)   => write!(f, "R{}", r),
      Operand::Str(text)     => write!(f, "\"{}\"", text),
    }
  }
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Instruction {
  pub opcode      : Opcode,
  pub operands    : Vec<Operand>,
  /// 1-based line in the source the instruction was parsed from.
  pub source_line : usize,
  /// The trimmed source text of the line, comments included.
  pub raw_text    : String,
}

impl Instruction {
  pub fn new(
    opcode: Opcode,
    operands: Vec<Operand>,
    source_line: usize,
    raw_text: impl Into<String>,
  ) -> Self {
    Instruction { opcode, operands, source_line, raw_text: raw_text.into() }
  }
}

impl Display for Instruction {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.operands.is_empty() {
      true  => write!(f, "{}", self.opcode),
      false => {
        let rendered =
          self.operands
              .iter()
              .map(Operand::to_string)
              .collect::<Vec<String>>()
              .join(", ");
        write!(f, "{}({})", self.opcode, rendered)
      }
    }
  }
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_forms() {
    let load = Instruction::new(Opcode::Load, vec![Operand::Int(42)], 1, "📥 42");
    assert_eq!(format!("{}", load), "LOAD(42)");

    let store = Instruction::new(
      Opcode::Store,
      vec![Operand::Register(3), Operand::Int(16)],
      2,
      "📤 R3 16",
    );
    assert_eq!(format!("{}", store), "STORE(R3, 16)");

    let halt = Instruction::new(Opcode::Halt, vec![], 3, "🛑");
    assert_eq!(format!("{}", halt), "HALT");
  }
}
