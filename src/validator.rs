/*!

  Static analysis over a parsed program. `analyze` is pure: it inspects the
  instructions that parsed successfully and produces warnings, hard errors,
  and descriptive statistics. Warnings never invalidate a program; only an
  out-of-range jump target does. The cycle estimate is for display and never
  enforces anything — the machine's own fuel limit does that at run time.

*/

use std::collections::HashSet;
use std::fmt::{Display, Formatter};

use crate::instruction::Operand;
use crate::opcode::Opcode;
use crate::parser::Program;

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Diagnostic {
  /// 1-based source line, or `None` when the finding concerns the whole
  /// program.
  pub line    : Option<usize>,
  pub message : String,
}

impl Display for Diagnostic {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self.line {
      Some(line) => write!(f, "line {}: {}", line, self.message),
      None       => write!(f, "{}", self.message),
    }
  }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct ProgramStats {
  pub instruction_count : usize,
  pub distinct_opcodes  : usize,
  /// Whether any LOOP or JUMP_IF_ZERO occurs.
  pub has_loops         : bool,
  /// 1 per instruction, except LOOP contributes its literal count.
  pub estimated_cycles  : u64,
}

#[derive(Clone, Debug)]
pub struct ValidationResult {
  pub valid    : bool,
  pub errors   : Vec<Diagnostic>,
  pub warnings : Vec<Diagnostic>,
  pub stats    : ProgramStats,
}

/// Runs every static check against the instructions of `program`. Lines that
/// failed to parse carry no instruction and are invisible here.
pub fn analyze(program: &Program) -> ValidationResult {
  let instructions = &program.instructions;
  let count = instructions.len();

  let mut warnings: Vec<Diagnostic> = Vec::new();
  let mut errors: Vec<Diagnostic> = Vec::new();

  if count == 0 {
    warnings.push(Diagnostic {
      line    : None,
      message : "program is empty".to_string(),
    });
  }
  else if !instructions.iter().any(|i| i.opcode == Opcode::Halt) {
    // An unterminated program is still valid; it halts by running past the
    // end. Learners usually want to know anyway.
    warnings.push(Diagnostic {
      line    : None,
      message : "no HALT instruction; the program only stops by running off the end".to_string(),
    });
  }

  for (index, instruction) in instructions.iter().enumerate() {
    let target = match instruction.operands.first() {
      Some(Operand::Int(target)) => Some(*target),
      _                          => None,
    };

    match instruction.opcode {
      Opcode::Jump => {
        if let Some(target) = target {
          // Heuristic, not a guarantee: an unconditional jump at or behind
          // its own index usually re-runs code it already ran.
          if target <= index as i64 {
            warnings.push(Diagnostic {
              line    : Some(instruction.source_line),
              message : format!(
                "possible infinite loop: JUMP to instruction {} from instruction {}",
                target, index
              ),
            });
          }
          check_target(target, count, instruction.source_line, &mut errors);
        }
      }

      Opcode::JumpIfZero | Opcode::Call => {
        if let Some(target) = target {
          check_target(target, count, instruction.source_line, &mut errors);
        }
      }

      _ => {}
    }
  } // end per-instruction checks

  let stats = gather_stats(program);
  ValidationResult {
    valid: errors.is_empty(),
    errors,
    warnings,
    stats,
  }
}

fn check_target(target: i64, count: usize, line: usize, errors: &mut Vec<Diagnostic>) {
  if target < 0 || target >= count as i64 {
    errors.push(Diagnostic {
      line    : Some(line),
      message : format!(
        "jump target {} is outside the program (0..{})",
        target, count
      ),
    });
  }
}

fn gather_stats(program: &Program) -> ProgramStats {
  let instructions = &program.instructions;

  let distinct: HashSet<Opcode> =
    instructions.iter().map(|i| i.opcode).collect();

  let has_loops = instructions.iter().any(|i| {
    i.opcode == Opcode::Loop || i.opcode == Opcode::JumpIfZero
  });

  let estimated_cycles: u64 =
    instructions.iter()
        .map(|i| match (i.opcode, i.operands.first()) {
          (Opcode::Loop, Some(Operand::Int(n))) => (*n).max(0) as u64,
          _                                     => 1,
        })
        .sum();

  ProgramStats {
    instruction_count: instructions.len(),
    distinct_opcodes: distinct.len(),
    has_loops,
    estimated_cycles,
  }
}
