/*!

  The parser groups the flat token stream into per-line token lists and
  resolves each line independently into a typed `Instruction` or a structured
  `ParseError`. A single line is the unit of resolution; lines are never
  combined. Errors are ordinary values collected into the `Program` — parsing
  never panics and never throws past the crate boundary.

*/

use std::fmt::{Display, Formatter};

use string_cache::DefaultAtom;
use strum::IntoEnumIterator;

use crate::instruction::{Instruction, Operand};
use crate::opcode::Opcode;
use crate::token::{Token, TokenKind};

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ParseError {
  pub line       : usize,
  pub column     : usize,
  pub message    : String,
  pub suggestion : Option<String>,
  pub raw_text   : String,
}

impl Display for ParseError {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "Error on line {}: {}", self.line, self.message)?;
    if let Some(suggestion) = &self.suggestion {
      write!(f, " ({})", suggestion)?;
    }
    Ok(())
  }
}

/// The result of one parse. Built once per compile and never mutated
/// afterward; re-running a program re-compiles it.
#[derive(Clone, Debug)]
pub struct Program {
  pub instructions : Vec<Instruction>,
  pub source_text  : String,
  pub errors       : Vec<ParseError>,
  pub valid        : bool,
}

/// Resolves a token stream into a `Program`. `source` is the text the tokens
/// were scanned from; it supplies the raw line text attached to instructions
/// and errors.
pub fn parse(tokens: Vec<Token>, source: &str) -> Program {
  let source_lines: Vec<&str> = source.lines().collect();

  let mut instructions: Vec<Instruction> = Vec::new();
  let mut errors: Vec<ParseError> = Vec::new();

  // Split the stream on newline tokens. Lines resolve independently.
  let mut current: Vec<Token> = Vec::new();
  let mut lines: Vec<Vec<Token>> = Vec::new();
  for token in tokens {
    match token.kind {
      TokenKind::Newline => lines.push(std::mem::replace(&mut current, Vec::new())),
      _                  => current.push(token),
    }
  }
  lines.push(current);

  for line_tokens in lines {
    match resolve_line(line_tokens, &source_lines) {
      Some(Ok(instruction)) => instructions.push(instruction),
      Some(Err(error))      => errors.push(error),
      None                  => {} // blank or comment-only line
    }
  }

  let valid = errors.is_empty();
  Program {
    instructions,
    source_text: source.to_string(),
    errors,
    valid,
  }
}

/// Resolves one line of tokens. `None` means the line held nothing but
/// whitespace or a comment.
fn resolve_line(
  tokens: Vec<Token>,
  source_lines: &[&str],
) -> Option<Result<Instruction, ParseError>> {
  let meaningful: Vec<Token> =
    tokens.into_iter()
          .filter(|t| t.kind != TokenKind::Comment)
          .collect();
  if meaningful.is_empty() {
    return None;
  }

  let line = meaningful[0].line;
  let raw_text = raw_line(source_lines, line);

  // Locate the instruction. The first opcode token on the line wins; see
  // DESIGN.md for the treatment of any later one.
  let opcode_position = match meaningful.iter().position(Token::is_opcode) {
    Some(position) => position,
    None => {
      let error = match meaningful.iter().find(|t| t.kind == TokenKind::Unknown) {
        Some(unknown) => ParseError {
          line,
          column     : unknown.column,
          message    : format!("`{}` is not an instruction", unknown.text),
          suggestion : suggest(&unknown.text),
          raw_text,
        },
        None => ParseError {
          line,
          column     : meaningful[0].column,
          message    : "no instruction found on this line".to_string(),
          suggestion : None,
          raw_text,
        },
      };
      return Some(Err(error));
    }
  };

  let opcode = match meaningful[opcode_position].kind {
    TokenKind::Opcode(opcode) => opcode,
    _                         => return None, // position() guarantees an opcode
  };

  // Resolve the remaining tokens into operands, left to right.
  let mut operands: Vec<Operand> = Vec::new();
  for (position, token) in meaningful.iter().enumerate() {
    if position == opcode_position {
      continue;
    }
    match &token.kind {
      TokenKind::Number(value)  => operands.push(Operand::Int(*value)),
      TokenKind::Register(r)    => operands.push(Operand::Register(*r)),
      TokenKind::Str(text)      => operands.push(Operand::Str(DefaultAtom::from(text.as_str()))),
      TokenKind::Opcode(second) => {
        return Some(Err(ParseError {
          line,
          column     : token.column,
          message    : format!("unexpected second instruction {} on this line", second),
          suggestion : None,
          raw_text,
        }));
      }
      TokenKind::Unknown => {
        return Some(Err(ParseError {
          line,
          column     : token.column,
          message    : format!("`{}` is not a valid operand", token.text),
          suggestion : suggest(&token.text),
          raw_text,
        }));
      }
      TokenKind::Comment | TokenKind::Newline => {} // filtered out above
    }
  }

  // STORE and COPY take one or two operands depending on the addressing
  // form; `Arity::accepts` knows about the range, so the generic check
  // below does not reject them.
  let arity = opcode.arity();
  if !arity.accepts(operands.len()) {
    return Some(Err(ParseError {
      line,
      column     : meaningful[opcode_position].column,
      message    : format!(
        "{} requires {} operand(s) but was given {}",
        opcode, arity, operands.len()
      ),
      suggestion : None,
      raw_text,
    }));
  }

  Some(Ok(Instruction::new(opcode, operands, line, raw_text)))
}

fn raw_line(source_lines: &[&str], line: usize) -> String {
  source_lines
      .get(line.wrapping_sub(1))
      .map(|text| text.trim().to_string())
      .unwrap_or_default()
}

/**
  Best-effort suggestion for an unrecognized token: substring containment
  against the emoji and names of the full opcode set. Deliberately cheap — no
  edit distance.
*/
fn suggest(unknown: &str) -> Option<String> {
  let needle = unknown.to_uppercase();
  if needle.is_empty() {
    return None;
  }

  for opcode in Opcode::iter() {
    let name: &'static str = opcode.into();
    let emoji = opcode.emoji();
    if name.contains(needle.as_str())
        || needle.contains(name)
        || emoji.contains(unknown)
        || unknown.contains(emoji)
    {
      return Some(format!("did you mean {} ({})?", emoji, name));
    }
  }
  None
}
