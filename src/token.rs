/*!

  Lexical tokens produced by the lexer and consumed entirely by the parser. A
  token records its kind, the raw text it was scanned from, and the 1-based
  line and code-point column where it began. Comment tokens are retained in the
  stream so that source can be round-tripped, and are dropped by the parser.

*/

use std::fmt::{Display, Formatter};

use crate::opcode::Opcode;

#[derive(Clone, Eq, PartialEq, Debug)]
pub enum TokenKind {
  /// A recognized emoji opcode.
  Opcode(Opcode),
  /// An integer literal, `-?[0-9]+`.
  Number(i64),
  /// A register name `R0`–`R7`, holding the register index.
  Register(u8),
  /// A `"…"`-delimited string, holding the unquoted text.
  Str(String),
  /// A `#` comment running to end of line, `#` included.
  Comment,
  /// A line break; the parser splits instruction lines on these.
  Newline,
  /// Anything the lexer could not classify. Kept verbatim for diagnostics.
  Unknown,
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Token {
  pub kind   : TokenKind,
  pub text   : String,
  pub line   : usize,
  pub column : usize,
}

impl Token {
  pub fn new(kind: TokenKind, text: impl Into<String>, line: usize, column: usize) -> Self {
    Token { kind, text: text.into(), line, column }
  }

  pub fn is_opcode(&self) -> bool {
    match self.kind {
      TokenKind::Opcode(_) => true,
      _                    => false,
    }
  }
}

impl Display for Token {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match &self.kind {
      TokenKind::Opcode(opcode) => write!(f, "{}({})", opcode, self.text),
      TokenKind::Number(n)      => write!(f, "Number({})", n),
      TokenKind::Register(r)    => write!(f, "Register(R{})", r),
      TokenKind::Str(s)         => write!(f, "Str(\"{}\")", s),
      TokenKind::Comment        => write!(f, "Comment"),
      TokenKind::Newline        => write!(f, "Newline"),
      TokenKind::Unknown        => write!(f, "Unknown({})", self.text),
    }
  }
}
