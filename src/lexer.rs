/*!

  The lexer scans raw source text into a flat token stream. Opcodes are emoji
  of one to three code points (a base character optionally followed by a
  variation selector or joined to a second character with a ZWJ), so scanning
  works code point by code point: at each position we greedily extend a
  candidate emoji run while the accumulated string is still a recognized opcode
  or a proper prefix of one, and emit the longest confirmed match. A run that
  never confirms is rewound and re-scanned as an ordinary lexeme.

  Ordinary lexemes are maximal runs of non-whitespace code points, classified
  after the fact: integers (`-?[0-9]+`), registers (`R0`–`R7`), everything else
  `Unknown`. Unknown tokens keep their raw text and exact column so the parser
  can attach suggestions to them.

*/

use nom::character::complete::{char as one_char, digit1, one_of};
use nom::combinator::{all_consuming, opt, recognize};
use nom::error::ErrorKind;
use nom::sequence::{pair, preceded};

use crate::opcode::{is_emoji_prefix, opcode_for_emoji, Opcode};
use crate::scanner::{CharScanner, Mark};
use crate::token::{Token, TokenKind};

/// Scans `source` into tokens. Never fails: unclassifiable text becomes
/// `Unknown` tokens for the parser to report.
pub fn tokenize(source: &str) -> Vec<Token> {
  let mut scanner = CharScanner::new(source);
  let mut tokens: Vec<Token> = Vec::new();

  while let Some(c) = scanner.peek() {
    let line   = scanner.line();
    let column = scanner.column();

    if c == '\n' {
      scanner.next();
      tokens.push(Token::new(TokenKind::Newline, "\n", line, column));
    }
    else if c.is_whitespace() {
      scanner.next();
    }
    else if c == '#' {
      tokens.push(scan_comment(&mut scanner, line, column));
    }
    else if c == '"' {
      tokens.push(scan_string(&mut scanner, line, column));
    }
    else if let Some(token) = scan_opcode(&mut scanner, line, column) {
      tokens.push(token);
    }
    else {
      match CharScanner::take_while(&mut scanner, is_plain_lexeme_char) {
        Some(run) => tokens.push(classify_run(&run, line, column)),
        None      => {
          // A lone `"`/`#` cannot reach here, so this is an emoji-ish code
          // point that failed to confirm. Consume it as Unknown.
          if let Some(stray) = scanner.next() {
            tokens.push(Token::new(TokenKind::Unknown, stray.to_string(), line, column));
          }
        }
      }
    }
  } // end while more code points

  tokens
}

/// True for code points that may continue an ordinary (non-emoji) lexeme.
fn is_plain_lexeme_char(c: char) -> bool {
  !c.is_whitespace() && c != '#' && c != '"' && !begins_opcode(c)
}

/// True when `c` could start an emoji opcode token.
fn begins_opcode(c: char) -> bool {
  let mut candidate = String::new();
  candidate.push(c);
  opcode_for_emoji(&candidate).is_some() || is_emoji_prefix(&candidate)
}

/**
  Greedily matches an emoji opcode at the current position. Extends the
  accumulated run one code point at a time while it remains a recognized opcode
  or a valid prefix toward one; the longest confirmed match wins. On failure the
  scanner is rewound to where it started and `None` is returned.
*/
fn scan_opcode(scanner: &mut CharScanner, line: usize, column: usize) -> Option<Token> {
  let start = scanner.mark();
  let mut accumulated = String::new();
  let mut confirmed: Option<(Opcode, String, Mark)> = None;

  while let Some(c) = scanner.peek() {
    accumulated.push(c);

    if let Some(opcode) = opcode_for_emoji(&accumulated) {
      scanner.next();
      confirmed = Some((opcode, accumulated.clone(), scanner.mark()));
    }
    else if is_emoji_prefix(&accumulated) {
      scanner.next();
    }
    else {
      // Appending `c` can no longer produce a match.
      break;
    }
  }

  match confirmed {
    Some((opcode, text, end)) => {
      scanner.rewind(end);
      Some(Token::new(TokenKind::Opcode(opcode), text, line, column))
    }
    None => {
      scanner.rewind(start);
      None
    }
  }
}

/// Consumes `#` through end of line. The token is retained in the stream so
/// comments survive tokenization; the parser drops them.
fn scan_comment(scanner: &mut CharScanner, line: usize, column: usize) -> Token {
  let mut text = String::new();
  while let Some(c) = scanner.peek() {
    if c == '\n' {
      break;
    }
    text.push(c);
    scanner.next();
  }
  Token::new(TokenKind::Comment, text, line, column)
}

/// Consumes a `"…"` string. There is no escape processing. A string left open
/// at end of line becomes an Unknown token covering the rest of the line.
fn scan_string(scanner: &mut CharScanner, line: usize, column: usize) -> Token {
  let mut raw = String::new();
  if let Some(quote) = scanner.next() {
    raw.push(quote);
  }

  let mut content = String::new();
  let mut closed  = false;
  while let Some(c) = scanner.peek() {
    if c == '\n' {
      break;
    }
    scanner.next();
    raw.push(c);
    if c == '"' {
      closed = true;
      break;
    }
    content.push(c);
  }

  match closed {
    true  => Token::new(TokenKind::Str(content), raw, line, column),
    false => Token::new(TokenKind::Unknown, raw, line, column),
  }
}

/// Classifies a completed non-emoji lexeme.
fn classify_run(run: &str, line: usize, column: usize) -> Token {
  let number =
    all_consuming::<_, _, (&str, ErrorKind), _>(
      recognize(pair(opt(one_char('-')), digit1))
    )(run);
  if let Ok((_rest, digits)) = number {
    return match digits.parse::<i64>() {
      Ok(value) => Token::new(TokenKind::Number(value), run, line, column),
      // Literal too large for the machine's integers.
      Err(_)    => Token::new(TokenKind::Unknown, run, line, column),
    };
  }

  let register =
    all_consuming::<_, _, (&str, ErrorKind), _>(
      preceded(one_char('R'), one_of("01234567"))
    )(run);
  if let Ok((_rest, digit)) = register {
    return Token::new(TokenKind::Register(digit as u8 - b'0'), run, line, column);
  }

  Token::new(TokenKind::Unknown, run, line, column)
}


#[cfg(test)]
mod tests {
  use super::*;

  fn kinds(source: &str) -> Vec<TokenKind> {
    tokenize(source).into_iter().map(|t| t.kind).collect()
  }

  #[test]
  fn scans_a_simple_program() {
    assert_eq!(
      kinds("📥 42\n🖨️\n🛑"),
      vec![
        TokenKind::Opcode(Opcode::Load),
        TokenKind::Number(42),
        TokenKind::Newline,
        TokenKind::Opcode(Opcode::Print),
        TokenKind::Newline,
        TokenKind::Opcode(Opcode::Halt),
      ]
    );
  }

  #[test]
  fn variation_selector_and_zwj_sequences() {
    assert_eq!(
      kinds("✖️ 3\n🧑‍💻"),
      vec![
        TokenKind::Opcode(Opcode::Mul),
        TokenKind::Number(3),
        TokenKind::Newline,
        TokenKind::Opcode(Opcode::Input),
      ]
    );
  }

  #[test]
  fn bare_base_character_does_not_confirm() {
    // U+2716 without its variation selector is a prefix, never a match.
    assert_eq!(kinds("\u{2716}"), vec![TokenKind::Unknown]);
  }

  #[test]
  fn emoji_and_number_need_no_separator() {
    assert_eq!(
      kinds("🔁3"),
      vec![TokenKind::Opcode(Opcode::Loop), TokenKind::Number(3)]
    );
  }

  #[test]
  fn registers_and_near_misses() {
    assert_eq!(
      kinds("R0 R7 R8 R12 R"),
      vec![
        TokenKind::Register(0),
        TokenKind::Register(7),
        TokenKind::Unknown,
        TokenKind::Unknown,
        TokenKind::Unknown,
      ]
    );
  }

  #[test]
  fn negative_numbers_and_stray_minus() {
    assert_eq!(kinds("-17 -"), vec![TokenKind::Number(-17), TokenKind::Unknown]);
  }

  #[test]
  fn oversized_literal_is_unknown() {
    assert_eq!(kinds("99999999999999999999"), vec![TokenKind::Unknown]);
  }

  #[test]
  fn comments_are_retained_with_text() {
    let tokens = tokenize("📥 1 # load the answer\n🛑");
    assert_eq!(tokens[2].kind, TokenKind::Comment);
    assert_eq!(tokens[2].text, "# load the answer");
  }

  #[test]
  fn strings_have_no_escapes() {
    assert_eq!(
      kinds("\"hi there\""),
      vec![TokenKind::Str("hi there".to_string())]
    );
    // Unterminated: swallowed to end of line as Unknown.
    assert_eq!(kinds("\"oops\n🛑"), vec![
      TokenKind::Unknown,
      TokenKind::Newline,
      TokenKind::Opcode(Opcode::Halt),
    ]);
  }

  #[test]
  fn columns_count_code_points() {
    let tokens = tokenize("📥 x");
    assert_eq!(tokens[0].column, 1);
    // The emoji is one code point wide, the space one more.
    assert_eq!(tokens[1].column, 3);
    assert_eq!(tokens[1].kind, TokenKind::Unknown);
  }
}
