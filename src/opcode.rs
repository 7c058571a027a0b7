/*!

  The instruction set of the machine. Each opcode is identified externally by an
  emoji token of one to three code points and internally by an `Opcode` variant
  inhabiting a single byte.

  Rust stores enum variants as bytes. As in C, enum values are represented by
  consecutive natural numbers and can be treated as numeric types. Therefore, we
  group the unary opcodes, the variable-arity opcodes, and the nullary opcodes
  together so that a given opcode's arity can be determined with a trivial
  comparison. Consequently, the order the opcodes are listed below is significant.
  Order-dependencies:
      ```
      Opcode::arity()
      ```

*/

use bimap::BiMap;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use strum_macros::{Display as StrumDisplay, EnumIter, EnumString, IntoStaticStr};

#[derive(
  StrumDisplay, IntoStaticStr, EnumString, EnumIter, TryFromPrimitive, IntoPrimitive,
  Clone,        Copy,          Eq,         PartialEq, Debug,           Hash
)]
#[strum(serialize_all = "shouty_snake_case")]
#[repr(u8)]
pub enum Opcode {
  // Unary opcodes //
  Load,          // 📥 n|Rn      R0 = operand
  Add,           // ➕ n|Rn      R0 = R0 + operand
  Sub,           // ➖ n|Rn      R0 = R0 - operand
  Mul,           // ✖️ n|Rn      R0 = R0 * operand
  Div,           // ➗ n|Rn      R0 = R0 / operand
  Mod,           // 🧮 n|Rn      R0 = R0 % operand
  And,           // 🔗 n|Rn      R0 = R0 & operand
  Or,            // 🔀 n|Rn      R0 = R0 | operand
  Xor,           // ⚡ n|Rn      R0 = R0 ^ operand
  Cmp,           // ⚖️ n|Rn      flags from R0 - operand
  Jump,          // 🦘 n|Rn      pc = operand
  JumpIfZero,    // 🎯 n|Rn      pc = operand when the zero flag is set
  Loop,          // 🔁 n|Rn      begin a repeat block of `operand` passes
  Call,          // 📞 n|Rn      subroutine call
  // Opcode 14

  // Variable-arity opcodes //
  Store,         // 📤 [Rn] a    mem[a] = Rn (R0 when omitted)
  Copy,          // 📋 Rd [Rs]   Rd = Rs (R0 when omitted)
  // Opcode 16

  // Nullary opcodes //
  Not,           // 🚫           R0 = !R0
  Return,        // 🔙           end of repeat block or subroutine
  Push,          // 📌           push R0
  Pop,           // 🎈           pop into R0
  Print,         // 🖨️           append R0 to the output log
  Input,         // 🧑‍💻           read the next queued input into R0
  Halt,          // 🛑           stop
  Sleep,         // 😴           advance only
  Nop,           // 🤷           advance only
}

pub const MAX_UNARY_OPCODE: u8 = 14u8;
pub const MAX_VARIADIC_OPCODE: u8 = 16u8;

/// The operand count an opcode accepts. `STORE` and `COPY` take either one or
/// two operands depending on the addressing form, so a single number is not
/// enough.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Arity {
  Fixed(usize),
  Range(usize, usize),
}

impl Arity {
  pub fn accepts(&self, count: usize) -> bool {
    match self {
      Arity::Fixed(n)         => count == *n,
      Arity::Range(low, high) => count >= *low && count <= *high,
    }
  }
}

impl std::fmt::Display for Arity {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Arity::Fixed(n)         => write!(f, "{}", n),
      Arity::Range(low, high) => write!(f, "{} to {}", low, high),
    }
  }
}

#[derive(StrumDisplay, Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Category {
  #[strum(serialize = "data movement")]
  DataMovement,
  #[strum(serialize = "arithmetic")]
  Arithmetic,
  #[strum(serialize = "logic")]
  Logic,
  #[strum(serialize = "comparison")]
  Comparison,
  #[strum(serialize = "control flow")]
  ControlFlow,
  #[strum(serialize = "stack")]
  Stack,
  #[strum(serialize = "I/O")]
  Io,
  #[strum(serialize = "system")]
  System,
}

impl Opcode {
  pub fn code(&self) -> u8 {
    Into::<u8>::into(*self)
  }

  /// The number of operands the parser accepts for this opcode.
  pub fn arity(&self) -> Arity {
    match self.code() {
      value if value < MAX_UNARY_OPCODE    => Arity::Fixed(1),
      value if value < MAX_VARIADIC_OPCODE => Arity::Range(1, 2),
      _value                               => Arity::Fixed(0),
    }
  }

  pub fn category(&self) -> Category {
    match self {
      Opcode::Load | Opcode::Store | Opcode::Copy => Category::DataMovement,

      | Opcode::Add | Opcode::Sub | Opcode::Mul
      | Opcode::Div | Opcode::Mod                 => Category::Arithmetic,

      | Opcode::And | Opcode::Or
      | Opcode::Xor | Opcode::Not                 => Category::Logic,

      Opcode::Cmp                                 => Category::Comparison,

      | Opcode::Jump | Opcode::JumpIfZero | Opcode::Loop
      | Opcode::Return | Opcode::Call             => Category::ControlFlow,

      Opcode::Push | Opcode::Pop                  => Category::Stack,

      Opcode::Print | Opcode::Input               => Category::Io,

      Opcode::Halt | Opcode::Sleep | Opcode::Nop  => Category::System,
    }
  }

  /// The emoji token that names this opcode in source text.
  pub fn emoji(&self) -> &'static str {
    // Every opcode is inserted into `EMOJI_TABLE` at construction, so the
    // lookup cannot fail.
    EMOJI_TABLE.get_by_right(self).unwrap()
  }
}

lazy_static! {
  /**
    The bidirectional mapping between emoji tokens and opcodes. Emoji are stored
    fully composed, variation selectors and joiners included, so a lookup key
    must be accumulated code point by code point (see `crate::lexer`).
  */
  pub static ref EMOJI_TABLE: BiMap<&'static str, Opcode> = {
    let mut table = BiMap::new();
    table.insert("\u{1F4E5}",                   Opcode::Load);       // 📥
    table.insert("\u{2795}",                    Opcode::Add);        // ➕
    table.insert("\u{2796}",                    Opcode::Sub);        // ➖
    table.insert("\u{2716}\u{FE0F}",            Opcode::Mul);        // ✖️
    table.insert("\u{2797}",                    Opcode::Div);        // ➗
    table.insert("\u{1F9EE}",                   Opcode::Mod);        // 🧮
    table.insert("\u{1F517}",                   Opcode::And);        // 🔗
    table.insert("\u{1F500}",                   Opcode::Or);         // 🔀
    table.insert("\u{26A1}",                    Opcode::Xor);        // ⚡
    table.insert("\u{2696}\u{FE0F}",            Opcode::Cmp);        // ⚖️
    table.insert("\u{1F998}",                   Opcode::Jump);       // 🦘
    table.insert("\u{1F3AF}",                   Opcode::JumpIfZero); // 🎯
    table.insert("\u{1F501}",                   Opcode::Loop);       // 🔁
    table.insert("\u{1F4DE}",                   Opcode::Call);       // 📞
    table.insert("\u{1F4E4}",                   Opcode::Store);      // 📤
    table.insert("\u{1F4CB}",                   Opcode::Copy);       // 📋
    table.insert("\u{1F6AB}",                   Opcode::Not);        // 🚫
    table.insert("\u{1F519}",                   Opcode::Return);     // 🔙
    table.insert("\u{1F4CC}",                   Opcode::Push);       // 📌
    table.insert("\u{1F388}",                   Opcode::Pop);        // 🎈
    table.insert("\u{1F5A8}\u{FE0F}",           Opcode::Print);      // 🖨️
    table.insert("\u{1F9D1}\u{200D}\u{1F4BB}",  Opcode::Input);      // 🧑‍💻
    table.insert("\u{1F6D1}",                   Opcode::Halt);       // 🛑
    table.insert("\u{1F634}",                   Opcode::Sleep);      // 😴
    table.insert("\u{1F937}",                   Opcode::Nop);        // 🤷
    table
  };
}

/// Looks up the opcode named by a fully accumulated emoji token.
pub fn opcode_for_emoji(emoji: &str) -> Option<Opcode> {
  EMOJI_TABLE.get_by_left(&emoji).copied()
}

/// Determines whether `candidate` is a proper prefix of at least one emoji
/// token, i.e. whether extending the accumulated run could still produce a
/// match.
pub fn is_emoji_prefix(candidate: &str) -> bool {
  EMOJI_TABLE
      .left_values()
      .any(|emoji| emoji.starts_with(candidate) && emoji.len() > candidate.len())
}
