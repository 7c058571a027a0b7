/*!

  Control-stack frames. LOOP/RETURN repeat blocks and CALL/RETURN subroutines
  share one stack of tagged frames, and RETURN decides what to do with an
  explicit match on the top frame's tag. The PUSH/POP value stack is a
  separate, data-only structure, so stack arithmetic can never corrupt a
  return address.

*/

use std::fmt::{Display, Formatter};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Frame {
  /// One active LOOP block: the index of the LOOP instruction itself and the
  /// passes still owed.
  Loop {
    start     : usize,
    remaining : i64,
  },
  /// A subroutine activation: where CALL will resume.
  Call {
    return_to : usize,
  },
}

impl Frame {
  /// Whether this is a loop frame anchored at instruction `index`.
  pub fn anchored_at(&self, index: usize) -> bool {
    match self {
      Frame::Loop { start, .. } => *start == index,
      Frame::Call { .. }        => false,
    }
  }
}

impl Display for Frame {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Frame::Loop { start, remaining } => write!(f, "loop@{}x{}", start, remaining),
      Frame::Call { return_to }        => write!(f, "call->{}", return_to),
    }
  }
}
