/*!

  Execution events. In precise mode the machine buffers one record per
  observable side effect while an instruction runs and dispatches the buffer
  to listeners after the instruction has committed, so a listener never sees
  a half-applied instruction. Fast mode emits nothing. Events are records the
  machine hands out and forgets; it never stores them.

*/

use std::time::SystemTime;

use crate::opcode::Opcode;

#[derive(Clone, Debug)]
pub enum EventKind {
  /// An instruction was fetched and ran to completion (or faulted).
  InstructionExecuted {
    index  : usize,
    opcode : Opcode,
    line   : usize,
  },
  RegisterChanged {
    register : usize,
    value    : i64,
  },
  MemoryWritten {
    address : usize,
    value   : u8,
  },
  OutputProduced {
    text : String,
  },
  ErrorRaised {
    message : String,
  },
  Halted {
    cycles : u64,
  },
}

#[derive(Clone, Debug)]
pub struct ExecutionEvent {
  pub kind : EventKind,
  pub at   : SystemTime,
}

pub type ListenerId = usize;
