/*!

  The virtual machine: the register file, the byte memory, the value and
  control stacks, and the step loop that drives them.

  Execution is entirely caller-driven. `step()` performs exactly one
  instruction and reports whether stepping can continue; `run()` is nothing
  but "call `step()` until it says stop". There is no persistent running
  state, so a host can interleave arbitrary work between steps and cancel by
  simply not calling again.

  Operands are pre-resolved once at load time into an immediate/register
  tagged form, and one canonical handler per opcode operates on that form.
  The "precise" path is a thin wrapper that buffers events around the same
  handlers; the "fast" path skips event work and nothing else. Divergence
  between two independent interpreters is the classic failure mode of this
  design, and sharing the handler table is what rules it out — both paths
  must produce identical final state for identical programs and inputs,
  jump bounds checks included.

  All runtime faults are trapped in the step loop and converted into
  `halted = true` plus a descriptive error. The machine never panics across
  its public boundary; an interactive host stays alive and shows the message.

*/

mod cpu;
mod event;
mod fault;
mod frame;

use std::collections::VecDeque;
use std::fmt::{Display, Formatter};
use std::time::SystemTime;

use prettytable::{format as TableFormat, Table};
use string_cache::DefaultAtom;

use crate::instruction::{Instruction, Operand};
use crate::memory::{Memory, MemoryState};
use crate::opcode::Opcode;

pub use cpu::{CpuState, Flags, OVERFLOW_MAX, OVERFLOW_MIN, REGISTER_COUNT};
pub use event::{EventKind, ExecutionEvent, ListenerId};
pub use fault::Fault;
pub use frame::Frame;

/// The fuel budget: how many instructions may execute before the machine
/// halts with a distinguished fault. The only termination guarantee there is.
pub const DEFAULT_CYCLE_LIMIT: u64 = 100_000;

/// An operand with its addressing mode decided once, at load time. Whether a
/// register operand names `R3` is static; what `R3` holds is read at the
/// moment the instruction executes.
#[derive(Clone, Debug)]
enum Resolved {
  Immediate(i64),
  Register(usize),
  /// String literals parse but no opcode consumes one; executing it faults.
  Text(DefaultAtom),
}

#[derive(Clone, Debug)]
struct ResolvedInstruction {
  opcode   : Opcode,
  operands : Vec<Resolved>,
  line     : usize,
}

/// Everything a host may want to know after stepping or running: defensive
/// copies throughout, never live references into the machine.
#[derive(Clone, Debug)]
pub struct VmState {
  pub cpu    : CpuState,
  pub memory : MemoryState,
  pub output : Vec<String>,
  pub error  : Option<String>,
}

pub struct Vm {
  cpu            : CpuState,
  memory         : Memory,
  program        : Vec<Instruction>,
  resolved       : Vec<ResolvedInstruction>,
  value_stack    : Vec<i64>,
  control_stack  : Vec<Frame>,
  input_queue    : VecDeque<String>,
  output         : Vec<String>,
  error          : Option<Fault>,
  fast_mode      : bool,
  cycle_limit    : u64,
  listeners      : Vec<(ListenerId, Box<dyn FnMut(&ExecutionEvent)>)>,
  next_listener  : ListenerId,
  pending_events : Vec<EventKind>,
}

impl Vm {

  // region Lifecycle

  pub fn new() -> Vm {
    Vm::with_memory(Memory::new())
  }

  pub fn with_memory_size(size: usize) -> Vm {
    Vm::with_memory(Memory::with_size(size))
  }

  fn with_memory(memory: Memory) -> Vm {
    let stack_top = memory.size() as i64 - 1;
    Vm {
      cpu            : CpuState::new(stack_top),
      memory,
      program        : Vec::new(),
      resolved       : Vec::new(),
      value_stack    : Vec::new(),
      control_stack  : Vec::new(),
      input_queue    : VecDeque::new(),
      output         : Vec::new(),
      error          : None,
      fast_mode      : false,
      cycle_limit    : DEFAULT_CYCLE_LIMIT,
      listeners      : Vec::new(),
      next_listener  : 0,
      pending_events : Vec::new(),
    }
  }

  /// Loads a program and returns the machine to Loaded/Idle: registers,
  /// memory, stacks, output, and error are all cleared.
  pub fn load_program(&mut self, instructions: &[Instruction]) {
    self.program = instructions.to_vec();
    self.resolved = instructions.iter().map(resolve_instruction).collect();
    self.reset();
  }

  /// Back to Loaded/Idle. The loaded program and any queued input survive; a
  /// host that queued input owns that queue.
  pub fn reset(&mut self) {
    let stack_top = self.memory.size() as i64 - 1;
    self.cpu = CpuState::new(stack_top);
    self.memory.clear();
    self.value_stack.clear();
    self.control_stack.clear();
    self.output.clear();
    self.error = None;
    self.pending_events.clear();
  }

  /// Queues one input value for INPUT to consume. Never blocks anything:
  /// INPUT on an empty queue yields 0.
  pub fn provide_input(&mut self, value: &str) {
    self.input_queue.push_back(value.to_string());
  }

  /// Fast mode skips event buffering and dispatch, nothing else.
  pub fn set_fast_mode(&mut self, fast: bool) {
    self.fast_mode = fast;
  }

  pub fn set_cycle_limit(&mut self, limit: u64) {
    self.cycle_limit = limit;
  }

  /// Registers an execution-event listener; returns the id to unsubscribe
  /// with.
  pub fn on_event(&mut self, listener: Box<dyn FnMut(&ExecutionEvent)>) -> ListenerId {
    let id = self.next_listener;
    self.next_listener += 1;
    self.listeners.push((id, listener));
    id
  }

  pub fn remove_listener(&mut self, id: ListenerId) -> bool {
    let before = self.listeners.len();
    self.listeners.retain(|(listener_id, _)| *listener_id != id);
    self.listeners.len() != before
  }

  // endregion

  // region Read accessors

  pub fn state(&self) -> VmState {
    VmState {
      cpu    : self.cpu.clone(),
      memory : self.memory.snapshot(),
      output : self.output.clone(),
      error  : self.error.as_ref().map(Fault::to_string),
    }
  }

  pub fn cpu(&self) -> CpuState {
    self.cpu.clone()
  }

  pub fn memory_snapshot(&self) -> MemoryState {
    self.memory.snapshot()
  }

  pub fn output(&self) -> Vec<String> {
    self.output.clone()
  }

  pub fn last_fault(&self) -> Option<&Fault> {
    self.error.as_ref()
  }

  /// The memory store itself, for hosts that prepare or inspect bytes
  /// through its own bounds-checked interface.
  pub fn memory_mut(&mut self) -> &mut Memory {
    &mut self.memory
  }

  // endregion

  // region Step loop

  /**
    Executes one instruction. Returns `true` when the machine can keep going,
    `false` on any halt: HALT executed, program counter past the end, a
    runtime fault, or the cycle limit.
  */
  pub fn step(&mut self) -> bool {
    if self.cpu.halted {
      return false;
    }

    // Running past the end is a normal halt, not an error.
    if self.cpu.program_counter >= self.resolved.len() {
      self.cpu.halted = true;
      self.push_event(EventKind::Halted { cycles: self.cpu.cycles });
      self.dispatch_events();
      return false;
    }

    if self.cpu.cycles >= self.cycle_limit {
      self.fault(Fault::CycleLimitReached { limit: self.cycle_limit });
      self.dispatch_events();
      return false;
    }
    self.cpu.cycles += 1;

    let index = self.cpu.program_counter;
    if let Err(fault) = self.execute(index) {
      self.fault(fault);
    }

    #[cfg(feature = "trace_computation")] println!("{}", self);

    self.dispatch_events();
    !self.cpu.halted
  }

  /// Steps until the machine halts, then returns the final snapshot.
  pub fn run(&mut self) -> VmState {
    while self.step() {}
    self.state()
  }

  /// The canonical handler table. Both execution paths land here; only event
  /// emission differs between them.
  fn execute(&mut self, index: usize) -> Result<(), Fault> {
    let opcode = self.resolved[index].opcode;
    let line = self.resolved[index].line;
    self.push_event(EventKind::InstructionExecuted { index, opcode, line });

    match opcode {

      Opcode::Load => {
        let value = self.operand_value(index, 0)?;
        self.set_register(0, value);
        self.advance();
      }

      | Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Div
      | Opcode::Mod | Opcode::And | Opcode::Or  | Opcode::Xor => {
        let rhs = self.operand_value(index, 0)?;
        let lhs = self.cpu.registers[0];
        let result = match opcode {
          Opcode::Add => lhs.wrapping_add(rhs),
          Opcode::Sub => lhs.wrapping_sub(rhs),
          Opcode::Mul => lhs.wrapping_mul(rhs),
          Opcode::Div => {
            if rhs == 0 {
              return Err(Fault::DivisionByZero { line });
            }
            lhs.wrapping_div(rhs)
          }
          Opcode::Mod => {
            if rhs == 0 {
              return Err(Fault::ModuloByZero { line });
            }
            lhs.wrapping_rem(rhs)
          }
          Opcode::And => lhs & rhs,
          Opcode::Or  => lhs | rhs,
          _xor        => lhs ^ rhs,
        };
        self.set_flags(result);
        self.set_register(0, result);
        self.advance();
      }

      Opcode::Not => {
        let result = !self.cpu.registers[0];
        self.set_flags(result);
        self.set_register(0, result);
        self.advance();
      }

      Opcode::Cmp => {
        let rhs = self.operand_value(index, 0)?;
        let result = self.cpu.registers[0].wrapping_sub(rhs);
        // Flags only; the accumulator is untouched.
        self.set_flags(result);
        self.advance();
      }

      Opcode::Store => {
        let value = match self.operand_count(index) {
          2      => {
            let source = self.operand_register(index, 0)?;
            self.cpu.registers[source]
          }
          _other => self.cpu.registers[0],
        };
        let address = match self.operand_count(index) {
          2      => self.operand_value(index, 1)?,
          _other => self.operand_value(index, 0)?,
        };
        self.write_memory(address, value)?;
        self.advance();
      }

      Opcode::Copy => {
        let destination = self.operand_register(index, 0)?;
        let value = match self.operand_count(index) {
          2      => {
            let source = self.operand_register(index, 1)?;
            self.cpu.registers[source]
          }
          _other => self.cpu.registers[0],
        };
        self.set_register(destination, value);
        self.advance();
      }

      Opcode::Jump => {
        let target = self.operand_value(index, 0)?;
        self.cpu.program_counter = self.check_jump_target(target, line)?;
      }

      Opcode::JumpIfZero => {
        let target = self.operand_value(index, 0)?;
        match self.cpu.flags.zero {
          true  => {
            self.cpu.program_counter = self.check_jump_target(target, line)?;
          }
          false => self.advance(),
        }
      }

      Opcode::Loop => {
        let count = self.operand_value(index, 0)?;
        // Passing through the same LOOP again while its block is still live
        // must not stack a second frame.
        let anchored = self.control_stack.iter().any(|frame| frame.anchored_at(index));
        if !anchored {
          self.control_stack.push(Frame::Loop { start: index, remaining: count });
        }
        self.advance();
      }

      Opcode::Return => {
        match self.control_stack.last().copied() {

          Some(Frame::Loop { start, remaining }) => {
            let remaining = remaining - 1;
            match remaining > 0 {
              true  => {
                if let Some(Frame::Loop { remaining: slot, .. }) = self.control_stack.last_mut() {
                  *slot = remaining;
                }
                // Continue the block just after the LOOP instruction.
                self.cpu.program_counter = start + 1;
              }
              false => {
                self.control_stack.pop();
                self.advance();
              }
            }
          }

          Some(Frame::Call { return_to }) => {
            self.control_stack.pop();
            self.cpu.program_counter = return_to;
          }

          None => {
            // Neither a repeat block nor a subroutine: nothing to do.
            self.advance();
          }

        } // end match on top frame
      }

      Opcode::Call => {
        let target = self.operand_value(index, 0)?;
        let destination = self.check_jump_target(target, line)?;
        self.control_stack.push(Frame::Call { return_to: index + 1 });
        self.cpu.program_counter = destination;
      }

      Opcode::Push => {
        self.value_stack.push(self.cpu.registers[0]);
        self.cpu.stack_pointer -= 1;
        self.advance();
      }

      Opcode::Pop => {
        match self.value_stack.pop() {
          Some(value) => {
            self.cpu.stack_pointer += 1;
            self.set_register(0, value);
            self.advance();
          }
          None => {
            return Err(Fault::StackUnderflow { line });
          }
        }
      }

      Opcode::Print => {
        let text = self.cpu.registers[0].to_string();
        self.output.push(text.clone());
        self.push_event(EventKind::OutputProduced { text });
        self.advance();
      }

      Opcode::Input => {
        let value = match self.input_queue.pop_front() {
          Some(text) => text.trim().parse::<i64>().unwrap_or(0),
          None       => 0,
        };
        self.set_register(0, value);
        self.advance();
      }

      Opcode::Halt => {
        self.cpu.halted = true;
        self.push_event(EventKind::Halted { cycles: self.cpu.cycles });
      }

      Opcode::Sleep | Opcode::Nop => {
        self.advance();
      }

    } // end match opcode

    Ok(())
  }

  // endregion

  // region Handler helpers

  fn advance(&mut self) {
    self.cpu.program_counter += 1;
  }

  /// Resolves an operand to its value at this moment: immediates are
  /// themselves, register references read the current register contents.
  fn operand_value(&self, index: usize, slot: usize) -> Result<i64, Fault> {
    let instruction = &self.resolved[index];
    match instruction.operands.get(slot) {
      Some(Resolved::Immediate(value)) => Ok(*value),
      Some(Resolved::Register(r))      => Ok(self.cpu.registers[*r]),
      Some(Resolved::Text(_))          => Err(Fault::InvalidOperand {
        opcode: instruction.opcode,
        line: instruction.line,
      }),
      None                             => Err(Fault::MissingOperand {
        opcode: instruction.opcode,
        line: instruction.line,
      }),
    }
  }

  /// Like `operand_value` but the operand must name a register.
  fn operand_register(&self, index: usize, slot: usize) -> Result<usize, Fault> {
    let instruction = &self.resolved[index];
    match instruction.operands.get(slot) {
      Some(Resolved::Register(r)) => Ok(*r),
      Some(_other)                => Err(Fault::InvalidOperand {
        opcode: instruction.opcode,
        line: instruction.line,
      }),
      None                        => Err(Fault::MissingOperand {
        opcode: instruction.opcode,
        line: instruction.line,
      }),
    }
  }

  fn operand_count(&self, index: usize) -> usize {
    self.resolved[index].operands.len()
  }

  /// Jump/call targets are validated at the moment of the jump on every
  /// path. The validator catches what it can statically; this is the dynamic
  /// side of the same check.
  fn check_jump_target(&self, target: i64, line: usize) -> Result<usize, Fault> {
    if target < 0 || target >= self.resolved.len() as i64 {
      return Err(Fault::JumpOutOfBounds {
        target,
        length: self.resolved.len(),
        line,
      });
    }
    Ok(target as usize)
  }

  fn set_register(&mut self, register: usize, value: i64) {
    self.cpu.registers[register] = value;
    self.push_event(EventKind::RegisterChanged { register, value });
  }

  fn set_flags(&mut self, result: i64) {
    self.cpu.flags = Flags::from_result(result);
  }

  fn write_memory(&mut self, address: i64, value: i64) -> Result<(), Fault> {
    self.memory.write(address, value)?;
    self.push_event(EventKind::MemoryWritten {
      address : address as usize,
      value   : (value & 0xFF) as u8,
    });
    Ok(())
  }

  /// Records a fault: halted, error set, events raised. Faults never escape
  /// as panics.
  fn fault(&mut self, fault: Fault) {
    self.push_event(EventKind::ErrorRaised { message: fault.to_string() });
    self.push_event(EventKind::Halted { cycles: self.cpu.cycles });
    self.error = Some(fault);
    self.cpu.halted = true;
  }

  fn push_event(&mut self, kind: EventKind) {
    if self.fast_mode || self.listeners.is_empty() {
      return;
    }
    self.pending_events.push(kind);
  }

  /// Hands buffered events to listeners, in order, after the instruction
  /// that produced them has fully committed.
  fn dispatch_events(&mut self) {
    if self.pending_events.is_empty() {
      return;
    }
    let drained: Vec<EventKind> = self.pending_events.drain(..).collect();
    for kind in drained {
      let event = ExecutionEvent { kind, at: SystemTime::now() };
      for (_id, listener) in self.listeners.iter_mut() {
        listener(&event);
      }
    }
  }

  // endregion

  // region Display methods

  fn make_register_table<T>(
    name      : char,
    values    : &[T],
    highlight : Option<usize>,
    start     : usize,
  ) -> Table
    where T: Display
  {
    let mut table = Table::new();

    table.set_format(*TABLE_DISPLAY_FORMAT);
    table.set_titles(row![ubr->"Address", ubl->"Contents"]);

    for (i, value) in values.iter().enumerate() {
      match Some(i) == highlight {
        true  => {
          table.add_row(row![r->format!("* --> {}[{}] =", name, i + start), format!("{}", value)]);
        }
        false => {
          table.add_row(row![r->format!("{}[{}] =", name, i + start), format!("{}", value)]);
        }
      }
    }
    table
  }

  // endregion

}

impl Display for Vm {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    let program_lines: Vec<String> =
      self.program.iter().map(|instruction| format!("{}", instruction)).collect();
    let highlight = match self.cpu.halted {
      true  => None,
      false => Some(self.cpu.program_counter),
    };

    let program_table = Vm::make_register_table('P', &program_lines, highlight, 0);
    let register_table = Vm::make_register_table('R', &self.cpu.registers, None, 0);

    let mut combined_table = table!([program_table, register_table]);
    combined_table.set_titles(row![ub->"Program", ub->"Registers"]);
    combined_table.set_format(*TABLE_DISPLAY_FORMAT);

    let status = match (&self.error, self.cpu.halted) {
      (Some(fault), _) => format!("Faulted: {}", fault),
      (None, true)     => "Halted.".to_string(),
      (None, false)    => "Ready.".to_string(),
    };

    write!(
      f,
      "PC: {}  SP: {}  {}  Cycles: {}  Memory used: {} bytes\n{}\n{}",
      self.cpu.program_counter,
      self.cpu.stack_pointer,
      self.cpu.flags,
      self.cpu.cycles,
      self.memory.used_bytes(),
      status,
      combined_table
    )
  }
}

fn resolve_instruction(instruction: &Instruction) -> ResolvedInstruction {
  let operands =
    instruction.operands
        .iter()
        .map(|operand| match operand {
          Operand::Int(value)    => Resolved::Immediate(*value),
          Operand::Register(r)   => Resolved::Register(*r as usize),
          Operand::Str(text)     => Resolved::Text(text.clone()),
        })
        .collect();
  ResolvedInstruction {
    opcode   : instruction.opcode,
    operands,
    line     : instruction.source_line,
  }
}

lazy_static! {
  static ref TABLE_DISPLAY_FORMAT: TableFormat::TableFormat =
    TableFormat::FormatBuilder::new()
      .column_separator('│')
      .borders(' ')
      .separator(
        TableFormat::LinePosition::Title,
        TableFormat::LineSeparator::new('─', '┼', ' ', ' ')
      )
      .separator(
        TableFormat::LinePosition::Bottom,
        TableFormat::LineSeparator::new('─', '┴', ' ', ' ')
      )
      .padding(1, 1)
      .build();
}


#[cfg(test)]
mod tests {
  use std::cell::RefCell;
  use std::rc::Rc;

  use super::*;
  use crate::compiler::compile_source;

  fn machine_for(source: &str) -> Vm {
    let program = compile_source(source);
    assert!(program.valid, "parse errors: {:?}", program.errors);
    let mut machine = Vm::new();
    machine.load_program(&program.instructions);
    machine
  }

  // region Scenario tests

  #[test]
  fn load_print_halt() {
    let mut machine = machine_for("📥 42\n🖨️\n🛑");
    let state = machine.run();
    assert_eq!(state.output, vec!["42".to_string()]);
    assert!(state.cpu.halted);
    assert_eq!(state.error, None);
  }

  #[test]
  fn load_add_print() {
    let mut machine = machine_for("📥 10\n➕ 5\n🖨️\n🛑");
    let state = machine.run();
    assert_eq!(state.output, vec!["15".to_string()]);
  }

  #[test]
  fn division_by_zero_faults_softly() {
    let mut machine = machine_for("📥 42\n➗ 0\n🛑");
    let state = machine.run();
    assert!(state.cpu.halted);
    let message = state.error.unwrap();
    assert!(message.contains("division by zero"), "{}", message);
  }

  #[test]
  fn pop_on_empty_stack_underflows() {
    let mut machine = machine_for("🎈\n🛑");
    let state = machine.run();
    let message = state.error.unwrap();
    assert!(message.contains("stack underflow"), "{}", message);
  }

  #[test]
  fn loop_accumulates_three_times() {
    let mut machine = machine_for("📥 0\n🔁 3\n➕ 1\n🔙\n🛑");
    let state = machine.run();
    assert_eq!(state.cpu.registers[0], 3);
    assert_eq!(state.error, None);
  }

  // endregion

  // region Properties

  #[test]
  fn self_jump_burns_fuel_and_faults() {
    let mut machine = machine_for("🦘 0");
    machine.set_cycle_limit(500);
    let state = machine.run();
    assert!(state.cpu.halted);
    assert_eq!(state.cpu.cycles, 500);
    let message = state.error.unwrap();
    assert!(message.contains("execution limit"), "{}", message);
  }

  #[test]
  fn value_stack_is_lifo() {
    let source = "📥 1\n📌\n📥 2\n📌\n📥 3\n📌\n🎈\n🖨️\n🎈\n🖨️\n🎈\n🖨️\n🛑";
    let mut machine = machine_for(source);
    let state = machine.run();
    assert_eq!(state.output, vec!["3", "2", "1"]);
    assert_eq!(state.error, None);
  }

  #[test]
  fn identical_runs_are_deterministic() {
    let source = "🧑‍💻\n➕ 3\n🖨️\n📤 9\n🛑";
    let mut first = machine_for(source);
    first.provide_input("39");
    let state_a = first.run();

    let mut second = machine_for(source);
    second.provide_input("39");
    let state_b = second.run();

    assert_eq!(state_a.cpu, state_b.cpu);
    assert_eq!(state_a.memory, state_b.memory);
    assert_eq!(state_a.output, state_b.output);
    assert_eq!(state_a.error, state_b.error);
  }

  #[test]
  fn fast_and_precise_paths_agree() {
    // Arithmetic, a repeat block, a subroutine, the value stack, and output
    // together — the combination where two interpreters would drift apart.
    let source = "📥 5\n📌\n📥 0\n🔁 4\n➕ 3\n🔙\n📞 10\n🎈\n🖨️\n🛑\n✖️ 2\n🖨️\n🔙";

    let mut precise = machine_for(source);
    precise.set_fast_mode(false);
    let precise_state = precise.run();

    let mut fast = machine_for(source);
    fast.set_fast_mode(true);
    let fast_state = fast.run();

    assert_eq!(precise_state.cpu.registers, fast_state.cpu.registers);
    assert_eq!(precise_state.output, fast_state.output);
    assert_eq!(precise_state.memory, fast_state.memory);
    assert_eq!(precise_state.error, fast_state.error);
    assert_eq!(precise_state.output, vec!["24", "5"]);
  }

  #[test]
  fn jump_bounds_checked_in_both_modes() {
    for fast in &[false, true] {
      let mut machine = machine_for("🦘 9\n🛑");
      machine.set_fast_mode(*fast);
      let state = machine.run();
      let message = state.error.unwrap();
      assert!(
        message.contains("outside the program"),
        "fast={}: {}", fast, message
      );
    }
  }

  // endregion

  // region Control flow

  #[test]
  fn call_and_return_use_the_control_stack() {
    // 0: call 3 / 1: print / 2: halt / 3: load 7 / 4: return
    let mut machine = machine_for("📞 3\n🖨️\n🛑\n📥 7\n🔙");
    let state = machine.run();
    assert_eq!(state.output, vec!["7"]);
    assert_eq!(state.error, None);
  }

  #[test]
  fn return_with_no_frame_advances() {
    let mut machine = machine_for("🔙\n📥 1\n🛑");
    let state = machine.run();
    assert_eq!(state.cpu.registers[0], 1);
    assert_eq!(state.error, None);
  }

  #[test]
  fn loop_zero_still_runs_the_body_once() {
    let mut machine = machine_for("📥 0\n🔁 0\n➕ 1\n🔙\n🛑");
    let state = machine.run();
    assert_eq!(state.cpu.registers[0], 1);
  }

  #[test]
  fn reentering_a_loop_does_not_stack_a_second_frame() {
    // The block's first pass jumps back through the LOOP line; the anchored
    // frame must absorb it instead of a second frame doubling the passes.
    // 0: load 0 / 1: loop 3 / 2: add 1 / 3: cmp 1 / 4: jz 1 / 5: return / 6: halt
    let mut machine = machine_for("📥 0\n🔁 3\n➕ 1\n⚖️ 1\n🎯 1\n🔙\n🛑");
    let state = machine.run();
    assert_eq!(state.error, None);
    assert_eq!(state.cpu.registers[0], 4);
  }

  #[test]
  fn jump_if_zero_only_takes_when_flag_set() {
    // CMP 5 with R0 == 5 sets the zero flag; the jump skips the poison DIV.
    let mut machine = machine_for("📥 5\n⚖️ 5\n🎯 4\n➗ 0\n🛑");
    let state = machine.run();
    assert_eq!(state.error, None);

    let mut machine = machine_for("📥 6\n⚖️ 5\n🎯 4\n📥 1\n🛑");
    let state = machine.run();
    assert_eq!(state.cpu.registers[0], 1);
  }

  // endregion

  // region Registers, memory, flags

  #[test]
  fn store_and_copy_addressing_forms() {
    // COPY R4 = R0, then STORE both implicit and explicit forms.
    let mut machine = machine_for("📥 3\n📋 R4\n📥 250\n📤 10\n📤 R4 11\n🛑");
    let state = machine.run();
    assert_eq!(state.memory.bytes[10], 250);
    assert_eq!(state.memory.bytes[11], 3);
    assert_eq!(state.memory.last_written, Some(11));
  }

  #[test]
  fn store_masks_to_a_byte() {
    let mut machine = machine_for("📥 300\n📤 0\n🛑");
    let state = machine.run();
    assert_eq!(state.memory.bytes[0], 44);
  }

  #[test]
  fn store_out_of_bounds_faults() {
    let mut machine = machine_for("📥 1\n📤 999\n🛑");
    let state = machine.run();
    let message = state.error.unwrap();
    assert!(message.contains("out of bounds"), "{}", message);
  }

  #[test]
  fn operands_read_registers_at_execution_time() {
    // R1 is written after the program is loaded but before the ADD runs.
    let mut machine = machine_for("📥 10\n📋 R1\n📥 7\n➕ R1\n🛑");
    let state = machine.run();
    assert_eq!(state.cpu.registers[0], 17);
  }

  #[test]
  fn overflow_flag_uses_the_teaching_range() {
    let mut machine = machine_for("📥 2147483647\n➕ 1\n🛑");
    let state = machine.run();
    assert!(state.cpu.flags.overflow);
    assert!(!state.cpu.flags.zero);
    assert!(!state.cpu.flags.negative);
    // The register itself is 64-bit and does not wrap at the flag boundary.
    assert_eq!(state.cpu.registers[0], 2_147_483_648);
  }

  #[test]
  fn cmp_sets_flags_without_touching_the_accumulator() {
    let mut machine = machine_for("📥 5\n⚖️ 9\n🛑");
    let state = machine.run();
    assert_eq!(state.cpu.registers[0], 5);
    assert!(state.cpu.flags.negative);
    assert!(!state.cpu.flags.zero);
  }

  #[test]
  fn input_queue_never_blocks() {
    let mut machine = machine_for("🧑‍💻\n🖨️\n🧑‍💻\n🖨️\n🧑‍💻\n🖨️\n🛑");
    machine.provide_input("42");
    machine.provide_input("not a number");
    let state = machine.run();
    assert_eq!(state.output, vec!["42", "0", "0"]);
  }

  #[test]
  fn string_operand_is_a_runtime_fault() {
    let mut machine = machine_for("📥 \"answer\"\n🛑");
    let state = machine.run();
    let message = state.error.unwrap();
    assert!(message.contains("invalid operand"), "{}", message);
  }

  // endregion

  // region Lifecycle and observability

  #[test]
  fn reset_returns_to_idle_with_the_program_loaded() {
    let mut machine = machine_for("📥 9\n📤 0\n🖨️\n🛑");
    let first = machine.run();
    assert_eq!(first.output, vec!["9"]);

    machine.reset();
    let idle = machine.state();
    assert_eq!(idle.cpu.registers, [0; REGISTER_COUNT]);
    assert_eq!(idle.cpu.program_counter, 0);
    assert_eq!(idle.output.len(), 0);
    assert_eq!(idle.memory.bytes[0], 0);
    assert!(!idle.cpu.halted);

    let second = machine.run();
    assert_eq!(second.output, vec!["9"]);
  }

  #[test]
  fn snapshots_are_defensive_copies() {
    let mut machine = machine_for("📥 9\n📤 0\n🛑");
    machine.run();
    let mut state = machine.state();
    state.memory.bytes[0] = 77;
    state.output.push("fake".to_string());
    let fresh = machine.state();
    assert_eq!(fresh.memory.bytes[0], 9);
    assert_eq!(fresh.output.len(), 0);
  }

  #[test]
  fn precise_mode_emits_events_and_fast_mode_stays_silent() {
    let seen: Rc<RefCell<Vec<ExecutionEvent>>> = Rc::new(RefCell::new(Vec::new()));

    let mut machine = machine_for("📥 42\n🖨️\n🛑");
    let log = Rc::clone(&seen);
    machine.on_event(Box::new(move |event| {
      log.borrow_mut().push(event.clone());
    }));
    machine.run();

    let events = seen.borrow();
    assert!(events.iter().any(|e| match e.kind {
      EventKind::RegisterChanged { register: 0, value: 42 } => true,
      _ => false,
    }));
    assert!(events.iter().any(|e| match &e.kind {
      EventKind::OutputProduced { text } => text == "42",
      _ => false,
    }));
    assert!(events.iter().any(|e| match e.kind {
      EventKind::Halted { .. } => true,
      _ => false,
    }));
    drop(events);

    seen.borrow_mut().clear();
    let mut silent = machine_for("📥 42\n🖨️\n🛑");
    let log = Rc::clone(&seen);
    silent.on_event(Box::new(move |event| {
      log.borrow_mut().push(event.clone());
    }));
    silent.set_fast_mode(true);
    silent.run();
    assert_eq!(seen.borrow().len(), 0);
  }

  #[test]
  fn listeners_unsubscribe_by_id() {
    let seen: Rc<RefCell<usize>> = Rc::new(RefCell::new(0));

    let mut machine = machine_for("📥 1\n🛑");
    let counter = Rc::clone(&seen);
    let id = machine.on_event(Box::new(move |_event| {
      *counter.borrow_mut() += 1;
    }));
    assert!(machine.remove_listener(id));
    assert!(!machine.remove_listener(id));
    machine.run();
    assert_eq!(*seen.borrow(), 0);
  }

  #[test]
  fn faults_are_reported_as_events() {
    let messages: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));

    let mut machine = machine_for("📥 1\n➗ 0\n🛑");
    let log = Rc::clone(&messages);
    machine.on_event(Box::new(move |event| {
      if let EventKind::ErrorRaised { message } = &event.kind {
        log.borrow_mut().push(message.clone());
      }
    }));
    machine.run();
    assert_eq!(messages.borrow().len(), 1);
    assert!(messages.borrow()[0].contains("division by zero"));
  }

  #[test]
  fn empty_program_halts_normally() {
    let mut machine = Vm::new();
    machine.load_program(&[]);
    let state = machine.run();
    assert!(state.cpu.halted);
    assert_eq!(state.error, None);
    assert_eq!(state.cpu.cycles, 0);
  }

  #[test]
  fn stepping_reports_continuation() {
    let mut machine = machine_for("📥 1\n🛑");
    assert!(machine.step());
    assert!(!machine.step());
    assert!(!machine.step());
    assert!(machine.state().cpu.halted);
  }

  // endregion
}
