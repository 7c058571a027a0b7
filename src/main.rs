use emoasm::{compile, disassemble, Vm};

fn main() {

  #[cfg(feature = "trace_computation")]
  println!("Computation Tracing ENABLED");

  let source = "\
# Count down from 5, printing each value.
📥 5        # R0 = 5
🔁 5        # repeat 5 times
🖨️          # print R0
➖ 1        # R0 = R0 - 1
🔙          # end of block
📤 0        # mem[0] = R0
🛑          # stop
";

  println!("# Source\n{}", source);

  let artifact = compile(source);
  for error in &artifact.program.errors {
    println!("{}", error);
  }
  for warning in &artifact.validation.warnings {
    println!("Warning: {}", warning);
  }
  for error in &artifact.validation.errors {
    println!("Error: {}", error);
  }
  println!(
    "Compiled {} instructions, estimated {} cycles.\n",
    artifact.validation.stats.instruction_count,
    artifact.validation.stats.estimated_cycles
  );

  println!("# Disassembly\n{}", disassemble(&artifact.program.instructions));

  let mut machine = Vm::new();
  machine.load_program(&artifact.program.instructions);
  let state = machine.run();

  println!("# Output");
  for line in &state.output {
    println!("> {}", line);
  }
  if let Some(error) = &state.error {
    println!("Error: {}", error);
  }
  println!("\n{}", machine);
}
