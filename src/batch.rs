use rayon::prelude::*;

use crate::error::Result;
use crate::exec::execute;
use crate::machine::{Machine, MachineConfig};
use crate::program::Program;

/// Run every program on its own machine, in parallel.
///
/// Each machine reads from an empty input stream and writes into its own
/// buffer, so runs share nothing. Results come back in the order of
/// `programs`.
pub fn run_batch(programs: &[Program], config: &MachineConfig) -> Vec<Result<Vec<u8>>> {
    programs
        .par_iter()
        .map(|program| {
            let program = if config.optimize {
                program.optimize()
            } else {
                program.clone()
            };
            let mut machine = Machine::new(config.clone(), std::io::empty(), Vec::new());
            execute(&program, &mut machine)?;
            Ok(machine.into_output())
        })
        .collect()
}
