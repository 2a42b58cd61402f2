use std::io::{BufRead, Write};

use log::{debug, warn};

use crate::error::{Result, TapeError};
use crate::machine::Machine;
use crate::program::{Op, Program};

/// Summary of one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecStats {
    /// Number of ops executed.
    pub steps: usize,
    /// True if the program ran off its end; false if the step limit hit first.
    pub halted: bool,
}

/// Drive `machine` through `program` until the last op or the step limit.
///
/// The program counter walks the op list; loops are the machine's branch
/// primitives returning the jump target. Output is flushed before returning,
/// including on error.
pub fn execute<R: BufRead, W: Write>(
    program: &Program,
    machine: &mut Machine<R, W>,
) -> Result<ExecStats> {
    let result = run_ops(program.ops(), machine);
    machine.flush()?;
    result
}

fn run_ops<R: BufRead, W: Write>(ops: &[Op], machine: &mut Machine<R, W>) -> Result<ExecStats> {
    let limit = machine.config().step_limit.unwrap_or(usize::MAX);
    let mut pc: usize = 0;
    let mut steps: usize = 0;

    while pc < ops.len() {
        if steps >= limit {
            warn!("step limit {limit} reached at op {pc}");
            return Ok(ExecStats {
                steps,
                halted: false,
            });
        }
        steps += 1;

        match ops[pc] {
            Op::Update(n) => machine.update(n),
            Op::Shift(n) => machine.shift(n)?,
            Op::Input => machine.read_input()?,
            Op::Output(n) => machine.write_output(n)?,
            Op::JumpIfZero(target) => {
                if let Some(t) = machine.branch_if_zero(target) {
                    pc = t;
                    continue;
                }
            }
            Op::JumpIfNonZero(target) => {
                if let Some(t) = machine.branch_if_nonzero(target) {
                    pc = t;
                    continue;
                }
            }
            Op::Set(v) => machine.write_current(v),
            Op::Multiply(k) => machine.multiply_current(k),
            Op::AddTo(offset) => {
                let cursor = machine.cursor();
                let target = cursor
                    .checked_add_signed(offset)
                    .ok_or(TapeError::Underflow {
                        cursor,
                        delta: offset,
                    })?;
                machine.reserve_to(target);
                machine.add_to(target)?;
            }
        }
        pc += 1;
    }

    debug!(
        "halted after {steps} steps, tape length {}",
        machine.tape().len()
    );
    Ok(ExecStats {
        steps,
        halted: true,
    })
}
