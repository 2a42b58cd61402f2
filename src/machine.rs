use std::io::{BufRead, Write};
use std::ops::{Deref, DerefMut};

use clap::ValueEnum;
use log::debug;

use crate::error::{Result, TapeError};
use crate::tape::{DEFAULT_CAPACITY, Tape};

/// Text shown on stderr before a line is read in `InputMode::Line`.
pub const PROMPT: &str = "Input: ";

/// How `read_input` turns the input stream into a cell value.
///
/// Chosen once per run. The two modes are not interchangeable: `Raw` treats
/// end-of-stream as "leave the cell alone", `Line` treats it as an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum InputMode {
    /// One byte per read; end-of-stream leaves the cell unchanged.
    #[default]
    Raw,
    /// One line per read; a decimal integer is stored mod 256, anything else
    /// stores the code of its first character. Empty lines are fatal.
    Line,
}

/// Configuration for a single machine run.
#[derive(Debug, Clone)]
pub struct MachineConfig {
    /// Number of zero cells the tape starts with.
    pub initial_capacity: usize,
    /// How `,` reads from the input stream.
    pub input_mode: InputMode,
    /// Print `PROMPT` on stderr before each line read.
    pub prompt: bool,
    /// Stop after this many executed ops (`None` for no limit).
    pub step_limit: Option<usize>,
    /// Rewrite clear and multiply loops before running.
    pub optimize: bool,
}

impl Default for MachineConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            input_mode: InputMode::Raw,
            prompt: false,
            step_limit: None,
            optimize: true,
        }
    }
}

/// A tape wired to an input and an output stream.
///
/// All tape primitives are reachable through `Deref`, so a machine reads
/// like the tape it owns; the two I/O primitives live here because they need
/// the streams.
pub struct Machine<R, W> {
    tape: Tape,
    input: R,
    output: W,
    config: MachineConfig,
}

impl<R, W> Deref for Machine<R, W> {
    type Target = Tape;

    fn deref(&self) -> &Tape {
        &self.tape
    }
}

impl<R, W> DerefMut for Machine<R, W> {
    fn deref_mut(&mut self) -> &mut Tape {
        &mut self.tape
    }
}

impl<R: BufRead, W: Write> Machine<R, W> {
    pub fn new(config: MachineConfig, input: R, output: W) -> Self {
        Self {
            tape: Tape::new(config.initial_capacity),
            input,
            output,
            config,
        }
    }

    pub fn config(&self) -> &MachineConfig {
        &self.config
    }

    pub fn tape(&self) -> &Tape {
        &self.tape
    }

    /// Give back the output stream, e.g. to inspect captured bytes.
    pub fn into_output(self) -> W {
        self.output
    }

    /// Read one value from the input stream into the current cell.
    pub fn read_input(&mut self) -> Result<()> {
        // Anything already written must be visible before we block.
        self.output.flush()?;
        match self.config.input_mode {
            InputMode::Raw => self.read_raw(),
            InputMode::Line => self.read_line(),
        }
    }

    fn read_raw(&mut self) -> Result<()> {
        let byte = match self.input.fill_buf()?.first() {
            Some(&b) => b,
            None => {
                debug!("input exhausted; cell {} unchanged", self.tape.cursor());
                return Ok(());
            }
        };
        self.input.consume(1);
        self.tape.write_current(byte);
        Ok(())
    }

    fn read_line(&mut self) -> Result<()> {
        if self.config.prompt {
            eprint!("{PROMPT}");
        }
        let mut raw = Vec::new();
        self.input.read_until(b'\n', &mut raw)?;
        let line = raw
            .strip_suffix(b"\n")
            .map(|l| l.strip_suffix(b"\r").unwrap_or(l))
            .unwrap_or(raw.as_slice());
        let value = parse_line(line)?;
        self.tape.write_current(value);
        Ok(())
    }

    /// Write the current cell as a raw byte, `count` times.
    pub fn write_output(&mut self, count: usize) -> Result<()> {
        let byte = self.tape.read_current();
        for _ in 0..count {
            self.output.write_all(&[byte])?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.output.flush()?;
        Ok(())
    }
}

/// Convert one input line (terminator already removed) into a cell value.
fn parse_line(line: &[u8]) -> Result<u8> {
    let &first_byte = line.first().ok_or(TapeError::EmptyInput)?;
    if let Some(n) = decimal_mod_256(line) {
        return Ok(n);
    }
    // Code of the first character, or the first byte when the line does not
    // start with valid UTF-8.
    let valid = match std::str::from_utf8(line) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&line[..e.valid_up_to()]).unwrap_or_default(),
    };
    Ok(match valid.chars().next() {
        Some(c) => c as u32 as u8,
        None => first_byte,
    })
}

/// An optionally signed run of ASCII digits, reduced modulo 256.
///
/// Any length is accepted; the value is folded digit by digit.
fn decimal_mod_256(line: &[u8]) -> Option<u8> {
    let (negative, digits) = match line.split_first()? {
        (&b'-', rest) => (true, rest),
        (&b'+', rest) => (false, rest),
        _ => (false, line),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    let value = digits
        .iter()
        .fold(0u8, |acc, d| acc.wrapping_mul(10).wrapping_add(d - b'0'));
    Some(if negative { value.wrapping_neg() } else { value })
}
