use std::fmt;

use log::debug;

use crate::error::ParseError;

/// One primitive call against the tape machine.
///
/// Jump operands are absolute op indices. `JumpIfZero` points one past its
/// matching `JumpIfNonZero`, and `JumpIfNonZero` points one past its matching
/// `JumpIfZero`, so a taken branch lands on the next op to execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Update(isize),
    Shift(isize),
    Input,
    Output(usize),
    JumpIfZero(usize),
    JumpIfNonZero(usize),
    Set(u8),
    Multiply(usize),
    /// Add the current cell into the cell at `cursor + offset`.
    AddTo(isize),
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Op::Update(n) => write!(f, "update {n:+}"),
            Op::Shift(n) => write!(f, "shift {n:+}"),
            Op::Input => write!(f, "input"),
            Op::Output(n) => write!(f, "output x{n}"),
            Op::JumpIfZero(t) => write!(f, "jz {t}"),
            Op::JumpIfNonZero(t) => write!(f, "jnz {t}"),
            Op::Set(v) => write!(f, "set {v}"),
            Op::Multiply(k) => write!(f, "mul {k}"),
            Op::AddTo(n) => write!(f, "addto {n:+}"),
        }
    }
}

/// A translated program: a flat op list with resolved jump targets.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Program {
    ops: Vec<Op>,
}

/// Is `c` one of the eight command characters?
fn is_command(c: char) -> bool {
    matches!(c, '+' | '-' | '>' | '<' | '.' | ',' | '[' | ']')
}

/// Measure the run of `target` at the start of `chars`.
///
/// Comment characters inside the run are skipped over. Returns the number
/// of `target` characters and the total number of characters consumed.
fn run_length(chars: &[char], target: char) -> (usize, usize) {
    let mut count = 0;
    let mut span = 0;
    for &c in chars {
        if c == target {
            count += 1;
        } else if is_command(c) {
            break;
        }
        span += 1;
    }
    (count, span)
}

impl Program {
    /// Translate source text. Characters other than the eight commands are
    /// comments. Bracket matching is checked here, once.
    pub fn parse(source: &str) -> Result<Self, ParseError> {
        let chars: Vec<char> = source.chars().collect();
        let mut ops = Vec::with_capacity(chars.len());
        // (op index, char offset) of every unclosed '['.
        let mut opens: Vec<(usize, usize)> = Vec::new();
        let mut pos = 0;

        while pos < chars.len() {
            let c = chars[pos];
            match c {
                '+' | '-' | '>' | '<' | '.' | ',' => {
                    let (count, span) = run_length(&chars[pos..], c);
                    pos += span;
                    let n = count as isize;
                    match c {
                        '+' => ops.push(Op::Update(n)),
                        '-' => ops.push(Op::Update(-n)),
                        '>' => ops.push(Op::Shift(n)),
                        '<' => ops.push(Op::Shift(-n)),
                        '.' => ops.push(Op::Output(count)),
                        _ => ops.extend(std::iter::repeat_n(Op::Input, count)),
                    }
                }
                '[' => {
                    opens.push((ops.len(), pos));
                    ops.push(Op::JumpIfZero(0));
                    pos += 1;
                }
                ']' => {
                    let (open, _) = opens
                        .pop()
                        .ok_or(ParseError::UnmatchedClose { position: pos })?;
                    ops.push(Op::JumpIfNonZero(open + 1));
                    ops[open] = Op::JumpIfZero(ops.len());
                    pos += 1;
                }
                _ => pos += 1,
            }
        }

        if let Some(&(_, position)) = opens.first() {
            return Err(ParseError::UnmatchedOpen { position });
        }

        debug!("parsed {} ops from {} characters", ops.len(), chars.len());
        Ok(Self { ops })
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Rewrite common loop idioms into fused ops.
    ///
    /// - `[-]` and `[+]` become `Set(0)`.
    /// - `[>N +M <N -]` (and its mirror) becomes `Multiply(M)`, `AddTo(N)`,
    ///   `Set(0)` kept inside the loop's own brackets: the current cell times
    ///   M is added N cells away, then the current cell is cleared. The
    ///   brackets test the cell before it is multiplied, so the target is
    ///   reached (and can underflow or grow the tape) exactly when the
    ///   original loop would have moved there. `Set(0)` means the closing
    ///   bracket never jumps back.
    ///
    /// Jump targets are re-linked afterwards.
    pub fn optimize(&self) -> Program {
        let ops = &self.ops;
        let mut out = Vec::with_capacity(ops.len());
        let mut pc = 0;

        while pc < ops.len() {
            if let Op::JumpIfZero(end) = ops[pc] {
                // end - 1 is the matching JumpIfNonZero.
                let body = &ops[pc + 1..end - 1];
                match *body {
                    [Op::Update(1)] | [Op::Update(-1)] => {
                        out.push(Op::Set(0));
                        pc = end;
                        continue;
                    }
                    [Op::Shift(n), Op::Update(m), Op::Shift(back), Op::Update(-1)]
                        if back == -n && m > 0 =>
                    {
                        out.extend([
                            Op::JumpIfZero(0),
                            Op::Multiply(m as usize),
                            Op::AddTo(n),
                            Op::Set(0),
                            Op::JumpIfNonZero(0),
                        ]);
                        pc = end;
                        continue;
                    }
                    _ => {}
                }
            }
            out.push(ops[pc]);
            pc += 1;
        }

        relink(&mut out);
        debug!("optimized {} ops into {}", ops.len(), out.len());
        Program { ops: out }
    }

    /// Human-readable listing, one op per line.
    pub fn disassemble(&self) -> String {
        let mut s = String::new();
        for (i, op) in self.ops.iter().enumerate() {
            s.push_str(&format!("{i:>6}  {op}\n"));
        }
        s
    }
}

/// Recompute jump targets of an already balanced op list.
fn relink(ops: &mut [Op]) {
    let mut opens = Vec::new();
    for i in 0..ops.len() {
        match ops[i] {
            Op::JumpIfZero(_) => opens.push(i),
            Op::JumpIfNonZero(_) => {
                if let Some(open) = opens.pop() {
                    ops[i] = Op::JumpIfNonZero(open + 1);
                    ops[open] = Op::JumpIfZero(i + 1);
                }
            }
            _ => {}
        }
    }
}
