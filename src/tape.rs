use log::warn;

use crate::error::{Result, TapeError};

/// Number of zero cells a fresh tape starts with.
pub const DEFAULT_CAPACITY: usize = 1024;

/// The tape abstract machine: a growable run of byte cells and a cursor.
///
/// Invariants held after every operation:
/// - `cursor < cells.len()`; moving past the end grows the tape first.
/// - `cells` never shrinks.
/// - Cell arithmetic wraps modulo 256.
///
/// A `Tape` is a plain owned value. Nothing else aliases its cells, so any
/// number of tapes can live side by side (one per machine).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tape {
    cells: Vec<u8>,
    cursor: usize,
}

impl Default for Tape {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl Tape {
    /// Create a tape of `capacity` zero cells with the cursor at 0.
    ///
    /// A capacity of 0 is treated as 1, since the cursor must always
    /// address a cell.
    pub fn new(capacity: usize) -> Self {
        Self {
            cells: vec![0u8; capacity.max(1)],
            cursor: 0,
        }
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    /// Always false; kept for symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn cells(&self) -> &[u8] {
        &self.cells
    }

    /// Value at `index`, or `None` past the end of the tape.
    pub fn cell(&self, index: usize) -> Option<u8> {
        self.cells.get(index).copied()
    }

    #[inline(always)]
    pub fn read_current(&self) -> u8 {
        self.cells[self.cursor]
    }

    #[inline(always)]
    pub fn write_current(&mut self, value: u8) {
        self.cells[self.cursor] = value;
    }

    /// Grow the tape with zero cells until `index` is in bounds.
    ///
    /// Existing cells are untouched. Growth is logged as a warning carrying
    /// the requested index and the cursor at the time of the request.
    pub fn reserve_to(&mut self, index: usize) {
        if index < self.cells.len() {
            return;
        }
        warn!(
            "tape grows to reach cell {index} (cursor {}, length {})",
            self.cursor,
            self.cells.len()
        );
        self.cells.resize(index + 1, 0);
    }

    /// Move the cursor by `delta` cells.
    ///
    /// Moving left of cell 0 is an underflow and leaves the tape untouched.
    /// Moving past the end grows the tape.
    pub fn shift(&mut self, delta: isize) -> Result<()> {
        let target = self
            .cursor
            .checked_add_signed(delta)
            .ok_or(TapeError::Underflow {
                cursor: self.cursor,
                delta,
            })?;
        self.reserve_to(target);
        self.cursor = target;
        Ok(())
    }

    /// Add `delta` to the current cell, wrapping modulo 256.
    #[inline(always)]
    pub fn update(&mut self, delta: isize) {
        let cell = &mut self.cells[self.cursor];
        *cell = cell.wrapping_add(delta as u8);
    }

    /// Returns `label` when the current cell is zero (the transfer is taken).
    #[inline(always)]
    pub fn branch_if_zero<L>(&self, label: L) -> Option<L> {
        (self.read_current() == 0).then_some(label)
    }

    /// Returns `label` when the current cell is nonzero (the transfer is taken).
    #[inline(always)]
    pub fn branch_if_nonzero<L>(&self, label: L) -> Option<L> {
        (self.read_current() != 0).then_some(label)
    }

    /// Add the current cell into the cell at `target`, leaving the cursor put.
    ///
    /// `target` must already be on the tape; this never grows it.
    pub fn add_to(&mut self, target: usize) -> Result<()> {
        let value = self.read_current();
        let len = self.cells.len();
        let cell = self
            .cells
            .get_mut(target)
            .ok_or(TapeError::OutOfBounds { index: target, len })?;
        *cell = cell.wrapping_add(value);
        Ok(())
    }

    /// Set the current cell to `(value * factor) mod 256`.
    #[inline(always)]
    pub fn multiply_current(&mut self, factor: usize) {
        let cell = &mut self.cells[self.cursor];
        *cell = cell.wrapping_mul(factor as u8);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test logger recording each thread's own records.
    mod capture {
        use std::cell::RefCell;
        use std::sync::Once;

        use log::{Level, LevelFilter, Log, Metadata, Record};

        thread_local! {
            static RECORDS: RefCell<Vec<(Level, String)>> = const { RefCell::new(Vec::new()) };
        }

        struct Capture;

        impl Log for Capture {
            fn enabled(&self, _: &Metadata) -> bool {
                true
            }

            fn log(&self, record: &Record) {
                RECORDS.with(|r| {
                    r.borrow_mut()
                        .push((record.level(), record.args().to_string()))
                });
            }

            fn flush(&self) {}
        }

        static LOGGER: Capture = Capture;
        static INIT: Once = Once::new();

        /// Install the logger (once) and drain this thread's records.
        pub fn take() -> Vec<(Level, String)> {
            INIT.call_once(|| {
                let _ = log::set_logger(&LOGGER);
                log::set_max_level(LevelFilter::Trace);
            });
            RECORDS.with(|r| r.borrow_mut().drain(..).collect())
        }
    }

    fn warnings() -> Vec<String> {
        capture::take()
            .into_iter()
            .filter(|(level, _)| *level == log::Level::Warn)
            .map(|(_, msg)| msg)
            .collect()
    }

    #[test]
    fn test_growth_warns_once_with_index_and_cursor() {
        warnings();
        let mut tape = Tape::new(4);
        tape.shift(2).unwrap();
        assert!(warnings().is_empty());

        tape.shift(5).unwrap();
        let warned = warnings();
        assert_eq!(warned.len(), 1);
        assert!(warned[0].contains("cell 7"), "{}", warned[0]);
        assert!(warned[0].contains("cursor 2"), "{}", warned[0]);

        // Back inside the grown tape: no more warnings.
        tape.shift(-7).unwrap();
        tape.shift(7).unwrap();
        tape.reserve_to(3);
        assert!(warnings().is_empty());
    }

    #[test]
    fn test_underflow_does_not_warn() {
        warnings();
        let mut tape = Tape::new(4);
        assert!(tape.shift(-1).is_err());
        assert!(warnings().is_empty());
    }

    #[test]
    fn test_new_tape_is_zeroed() {
        let tape = Tape::default();
        assert_eq!(tape.len(), DEFAULT_CAPACITY);
        assert_eq!(tape.cursor(), 0);
        assert!(tape.cells().iter().all(|&c| c == 0));
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut tape = Tape::new(0);
        assert_eq!(tape.len(), 1);
        tape.update(7);
        assert_eq!(tape.read_current(), 7);
    }

    #[test]
    fn test_write_then_read() {
        let mut tape = Tape::new(4);
        tape.write_current(200);
        assert_eq!(tape.read_current(), 200);
        assert_eq!(tape.cell(0), Some(200));
        assert_eq!(tape.cell(4), None);
    }

    #[test]
    fn test_update_wraps() {
        let mut tape = Tape::new(4);
        tape.update(255);
        tape.update(1);
        assert_eq!(tape.read_current(), 0);
        tape.update(-1);
        assert_eq!(tape.read_current(), 255);
        // 513 = 2 * 256 + 1
        tape.update(513);
        assert_eq!(tape.read_current(), 0);
    }

    #[test]
    fn test_shift_within_bounds() {
        let mut tape = Tape::new(8);
        tape.shift(5).unwrap();
        assert_eq!(tape.cursor(), 5);
        tape.shift(-3).unwrap();
        assert_eq!(tape.cursor(), 2);
        assert_eq!(tape.len(), 8);
    }

    #[test]
    fn test_shift_grows_tape() {
        let mut tape = Tape::new(2);
        tape.update(9);
        tape.shift(5).unwrap();
        assert_eq!(tape.cursor(), 5);
        assert_eq!(tape.len(), 6);
        assert_eq!(tape.cells(), &[9, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_shift_underflow_leaves_tape_untouched() {
        let mut tape = Tape::new(4);
        tape.shift(2).unwrap();
        tape.update(3);
        let before = tape.clone();
        let err = tape.shift(-3).unwrap_err();
        assert!(matches!(err, TapeError::Underflow { cursor: 2, delta: -3 }));
        assert!(err.to_string().starts_with("Tape Underflow"));
        assert_eq!(tape, before);
    }

    #[test]
    fn test_shift_zero_is_noop() {
        let mut tape = Tape::new(4);
        tape.shift(0).unwrap();
        assert_eq!(tape.cursor(), 0);
    }

    #[test]
    fn test_reserve_to_only_grows() {
        let mut tape = Tape::new(4);
        tape.reserve_to(2);
        assert_eq!(tape.len(), 4);
        tape.reserve_to(9);
        assert_eq!(tape.len(), 10);
        assert_eq!(tape.cursor(), 0);
    }

    #[test]
    fn test_branches() {
        let mut tape = Tape::new(4);
        assert_eq!(tape.branch_if_zero(7usize), Some(7));
        assert_eq!(tape.branch_if_nonzero(7usize), None);
        tape.update(1);
        assert_eq!(tape.branch_if_zero("loop_end"), None);
        assert_eq!(tape.branch_if_nonzero("loop_start"), Some("loop_start"));
    }

    #[test]
    fn test_add_to() {
        let mut tape = Tape::new(4);
        tape.update(200);
        tape.shift(2).unwrap();
        tape.update(100);
        tape.add_to(0).unwrap();
        assert_eq!(tape.cell(0), Some(44)); // 300 mod 256
        assert_eq!(tape.read_current(), 100);
        assert_eq!(tape.cursor(), 2);
    }

    #[test]
    fn test_add_to_out_of_bounds() {
        let mut tape = Tape::new(4);
        tape.update(1);
        let err = tape.add_to(4).unwrap_err();
        assert!(matches!(err, TapeError::OutOfBounds { index: 4, len: 4 }));
        assert_eq!(tape.len(), 4);
    }

    #[test]
    fn test_multiply_current() {
        let mut tape = Tape::new(1);
        tape.update(10);
        tape.multiply_current(30);
        assert_eq!(tape.read_current(), 44); // 300 mod 256
        tape.multiply_current(1);
        assert_eq!(tape.read_current(), 44);
        tape.multiply_current(0);
        assert_eq!(tape.read_current(), 0);
    }

    #[test]
    fn test_multiply_large_factor() {
        let mut tape = Tape::new(1);
        tape.update(3);
        tape.multiply_current(257);
        assert_eq!(tape.read_current(), 3);
    }

    #[test]
    fn test_walkthrough() {
        // Fresh tape: 'A' in cell 0, then a wrap to zero on cell 3, then
        // adding that zero back into cell 0 changes nothing.
        let mut tape = Tape::default();
        tape.update(65);
        assert_eq!(tape.read_current(), b'A');
        tape.shift(3).unwrap();
        assert_eq!(tape.cursor(), 3);
        assert!(tape.len() >= 4);
        assert_eq!(&tape.cells()[1..4], &[0, 0, 0]);
        tape.update(255);
        tape.update(1);
        assert_eq!(tape.read_current(), 0);
        tape.add_to(0).unwrap();
        assert_eq!(tape.cell(0), Some(65));
    }
}
