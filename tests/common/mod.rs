//! A small `Flash` double shared by the integration test binaries, with the
//! ability to cut power after a fixed number of operations. A separate copy
//! from `src/testutil.rs`'s `SimFlash`: integration tests link the library
//! as an ordinary dependency, so they cannot reach a `#[cfg(test)]`-only
//! item from inside the crate without unifying the `testutil` feature for
//! the whole test session, which this repo's test targets don't require.

use flash_eeprom::flash::Flash;

/// A flash operation, as recorded by [`SimFlash`] for power-loss injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    /// `erase_page(page_address)`.
    Erase(u32),
    /// `program_halfword(address, value)`.
    Program(u32, u16),
}

/// Error `SimFlash` reports once its injected op budget is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PowerLoss;

/// An in-memory flash array that can be cut off after a fixed number of
/// flash operations to simulate power loss.
#[derive(Clone)]
pub struct SimFlash {
    base: u32,
    page_size: u32,
    bytes: Vec<u8>,
    budget: Option<usize>,
    ops: Vec<Op>,
}

impl SimFlash {
    /// Create an array of `page_count` pages of `page_size` bytes each,
    /// all-`0xFF` (erased), starting at `base`.
    pub fn new(base: u32, page_size: u32, page_count: u32) -> Self {
        SimFlash {
            base,
            page_size,
            bytes: vec![0xFFu8; (page_size * page_count) as usize],
            budget: None,
            ops: Vec::new(),
        }
    }

    /// Allow only the next `n` flash operations to succeed; the `(n+1)`th
    /// fails with [`PowerLoss`].
    pub fn cut_after(&mut self, n: usize) {
        self.budget = Some(n);
    }

    /// Lift any injected power-loss cutoff, simulating a reset.
    pub fn power_restored(&mut self) {
        self.budget = None;
    }

    /// Total number of flash operations performed so far.
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// `true` iff `self` and `other` hold byte-identical flash contents.
    pub fn contents_eq(&self, other: &SimFlash) -> bool {
        self.bytes == other.bytes
    }

    fn offset(&self, address: u32) -> usize {
        (address - self.base) as usize
    }

    fn consume_budget(&mut self) -> Result<(), PowerLoss> {
        if let Some(budget) = self.budget {
            if self.ops.len() >= budget {
                return Err(PowerLoss);
            }
        }
        Ok(())
    }
}

impl Flash for SimFlash {
    type Error = PowerLoss;

    fn erase_page(&mut self, page_address: u32) -> Result<(), Self::Error> {
        self.consume_budget()?;
        self.ops.push(Op::Erase(page_address));
        let start = self.offset(page_address);
        let end = start + self.page_size as usize;
        for byte in &mut self.bytes[start..end] {
            *byte = 0xFF;
        }
        Ok(())
    }

    fn program_halfword(&mut self, address: u32, value: u16) -> Result<(), Self::Error> {
        self.consume_budget()?;
        self.ops.push(Op::Program(address, value));
        let start = self.offset(address);
        let current = u16::from_le_bytes([self.bytes[start], self.bytes[start + 1]]);
        // Real flash only clears bits; AND in the new value so a caller bug
        // surfaces as a readback mismatch instead of silent corruption.
        let bytes = (current & value).to_le_bytes();
        self.bytes[start] = bytes[0];
        self.bytes[start + 1] = bytes[1];
        Ok(())
    }

    fn read_halfword(&self, address: u32) -> u16 {
        let start = self.offset(address);
        u16::from_le_bytes([self.bytes[start], self.bytes[start + 1]])
    }
}
