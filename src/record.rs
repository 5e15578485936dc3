//! Record Log: append-only `(addr, value)` records packed into a page's
//! body, and backward scanning to resolve the latest value of a key.

use crate::flash::Flash;

/// Header half-word occupies the first 2 bytes of a page.
const HEADER_SIZE: u32 = 2;
/// Each record is `[value:2][addr:2]`.
const RECORD_SIZE: u32 = 4;
/// Virtual addresses equal to this sentinel mark an unwritten slot.
const UNWRITTEN_ADDR: u16 = 0xFFFF;

/// Result of attempting to append a record to a page.
pub enum AppendOutcome {
    /// The record was written.
    Ok,
    /// No unwritten slot remained; the caller must transfer to a fresh page.
    Full,
}

/// Number of 4-byte record slots a page of `page_size` bytes holds. The
/// trailing `(page_size - 2) % 4` bytes, if any, are never addressed.
pub fn slot_count(page_size: u32) -> u32 {
    (page_size - HEADER_SIZE) / RECORD_SIZE
}

fn slot_address(page_base: u32, slot: u32) -> u32 {
    page_base + HEADER_SIZE + slot * RECORD_SIZE
}

/// `true` iff the 4-byte slot at `slot` is entirely `0xFF` (unwritten).
pub fn is_unwritten_record<F: Flash>(flash: &F, page_base: u32, slot: u32) -> bool {
    let addr = slot_address(page_base, slot);
    flash.read_halfword(addr) == UNWRITTEN_ADDR && flash.read_halfword(addr + 2) == UNWRITTEN_ADDR
}

/// Append `(addr, value)` to the first unwritten slot on the page at
/// `page_base`, scanning forward from the first slot after the header.
///
/// The value half-word is programmed before the address half-word: if
/// power fails between the two programs, the slot's address remains
/// `0xFFFF` and the record stays invisible to `find_latest`, so a partial
/// write never resolves to a spliced (wrong value, right address) or
/// (right value, wrong address) record.
pub fn append<F: Flash>(
    flash: &mut F,
    page_base: u32,
    page_size: u32,
    addr: u16,
    value: u16,
) -> Result<AppendOutcome, F::Error> {
    debug_assert_ne!(addr, UNWRITTEN_ADDR, "0xFFFF is reserved as the unwritten sentinel");
    for slot in 0..slot_count(page_size) {
        if is_unwritten_record(flash, page_base, slot) {
            let slot_addr = slot_address(page_base, slot);
            flash.program_halfword(slot_addr, value)?;
            flash.program_halfword(slot_addr + 2, addr)?;
            return Ok(AppendOutcome::Ok);
        }
    }
    Ok(AppendOutcome::Full)
}

/// Scan the page at `page_base` from its last slot toward the header,
/// returning the value of the first record whose address half-word equals
/// `addr` (i.e. the most recently appended record for that key).
pub fn find_latest<F: Flash>(
    flash: &F,
    page_base: u32,
    page_size: u32,
    addr: u16,
) -> Option<u16> {
    for slot in (0..slot_count(page_size)).rev() {
        let slot_addr = slot_address(page_base, slot);
        if flash.read_halfword(slot_addr + 2) == addr {
            return Some(flash.read_halfword(slot_addr));
        }
    }
    None
}
