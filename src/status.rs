//! Page Header Codec: the 16-bit status marker at the first half-word of
//! every page, and the monotonic bit-clearing sequence between its states.

use crate::flash::Flash;

const ERASED: u16 = 0xFFFF;
const RECEIVE_DATA: u16 = 0xEEEE;
const VALID_PAGE: u16 = 0x0000;

/// The status of a single page, decoded from its header half-word.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Status {
    /// Fully erased, available for use as a transfer destination.
    Erased,
    /// Destination of an in-progress transfer.
    ReceiveData,
    /// The current authoritative store.
    Valid,
    /// Any bit pattern other than the three above; treated as corruption.
    Unknown(u16),
}

impl Status {
    fn from_raw(raw: u16) -> Status {
        match raw {
            ERASED => Status::Erased,
            RECEIVE_DATA => Status::ReceiveData,
            VALID_PAGE => Status::Valid,
            other => Status::Unknown(other),
        }
    }

    /// The on-flash encoding for `Erased`, `ReceiveData`, and `Valid`.
    ///
    /// # Panics
    /// Panics if called on `Unknown`, which has no canonical encoding to
    /// program back onto a page.
    fn to_raw(self) -> u16 {
        match self {
            Status::Erased => ERASED,
            Status::ReceiveData => RECEIVE_DATA,
            Status::Valid => VALID_PAGE,
            Status::Unknown(_) => panic!("Unknown status has no on-flash encoding"),
        }
    }
}

/// Read the status of the page whose first half-word is at `page_address`.
pub fn read_status<F: Flash>(flash: &F, page_address: u32) -> Status {
    Status::from_raw(flash.read_halfword(page_address))
}

/// Program the page header at `page_address` to `status`.
///
/// Because flash programming can only clear bits, only the transitions
/// `Erased -> ReceiveData`, `Erased -> Valid`, and `ReceiveData -> Valid`
/// are achievable without an intervening erase. This function does not
/// verify the precondition; callers (the Rotation Engine) are responsible
/// for only issuing legal transitions.
pub fn mark<F: Flash>(
    flash: &mut F,
    page_address: u32,
    status: Status,
) -> Result<(), F::Error> {
    flash.program_halfword(page_address, status.to_raw())
}
