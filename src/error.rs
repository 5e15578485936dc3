//! The closed error taxonomy surfaced by the public API.

/// Errors `init`, `read`, and `write` can return.
///
/// `NotFound` is deliberately not a variant here: a key that has never been
/// written is not a failure, so `read` reports it as `Ok(None)` instead.
/// `PageFull` is likewise absent — it is an internal `Record Log` signal the
/// Rotation Engine always converts into a transfer before it could escape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error<E> {
    /// No page with `Valid` status exists. Only possible before the first
    /// `init`, or after `init` encountered an unrecoverable configuration.
    NoValidPage,
    /// `0xFFFF` was passed as a virtual address; it is reserved to mark
    /// unwritten record slots and cannot name a key.
    ReservedAddress,
    /// The underlying flash driver reported a non-OK status.
    Flash(E),
}
