//! The Flash Abstraction: the only component this crate consumes rather
//! than implements. A `Flash` implementor exposes word-aligned programming
//! and page erase over a physical or simulated NOR array; the rotation
//! engine never talks to hardware registers directly.

/// Low-level operations a NOR-style flash array must provide.
///
/// Implementors are expected to be *synchronous*: `erase_page` and
/// `program_halfword` block until the controller reports completion (or
/// failure) before returning, per the core's single-threaded, non-yielding
/// execution model. `read_halfword` is infallible because reading
/// memory-mapped flash cannot fail the way programming or erasing can.
pub trait Flash {
    /// Error reported by the underlying controller.
    type Error;

    /// Erase the page starting at `page_address`, returning it to all-`1`s.
    /// `page_address` is the address of the first byte of the page.
    fn erase_page(&mut self, page_address: u32) -> Result<(), Self::Error>;

    /// Program a 2-byte-aligned half-word at `address`. Only `1 -> 0` bit
    /// transitions are honored by real flash; programming a half-word that
    /// is not currently all-`1`s is undefined by the hardware and is the
    /// caller's responsibility to avoid.
    fn program_halfword(&mut self, address: u32, value: u16) -> Result<(), Self::Error>;

    /// Read the 2-byte-aligned half-word at `address`.
    fn read_halfword(&self, address: u32) -> u16;
}

/// Real-hardware [`Flash`] backend for STM32F103 parts and its error type.
#[cfg(feature = "stm32f103")]
pub use self::stm32f103::{Stm32f103Flash, Stm32f103FlashError};

#[cfg(feature = "stm32f103")]
mod stm32f103 {
    use super::Flash;
    use stm32f1::stm32f103::FLASH;

    const FLASH_KEY1: u32 = 0x4567_0123;
    const FLASH_KEY2: u32 = 0xCDEF_89AB;
    const ERASE_TIMEOUT: u32 = 0x000B_0000;
    const PROGRAM_TIMEOUT: u32 = 0x0000_2000;

    /// Error reported by the STM32F1 flash program/erase controller (FPEC).
    #[derive(Copy, Clone, Debug)]
    #[cfg_attr(feature = "defmt", derive(defmt::Format))]
    pub enum Stm32f103FlashError {
        /// The FPEC failed to unlock within the key-sequence protocol.
        UnlockFailed,
        /// The operation did not complete within its timeout.
        Timeout,
        /// The target half-word was not `0xFFFF` before programming.
        ProgrammingError,
        /// The target address falls in a write-protected sector.
        WriteProtectionError,
        /// The FPEC was busy with another operation.
        Busy,
    }

    /// Real-hardware `Flash` backend for STM32F103 parts, unlocking the FPEC
    /// for the lifetime of the value and locking it again on drop.
    pub struct Stm32f103Flash {
        flash: FLASH,
    }

    impl Stm32f103Flash {
        /// Take ownership of the `FLASH` peripheral and unlock its FPEC.
        pub fn new(flash: FLASH) -> Result<Self, Stm32f103FlashError> {
            unsafe { unlock(&flash)? };
            Ok(Stm32f103Flash { flash })
        }
    }

    impl Drop for Stm32f103Flash {
        fn drop(&mut self) {
            self.flash.cr.modify(|_, w| w.lock().set_bit());
        }
    }

    impl Flash for Stm32f103Flash {
        type Error = Stm32f103FlashError;

        fn erase_page(&mut self, page_address: u32) -> Result<(), Self::Error> {
            status(&self.flash)?;
            self.flash.cr.modify(|_, w| w.per().set_bit());
            self.flash.ar.write(|w| unsafe { w.bits(page_address) });
            self.flash.cr.modify(|_, w| w.strt().set_bit());
            let res = wait_complete(&self.flash, ERASE_TIMEOUT);
            self.flash.cr.modify(|_, w| w.per().clear_bit());
            res
        }

        fn program_halfword(&mut self, address: u32, value: u16) -> Result<(), Self::Error> {
            status(&self.flash)?;
            self.flash.cr.modify(|_, w| w.pg().set_bit());
            unsafe { core::ptr::write(address as *mut u16, value) };
            let res = wait_complete(&self.flash, PROGRAM_TIMEOUT);
            self.flash.cr.modify(|_, w| w.pg().clear_bit());
            res
        }

        fn read_halfword(&self, address: u32) -> u16 {
            unsafe { core::ptr::read(address as *const u16) }
        }
    }

    unsafe fn unlock(flash: &FLASH) -> Result<(), Stm32f103FlashError> {
        if flash.cr.read().lock().bit_is_clear() {
            return Ok(());
        }
        flash.keyr.write(|w| w.key().bits(FLASH_KEY1));
        flash.keyr.write(|w| w.key().bits(FLASH_KEY2));
        if flash.cr.read().lock().bit_is_set() {
            return Err(Stm32f103FlashError::UnlockFailed);
        }
        Ok(())
    }

    fn status(flash: &FLASH) -> Result<(), Stm32f103FlashError> {
        let sr = flash.sr.read();
        if sr.bsy().bit_is_set() {
            Err(Stm32f103FlashError::Busy)
        } else if sr.pgerr().bit_is_set() {
            Err(Stm32f103FlashError::ProgrammingError)
        } else if sr.wrprterr().bit_is_set() {
            Err(Stm32f103FlashError::WriteProtectionError)
        } else {
            Ok(())
        }
    }

    fn wait_complete(flash: &FLASH, mut timeout: u32) -> Result<(), Stm32f103FlashError> {
        while flash.sr.read().bsy().bit_is_set() && timeout > 0 {
            timeout -= 1;
        }
        if timeout == 0 {
            return Err(Stm32f103FlashError::Timeout);
        }
        status(flash)
    }
}
