//! Page Rotation Engine: active-page selection, the write path, the
//! step-ordered transfer/compaction protocol, and startup reconstruction.

use crate::config::{Config, PageIndex};
use crate::error::Error;
use crate::flash::Flash;
use crate::record::{self, AppendOutcome};
use crate::status::{self, Status};

/// `0xFFFF` is reserved to mark unwritten record slots and cannot be used
/// as a virtual address.
const RESERVED_ADDRESS: u16 = 0xFFFF;

/// A flash-backed, wear-leveled key/value store for fixed-width 16-bit
/// values addressed by fixed-width 16-bit virtual addresses.
///
/// `init` must be called exactly once, before any `read` or `write`, to
/// reconcile any configuration left by an interrupted prior operation.
///
/// # Panics
/// * if a transfer's destination page cannot hold the triggering record
///   plus every live key, which means `page_size` is too small for the
///   configured key table — a configuration error, not a runtime one.
pub struct Eeprom<'a, F: Flash> {
    flash: F,
    config: Config<'a>,
}

impl<'a, F: Flash> Eeprom<'a, F> {
    /// Build a controller over `flash` using the explicit `config`.
    pub fn new(flash: F, config: Config<'a>) -> Self {
        Eeprom { flash, config }
    }

    /// Build a controller using [`crate::config::from_linker_script`].
    #[cfg(all(feature = "default-eeprom", feature = "stm32f103"))]
    pub fn new_default(flash: F, keys: &'a [u16]) -> Self {
        Eeprom::new(flash, crate::config::from_linker_script(keys))
    }

    /// Perform startup reconstruction. Must run once before any other call.
    ///
    /// Idempotent: running `init` twice in succession with no intervening
    /// writes leaves flash in the same state as running it once.
    pub fn init(&mut self) -> Result<(), Error<F::Error>> {
        let mut valid: Option<PageIndex> = None;
        let mut receive: Option<PageIndex> = None;
        let mut corrupt = false;
        let mut anomalous = PageIndex::new(0);

        for page in self.config.pages() {
            match self.page_status(page) {
                Status::Valid => {
                    if valid.is_some() {
                        corrupt = true;
                        anomalous = page;
                    } else {
                        valid = Some(page);
                    }
                }
                Status::ReceiveData => {
                    if receive.is_some() {
                        corrupt = true;
                        anomalous = page;
                    } else {
                        receive = Some(page);
                    }
                }
                Status::Unknown(_) => {
                    corrupt = true;
                    anomalous = page;
                }
                Status::Erased => {}
            }
        }

        if corrupt {
            return self.format(anomalous);
        }

        match (valid, receive) {
            (Some(v), None) => {
                // Steady state: erase the successor defensively.
                let next = self.config.next(v);
                self.flash
                    .erase_page(self.config.page_address(next))
                    .map_err(Error::Flash)
            }
            (Some(v), Some(r)) if r == self.config.next(v) => {
                // Transfer interrupted at or before step 3: replay the
                // copy loop (the triggering write, if lost, stays lost),
                // then erase the source, then promote the destination.
                self.replay_copy(v, r)?;
                self.flash
                    .erase_page(self.config.page_address(v))
                    .map_err(Error::Flash)?;
                status::mark(&mut self.flash, self.config.page_address(r), Status::Valid)
                    .map_err(Error::Flash)
            }
            (Some(_), Some(r)) => {
                // A Valid and a ReceiveData page exist but are not in the
                // src/dst relationship the transfer protocol produces:
                // not a configuration the protocol can have left behind.
                self.format(r)
            }
            (None, Some(r)) => {
                // Transfer interrupted between erasing the source and
                // promoting the destination: promote it, then erase its
                // successor defensively.
                status::mark(&mut self.flash, self.config.page_address(r), Status::Valid)
                    .map_err(Error::Flash)?;
                let next = self.config.next(r);
                self.flash
                    .erase_page(self.config.page_address(next))
                    .map_err(Error::Flash)
            }
            (None, None) => {
                // Fresh or fully-erased array.
                self.format(PageIndex::new(0))
            }
        }
    }

    /// Look up the latest value stored for `addr`.
    pub fn read(&mut self, addr: u16) -> Result<Option<u16>, Error<F::Error>> {
        if addr == RESERVED_ADDRESS {
            return Err(Error::ReservedAddress);
        }
        let page = self.find_read_page().ok_or(Error::NoValidPage)?;
        Ok(record::find_latest(
            &self.flash,
            self.config.page_address(page),
            self.config.page_size(),
            addr,
        ))
    }

    /// Append a new value for `addr`, transparently compacting if the
    /// active page is full.
    pub fn write(&mut self, addr: u16, value: u16) -> Result<(), Error<F::Error>> {
        if addr == RESERVED_ADDRESS {
            return Err(Error::ReservedAddress);
        }
        let page = self.find_write_page().ok_or(Error::NoValidPage)?;
        match record::append(
            &mut self.flash,
            self.config.page_address(page),
            self.config.page_size(),
            addr,
            value,
        )
        .map_err(Error::Flash)?
        {
            AppendOutcome::Ok => Ok(()),
            AppendOutcome::Full => self.transfer(page, addr, value),
        }
    }

    /// Status of `page`'s header, exposed for diagnostics and testing.
    pub fn page_status(&self, page: impl Into<PageIndex>) -> Status {
        status::read_status(&self.flash, self.config.page_address(page.into()))
    }

    /// Borrow the underlying flash driver, e.g. to inspect controller-level
    /// diagnostics that are not part of this crate's own API.
    pub fn flash(&self) -> &F {
        &self.flash
    }

    /// Mutably borrow the underlying flash driver.
    pub fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }

    fn find_read_page(&self) -> Option<PageIndex> {
        self.config.pages().find(|&p| self.page_status(p) == Status::Valid)
    }

    fn find_write_page(&self) -> Option<PageIndex> {
        let valid = self.find_read_page()?;
        let next = self.config.next(valid);
        if self.page_status(next) == Status::ReceiveData {
            Some(next)
        } else {
            Some(valid)
        }
    }

    /// Transfer / compaction. The step order is the correctness argument:
    /// the destination is erased and *then* promoted, never the other way
    /// around, so a power loss mid-transfer never leaves two `Valid` pages.
    fn transfer(&mut self, src: PageIndex, addr: u16, value: u16) -> Result<(), Error<F::Error>> {
        let dst = self.config.next(src);

        // 1. Mark destination receiving.
        status::mark(&mut self.flash, self.config.page_address(dst), Status::ReceiveData)
            .map_err(Error::Flash)?;

        // 2. Write the triggering record first, so it is durable before
        // any other work.
        self.append_to(dst, addr, value)?;

        // 3. Copy every other live key's latest value.
        self.copy_live_keys(src, dst, addr)?;

        // 4. Erase the old page first.
        self.flash
            .erase_page(self.config.page_address(src))
            .map_err(Error::Flash)?;

        // 5. Promote the destination.
        status::mark(&mut self.flash, self.config.page_address(dst), Status::Valid)
            .map_err(Error::Flash)
    }

    fn replay_copy(&mut self, src: PageIndex, dst: PageIndex) -> Result<(), Error<F::Error>> {
        for &key in self.config.keys() {
            if let Some(value) = record::find_latest(
                &self.flash,
                self.config.page_address(src),
                self.config.page_size(),
                key,
            ) {
                if record::find_latest(
                    &self.flash,
                    self.config.page_address(dst),
                    self.config.page_size(),
                    key,
                )
                .is_none()
                {
                    self.append_to(dst, key, value)?;
                }
            }
        }
        Ok(())
    }

    fn copy_live_keys(
        &mut self,
        src: PageIndex,
        dst: PageIndex,
        written: u16,
    ) -> Result<(), Error<F::Error>> {
        for &key in self.config.keys() {
            if key == written {
                continue;
            }
            if let Some(value) = record::find_latest(
                &self.flash,
                self.config.page_address(src),
                self.config.page_size(),
                key,
            ) {
                self.append_to(dst, key, value)?;
            }
        }
        Ok(())
    }

    fn append_to(&mut self, page: PageIndex, addr: u16, value: u16) -> Result<(), Error<F::Error>> {
        match record::append(
            &mut self.flash,
            self.config.page_address(page),
            self.config.page_size(),
            addr,
            value,
        )
        .map_err(Error::Flash)?
        {
            AppendOutcome::Ok => Ok(()),
            AppendOutcome::Full => panic!(
                "transfer destination page is full: page_size is too small for the key table"
            ),
        }
    }

    fn format(&mut self, initial_page: PageIndex) -> Result<(), Error<F::Error>> {
        for page in self.config.pages() {
            self.flash
                .erase_page(self.config.page_address(page))
                .map_err(Error::Flash)?;
        }
        status::mark(
            &mut self.flash,
            self.config.page_address(initial_page),
            Status::Valid,
        )
        .map_err(Error::Flash)
    }
}
