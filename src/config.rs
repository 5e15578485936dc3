//! Static configuration: flash geometry and the injected key table.
//!
//! The key table is the set of virtual addresses the embedding application
//! cares about. The core never invents addresses — it only uses the table
//! to enumerate keys to copy during a transfer. It is taken as a borrowed
//! slice rather than a global so that multiple EEPROM instances, each with
//! their own key table, can be tested and run independently.

/// Minimum number of pages the rotation protocol needs to make progress.
pub const PAGE_NUM_MIN: u8 = 2;
/// Maximum number of pages a single status half-word's ring can address
/// while keeping startup reconstruction's case analysis tractable.
pub const PAGE_NUM_MAX: u8 = 6;

/// A page index into the ring, `0..page_count`. A thin newtype over `u8` so
/// the Rotation Engine's page arithmetic doesn't read as bare integer math.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageIndex(u8);

impl PageIndex {
    /// Wrap a raw page number.
    pub fn new(index: u8) -> Self {
        PageIndex(index)
    }

    /// The raw page number.
    pub fn get(self) -> u8 {
        self.0
    }
}

impl From<u8> for PageIndex {
    fn from(index: u8) -> Self {
        PageIndex(index)
    }
}

/// Geometry of the flash window backing one EEPROM instance, plus the
/// application's virtual-address key table.
#[derive(Clone, Copy)]
pub struct Config<'a> {
    first_page_address: u32,
    page_size: u32,
    page_count: u8,
    keys: &'a [u16],
}

impl<'a> Config<'a> {
    /// Build a configuration, asserting the invariants the rotation engine
    /// relies on: `page_count` in `[2, 6]`, `first_page_address` aligned to
    /// `page_size`, and no reserved (`0xFFFF`) key in `keys`.
    ///
    /// # Panics
    /// Panics if any of the above invariants does not hold.
    pub fn new(first_page_address: u32, page_size: u32, page_count: u8, keys: &'a [u16]) -> Self {
        assert!(
            (PAGE_NUM_MIN..=PAGE_NUM_MAX).contains(&page_count),
            "page_count must be between {} and {}",
            PAGE_NUM_MIN,
            PAGE_NUM_MAX
        );
        assert_eq!(
            first_page_address % page_size,
            0,
            "first_page_address must be page-aligned"
        );
        assert!(
            !keys.contains(&0xFFFF),
            "0xFFFF is reserved and cannot appear in the key table"
        );
        Config {
            first_page_address,
            page_size,
            page_count,
            keys,
        }
    }

    /// Number of pages in the ring.
    pub fn page_count(&self) -> u8 {
        self.page_count
    }

    /// Size, in bytes, of a single page.
    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// The application's virtual-address key table.
    pub fn keys(&self) -> &'a [u16] {
        self.keys
    }

    /// Address of the first byte (the header half-word) of `page`.
    pub fn page_address(&self, page: PageIndex) -> u32 {
        debug_assert!(page.get() < self.page_count, "page index out of range");
        self.first_page_address + (page.get() as u32) * self.page_size
    }

    /// The ring-successor of `page`: `(page + 1) mod page_count`.
    pub fn next(&self, page: PageIndex) -> PageIndex {
        PageIndex::new((page.get() + 1) % self.page_count)
    }

    /// Every page index in the ring, `0..page_count`.
    pub fn pages(&self) -> impl Iterator<Item = PageIndex> {
        (0..self.page_count).map(PageIndex::new)
    }
}

/// Incrementally builds a [`Config`]: `first_page_address` defaults to `0`
/// and `keys` to an empty table, so a call site only has to override the
/// fields it cares about.
#[derive(Clone, Copy)]
pub struct EepromBuilder<'a> {
    first_page_address: u32,
    page_size: u32,
    page_count: u8,
    keys: &'a [u16],
}

impl<'a> EepromBuilder<'a> {
    /// Start a builder for a ring of `page_count` pages of `page_size`
    /// bytes each.
    pub fn new(page_size: u32, page_count: u8) -> Self {
        EepromBuilder {
            first_page_address: 0,
            page_size,
            page_count,
            keys: &[],
        }
    }

    /// Set the flash address of the first page.
    pub fn first_page_address(mut self, address: u32) -> Self {
        self.first_page_address = address;
        self
    }

    /// Set the application's virtual-address key table.
    pub fn keys(mut self, keys: &'a [u16]) -> Self {
        self.keys = keys;
        self
    }

    /// Validate and produce the [`Config`].
    ///
    /// # Panics
    /// Panics under the same conditions as [`Config::new`].
    pub fn build(self) -> Config<'a> {
        Config::new(
            self.first_page_address,
            self.page_size,
            self.page_count,
            self.keys,
        )
    }
}

// Default configuration driven by linker-script symbols
// (`_eeprom_offset`/`_page_size`/`_eeprom_pages`), for firmware that
// reserves its EEPROM region in the link script rather than picking a
// window at runtime. Only meaningful when actually linking firmware, hence
// gated behind both `default-eeprom` and a real hardware backend.
#[cfg(all(feature = "default-eeprom", feature = "stm32f103"))]
mod linked {
    extern "C" {
        #[link_name = "_eeprom_offset"]
        static EEPROM_START: u32;
        #[link_name = "_page_size"]
        static PAGE_SIZE: u32;
        #[link_name = "_eeprom_pages"]
        static EEPROM_PAGES: u32;
    }

    /// Build a [`super::Config`] from the linker-script symbols
    /// `_eeprom_offset`, `_page_size`, and `_eeprom_pages`.
    pub fn from_linker_script(keys: &[u16]) -> super::Config<'_> {
        let first_page_address = unsafe { &EEPROM_START } as *const u32 as u32;
        let page_size = unsafe { &PAGE_SIZE } as *const u32 as u32;
        let page_count = unsafe { &EEPROM_PAGES } as *const u32 as u32 as u8;
        super::Config::new(first_page_address, page_size, page_count, keys)
    }
}

/// Build a [`Config`] from the linker-script symbols `_eeprom_offset`,
/// `_page_size`, and `_eeprom_pages`.
#[cfg(all(feature = "default-eeprom", feature = "stm32f103"))]
pub use linked::from_linker_script;
