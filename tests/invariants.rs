//! Property tests: random write sequences, with one final write interrupted
//! at an arbitrary flash-op boundary, must always converge back to exactly
//! one `Valid` page and never forget a value that was durable before the
//! interruption.

mod common;

use common::SimFlash;
use flash_eeprom::config::Config;
use flash_eeprom::{Eeprom, Status};
use proptest::prelude::*;

const PAGE_SIZE: u32 = 128;
const PAGE_COUNT: u32 = 3;
const KEYS: [u16; 3] = [0x0001, 0x0002, 0x0003];

fn new_eeprom(flash: SimFlash) -> Eeprom<'static, SimFlash> {
    let config = Config::new(0, PAGE_SIZE, PAGE_COUNT as u8, &KEYS);
    Eeprom::new(flash, config)
}

#[derive(Debug, Clone, Copy)]
struct WriteOp {
    key_index: usize,
    value: u16,
}

fn write_op() -> impl Strategy<Value = WriteOp> {
    (0..KEYS.len(), any::<u16>()).prop_map(|(key_index, value)| WriteOp { key_index, value })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every write that returns `Ok` is immediately visible to `read`, for
    /// every key, regardless of how many prior writes rotated the log
    /// across pages.
    #[test]
    fn every_successful_write_is_immediately_readable(
        ops in proptest::collection::vec(write_op(), 1..60),
    ) {
        let mut eeprom = new_eeprom(SimFlash::new(0, PAGE_SIZE, PAGE_COUNT));
        eeprom.init().unwrap();

        let mut model: [Option<u16>; 3] = [None, None, None];
        for op in &ops {
            eeprom.write(KEYS[op.key_index], op.value).unwrap();
            model[op.key_index] = Some(op.value);
            for (i, key) in KEYS.iter().enumerate() {
                prop_assert_eq!(eeprom.read(*key).unwrap(), model[i]);
            }
        }
    }

    /// After `init`, exactly one page must be `Valid`. Interrupting a write
    /// at any flash-op boundary and calling `init` again always converges
    /// back to exactly one `Valid` page, and every key durable before the
    /// interruption is still readable.
    #[test]
    fn recovers_from_interruption_at_any_flash_op(
        ops in proptest::collection::vec(write_op(), 0..40),
        cut in 0usize..8,
    ) {
        let mut eeprom = new_eeprom(SimFlash::new(0, PAGE_SIZE, PAGE_COUNT));
        eeprom.init().unwrap();

        let mut durable: [Option<u16>; 3] = [None, None, None];
        for op in &ops {
            eeprom.write(KEYS[op.key_index], op.value).unwrap();
            durable[op.key_index] = Some(op.value);
        }

        let extra_key_index = ops.len() % KEYS.len();
        let extra_value = 0xAAAA;
        let snapshot_ops = eeprom.flash().op_count();
        let mut flash = eeprom.flash().clone();
        flash.cut_after(snapshot_ops + cut);
        let mut crashing = new_eeprom(flash);
        let _ = crashing.write(KEYS[extra_key_index], extra_value);

        crashing.flash_mut().power_restored();
        crashing.init().unwrap();

        let valid_count = (0..PAGE_COUNT as u8)
            .filter(|&p| crashing.page_status(p) == Status::Valid)
            .count();
        prop_assert_eq!(valid_count, 1);

        for (i, key) in KEYS.iter().enumerate() {
            let got = crashing.read(*key).unwrap();
            if i == extra_key_index {
                prop_assert!(got == durable[i] || got == Some(extra_value));
            } else {
                prop_assert_eq!(got, durable[i]);
            }
        }
    }
}
