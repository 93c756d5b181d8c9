//! Persistent storage of the tracking override values.
//!
//! The `tracking` namespace occupies one dedicated flash page. Its record is
//! a single double word:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 4 | magic `TRCK` |
//! | 4 | 2 | `balance`, little endian |
//! | 6 | 2 | `gain`, little endian |
//!
//! An erased or foreign page reads as "not found".

use embedded_storage::nor_flash::NorFlash;

use crate::overrides::TrackingValues;

pub const NAMESPACE_MAGIC: [u8; 4] = *b"TRCK";
pub const RECORD_LEN: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StoreError {
    Read,
    Erase,
    Write,
}

/// Tracking values persisted in the page at `offset`.
pub struct TrackingStore<F> {
    flash: F,
    offset: u32,
}

impl<F: NorFlash> TrackingStore<F> {
    /// `offset` must be the start of an erase page reserved for this store.
    pub fn new(flash: F, offset: u32) -> Self {
        debug_assert!(offset as usize % F::ERASE_SIZE == 0);
        debug_assert!(RECORD_LEN % F::WRITE_SIZE == 0);
        Self { flash, offset }
    }

    /// Reads the stored pair, `None` if nothing valid was ever written.
    pub fn read(&mut self) -> Result<Option<TrackingValues>, StoreError> {
        let mut record = [0u8; RECORD_LEN];
        self.flash
            .read(self.offset, &mut record)
            .map_err(|_| StoreError::Read)?;

        if record[..4] != NAMESPACE_MAGIC {
            return Ok(None);
        }

        Ok(Some(TrackingValues {
            balance: u16::from_le_bytes([record[4], record[5]]),
            gain: u16::from_le_bytes([record[6], record[7]]),
        }))
    }

    /// Replaces the stored pair.
    pub fn write(&mut self, values: TrackingValues) -> Result<(), StoreError> {
        let mut record = [0u8; RECORD_LEN];
        record[..4].copy_from_slice(&NAMESPACE_MAGIC);
        record[4..6].copy_from_slice(&values.balance.to_le_bytes());
        record[6..8].copy_from_slice(&values.gain.to_le_bytes());

        let page_end = self.offset + F::ERASE_SIZE as u32;
        self.flash
            .erase(self.offset, page_end)
            .map_err(|_| StoreError::Erase)?;
        self.flash
            .write(self.offset, &record)
            .map_err(|_| StoreError::Write)
    }

    /// Reads the stored pair, writing `defaults` back first if the page holds
    /// none.
    pub fn load_or_init(&mut self, defaults: TrackingValues) -> Result<TrackingValues, StoreError> {
        match self.read()? {
            Some(values) => Ok(values),
            None => {
                self.write(defaults)?;
                Ok(defaults)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::RamFlash;

    const PAGE: u32 = RamFlash::PAGE as u32;

    #[test]
    fn erased_page_reads_as_missing() {
        let mut store = TrackingStore::new(RamFlash::new(2), PAGE);
        assert_eq!(store.read(), Ok(None));
    }

    #[test]
    fn write_then_read() {
        let mut store = TrackingStore::new(RamFlash::new(2), PAGE);
        let values = TrackingValues {
            balance: 0x900,
            gain: 0x930,
        };

        store.write(values).unwrap();
        assert_eq!(store.read(), Ok(Some(values)));
    }

    #[test]
    fn rewrite_replaces_previous_record() {
        let mut store = TrackingStore::new(RamFlash::new(1), 0);
        store.write(TrackingValues::DEFAULT).unwrap();

        let zeroed = TrackingValues {
            balance: 0,
            gain: 0x831,
        };
        store.write(zeroed).unwrap();

        assert_eq!(store.read(), Ok(Some(zeroed)));
    }

    #[test]
    fn load_or_init_persists_defaults() {
        let mut store = TrackingStore::new(RamFlash::new(1), 0);

        assert_eq!(
            store.load_or_init(TrackingValues::DEFAULT),
            Ok(TrackingValues::DEFAULT)
        );
        assert_eq!(store.read(), Ok(Some(TrackingValues::DEFAULT)));
    }

    #[test]
    fn load_or_init_keeps_existing_values() {
        let mut store = TrackingStore::new(RamFlash::new(1), 0);
        let stored = TrackingValues {
            balance: 0x811,
            gain: 0x822,
        };
        store.write(stored).unwrap();

        assert_eq!(store.load_or_init(TrackingValues::DEFAULT), Ok(stored));
    }

    #[test]
    fn flash_faults_surface_as_errors() {
        let mut flash = RamFlash::new(1);
        flash.fail_reads = true;
        let mut store = TrackingStore::new(flash, 0);
        assert_eq!(store.read(), Err(StoreError::Read));

        let mut flash = RamFlash::new(1);
        flash.fail_writes = true;
        let mut store = TrackingStore::new(flash, 0);
        assert_eq!(store.write(TrackingValues::DEFAULT), Err(StoreError::Erase));
    }
}
