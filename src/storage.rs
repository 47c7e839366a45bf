//! Persistent storage for the last saved RMS snapshot.
//!
//! Uses the nRF52840's internal flash via `sequential-storage` crate.
//! A single map key holds the newest [`SnapshotRecord`]; older versions
//! are reclaimed by `sequential-storage` garbage collection.

use defmt::{error, info};
use embedded_storage_async::nor_flash::NorFlash;
use sequential_storage::cache::NoCache;
use sequential_storage::map::{fetch_item, store_item};
use sigmon::config::{STORAGE_FLASH_PAGE_COUNT, STORAGE_FLASH_PAGE_START};
use sigmon::error::Error;
use sigmon::rms::MonitorVector;
use sigmon::snapshot::{SnapshotRecord, SNAPSHOT_RECORD_LEN};

/// Flash page size for nRF52840 (4 KB).
const FLASH_PAGE_SIZE: u32 = 4096;

/// Start address of our storage region.
const STORAGE_START: u32 = STORAGE_FLASH_PAGE_START * FLASH_PAGE_SIZE;

/// End address (exclusive) of our storage region.
const STORAGE_END: u32 = (STORAGE_FLASH_PAGE_START + STORAGE_FLASH_PAGE_COUNT) * FLASH_PAGE_SIZE;

const KEY_SNAPSHOT: u8 = 0x01;

/// Scratch buffer for `sequential-storage` (item header plus record).
const BUF_SIZE: usize = 64;

pub struct SnapshotStore<F> {
    flash: F,
    last: Option<SnapshotRecord>,
}

impl<F: NorFlash> SnapshotStore<F> {
    pub fn new(flash: F) -> Self {
        Self { flash, last: None }
    }

    /// Load the newest record, if any. Errors are logged and treated as empty.
    pub async fn load(&mut self) -> Option<SnapshotRecord> {
        let mut buf = [0u8; BUF_SIZE];
        let found = fetch_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_SNAPSHOT,
        )
        .await;

        self.last = match found {
            Ok(Some(data)) => SnapshotRecord::deserialize(data),
            Ok(None) => None,
            Err(e) => {
                error!("Storage: read failed: {:?}", defmt::Debug2Format(&e));
                None
            }
        };
        match &self.last {
            Some(rec) => info!("Storage: loaded snapshot #{}", rec.sequence),
            None => info!("Storage: no snapshot in flash"),
        }
        self.last
    }

    /// Persist `vector` as the next record.
    pub async fn save(&mut self, vector: &MonitorVector) -> Result<u32, Error> {
        let record = match &self.last {
            Some(prev) => prev.next(vector),
            None => SnapshotRecord::new(0, vector),
        };

        let mut item = [0u8; SNAPSHOT_RECORD_LEN];
        record.serialize(&mut item)?;

        let mut buf = [0u8; BUF_SIZE];
        store_item::<u8, &[u8], _>(
            &mut self.flash,
            STORAGE_START..STORAGE_END,
            &mut NoCache::new(),
            &mut buf,
            &KEY_SNAPSHOT,
            &&item[..],
        )
        .await
        .map_err(|e| {
            error!("Storage: write failed: {:?}", defmt::Debug2Format(&e));
            Error::Storage
        })?;

        info!("Storage: saved snapshot #{}", record.sequence);
        self.last = Some(record);
        Ok(record.sequence)
    }
}
