//! Append-only log file on a mountable volume.
//!
//! - **`target_os = "espidf"`**: SPIFFS partition `storage` registered in
//!   the VFS at `/logfs`; file access goes through `std::fs`.
//! - **`not(target_os = "espidf")`**: a directory on the host file system
//!   with a fixed simulated capacity.
//!
//! Usage is reported in [`BLOCK_SIZE`] blocks, rounded up for the used
//! figure and down for the total, so the near-full check errs early.

use std::fs::{self, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use log::{info, warn};

use crate::app::ports::{LogStore, StorageError, StorageUsage};
use crate::config::LOG_FILE_NAME;

/// Accounting unit for [`StorageUsage`]: one flash erase sector.
pub const BLOCK_SIZE: u64 = 4096;

#[cfg(target_os = "espidf")]
const MOUNT_POINT: &core::ffi::CStr = c"/logfs";
#[cfg(target_os = "espidf")]
const PARTITION_LABEL: &core::ffi::CStr = c"storage";

pub struct FsLogStore {
    root: PathBuf,
    mounted: bool,
    #[cfg(not(target_os = "espidf"))]
    capacity_bytes: u64,
}

fn map_io(e: &io::Error) -> StorageError {
    match e.kind() {
        io::ErrorKind::NotFound => StorageError::NotFound,
        io::ErrorKind::StorageFull => StorageError::Full,
        _ => StorageError::Io,
    }
}

impl FsLogStore {
    #[cfg(target_os = "espidf")]
    pub fn new() -> Self {
        Self {
            root: PathBuf::from("/logfs"),
            mounted: false,
        }
    }

    /// Simulated volume rooted at `root` holding `capacity_bytes`.
    #[cfg(not(target_os = "espidf"))]
    pub fn new(root: impl Into<PathBuf>, capacity_bytes: u64) -> Self {
        Self {
            root: root.into(),
            mounted: false,
            capacity_bytes,
        }
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn log_path(&self) -> Result<PathBuf, StorageError> {
        if self.mounted {
            Ok(self.root.join(LOG_FILE_NAME))
        } else {
            Err(StorageError::Mount)
        }
    }

    #[cfg(target_os = "espidf")]
    fn register(&mut self) -> Result<(), StorageError> {
        use esp_idf_svc::sys::*;

        let conf = esp_vfs_spiffs_conf_t {
            base_path: MOUNT_POINT.as_ptr(),
            partition_label: PARTITION_LABEL.as_ptr(),
            max_files: 2,
            format_if_mount_failed: false,
        };
        // SAFETY: conf and the strings it points to outlive the call.
        let ret = unsafe { esp_vfs_spiffs_register(&conf) };
        // Already registered counts as mounted.
        if ret == ESP_OK as i32 || ret == ESP_ERR_INVALID_STATE as i32 {
            Ok(())
        } else {
            warn!("FsLogStore: SPIFFS register failed ({})", ret);
            Err(StorageError::Mount)
        }
    }

    #[cfg(target_os = "espidf")]
    fn unregister(&mut self) {
        // SAFETY: label is a valid C string.
        let ret = unsafe { esp_idf_svc::sys::esp_vfs_spiffs_unregister(PARTITION_LABEL.as_ptr()) };
        if ret != esp_idf_svc::sys::ESP_OK as i32 {
            warn!("FsLogStore: SPIFFS unregister returned {}", ret);
        }
    }

    #[cfg(target_os = "espidf")]
    fn volume_bytes(&self) -> Result<(u64, u64), StorageError> {
        let mut total: usize = 0;
        let mut used: usize = 0;
        // SAFETY: out-pointers are valid for the call.
        let ret = unsafe {
            esp_idf_svc::sys::esp_spiffs_info(PARTITION_LABEL.as_ptr(), &mut total, &mut used)
        };
        if ret != esp_idf_svc::sys::ESP_OK as i32 {
            return Err(StorageError::Io);
        }
        Ok((used as u64, total as u64))
    }

    #[cfg(target_os = "espidf")]
    fn write_within_volume(
        &self,
        file: &mut fs::File,
        _prev: u64,
        data: &[u8],
    ) -> Result<(), StorageError> {
        file.write_all(data).map_err(|e| map_io(&e))?;
        file.flush().map_err(|e| map_io(&e))
    }

    /// Like a full flash volume: whatever fits is written, then the write
    /// fails.
    #[cfg(not(target_os = "espidf"))]
    fn write_within_volume(
        &self,
        file: &mut fs::File,
        prev: u64,
        data: &[u8],
    ) -> Result<(), StorageError> {
        let room = self.capacity_bytes.saturating_sub(prev) as usize;
        if data.len() > room {
            file.write_all(&data[..room]).map_err(|e| map_io(&e))?;
            return Err(StorageError::Full);
        }
        file.write_all(data).map_err(|e| map_io(&e))?;
        file.flush().map_err(|e| map_io(&e))
    }

    #[cfg(not(target_os = "espidf"))]
    fn volume_bytes(&self) -> Result<(u64, u64), StorageError> {
        let used = match fs::metadata(self.log_path()?) {
            Ok(m) => m.len(),
            Err(e) if e.kind() == io::ErrorKind::NotFound => 0,
            Err(e) => return Err(map_io(&e)),
        };
        Ok((used, self.capacity_bytes))
    }
}

impl LogStore for FsLogStore {
    fn mount(&mut self) -> Result<(), StorageError> {
        if self.mounted {
            return Ok(());
        }

        #[cfg(target_os = "espidf")]
        self.register()?;

        #[cfg(not(target_os = "espidf"))]
        fs::create_dir_all(&self.root).map_err(|e| map_io(&e))?;

        self.mounted = true;
        Ok(())
    }

    fn format(&mut self) -> Result<(), StorageError> {
        self.unmount();
        info!("FsLogStore: formatting volume");

        #[cfg(target_os = "espidf")]
        {
            // SAFETY: label is a valid C string; the partition is unmounted.
            let ret = unsafe { esp_idf_svc::sys::esp_spiffs_format(PARTITION_LABEL.as_ptr()) };
            if ret != esp_idf_svc::sys::ESP_OK as i32 {
                warn!("FsLogStore: format failed ({})", ret);
                return Err(StorageError::Io);
            }
        }

        #[cfg(not(target_os = "espidf"))]
        match fs::remove_dir_all(&self.root) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(map_io(&e)),
        }

        Ok(())
    }

    fn unmount(&mut self) {
        if !self.mounted {
            return;
        }

        #[cfg(target_os = "espidf")]
        self.unregister();

        self.mounted = false;
    }

    /// All or nothing: a failed write is cut back to the previous length so
    /// the file stays a whole number of records.
    fn append(&mut self, data: &[u8]) -> Result<(), StorageError> {
        let path = self.log_path()?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| map_io(&e))?;
        let prev = file.metadata().map_err(|e| map_io(&e))?.len();

        if let Err(e) = self.write_within_volume(&mut file, prev, data) {
            warn!("FsLogStore: append failed ({}), truncating to {} bytes", e, prev);
            if let Err(te) = file.set_len(prev) {
                warn!("FsLogStore: truncate failed: {}", te);
            }
            return Err(e);
        }
        Ok(())
    }

    fn log_size(&mut self) -> Result<u64, StorageError> {
        fs::metadata(self.log_path()?)
            .map(|m| m.len())
            .map_err(|e| map_io(&e))
    }

    fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<usize, StorageError> {
        let mut file = fs::File::open(self.log_path()?).map_err(|e| map_io(&e))?;
        file.seek(SeekFrom::Start(offset)).map_err(|e| map_io(&e))?;
        let mut filled = 0;
        while filled < buf.len() {
            match file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(map_io(&e)),
            }
        }
        Ok(filled)
    }

    fn remove(&mut self) -> Result<(), StorageError> {
        fs::remove_file(self.log_path()?).map_err(|e| map_io(&e))
    }

    fn usage(&mut self) -> Result<StorageUsage, StorageError> {
        if !self.mounted {
            return Err(StorageError::Mount);
        }
        let (used, total) = self.volume_bytes()?;
        Ok(StorageUsage {
            used_blocks: used.div_ceil(BLOCK_SIZE) as u32,
            total_blocks: (total / BLOCK_SIZE) as u32,
        })
    }
}
