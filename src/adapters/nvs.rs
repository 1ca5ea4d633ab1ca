//! NVS (Non-Volatile Storage) adapter.
//!
//! Implements [`ConfigPort`]: the tunable [`LoggerConfig`] is kept as one
//! postcard blob.  All fields are range-checked before persistence; a
//! missing blob loads as the defaults.

use crate::app::ports::{ConfigError, ConfigPort};
use crate::config::LoggerConfig;
use log::info;

#[cfg(not(target_os = "espidf"))]
use std::collections::HashMap;

#[cfg(target_os = "espidf")]
use esp_idf_svc::sys::*;
#[cfg(target_os = "espidf")]
use log::warn;

const CONFIG_NAMESPACE: &str = "wakelogger";
#[cfg(not(target_os = "espidf"))]
const CONFIG_KEY: &str = "loggercfg";

#[allow(dead_code)]
const MAX_BLOB_SIZE: usize = 256;

pub struct NvsConfigStore {
    #[cfg(not(target_os = "espidf"))]
    store: std::cell::RefCell<HashMap<String, Vec<u8>>>,
}

impl NvsConfigStore {
    /// Initialise NVS flash.  On a full partition or a version mismatch the
    /// partition is erased and re-initialised.
    pub fn new() -> Result<Self, ConfigError> {
        #[cfg(target_os = "espidf")]
        {
            // SAFETY: called once from the main task before any other NVS use.
            let ret = unsafe { nvs_flash_init() };
            if ret == ESP_ERR_NVS_NO_FREE_PAGES || ret == ESP_ERR_NVS_NEW_VERSION_FOUND {
                warn!("NVS: erasing and re-initialising flash partition");
                if unsafe { nvs_flash_erase() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
                if unsafe { nvs_flash_init() } != ESP_OK {
                    return Err(ConfigError::IoError);
                }
            } else if ret != ESP_OK {
                return Err(ConfigError::IoError);
            }
            info!("NvsConfigStore: ESP-IDF NVS initialised");
        }

        #[cfg(not(target_os = "espidf"))]
        info!("NvsConfigStore: simulation backend");

        Ok(Self {
            #[cfg(not(target_os = "espidf"))]
            store: std::cell::RefCell::new(HashMap::new()),
        })
    }

    #[cfg(not(target_os = "espidf"))]
    fn composite_key() -> String {
        format!("{}::{}", CONFIG_NAMESPACE, CONFIG_KEY)
    }

    /// Store raw bytes under the config key, bypassing validation.
    #[cfg(not(target_os = "espidf"))]
    pub fn put_raw(&self, bytes: &[u8]) {
        self.store
            .borrow_mut()
            .insert(Self::composite_key(), bytes.to_vec());
    }

    /// Open the config namespace, run `f` with the handle, then close.
    #[cfg(target_os = "espidf")]
    fn with_nvs_handle<F, T>(write: bool, f: F) -> Result<T, i32>
    where
        F: FnOnce(nvs_handle_t) -> Result<T, i32>,
    {
        let mut ns_buf = [0u8; 16];
        let ns_bytes = CONFIG_NAMESPACE.as_bytes();
        let len = ns_bytes.len().min(15);
        ns_buf[..len].copy_from_slice(&ns_bytes[..len]);

        let mut handle: nvs_handle_t = 0;
        let mode = if write {
            nvs_open_mode_t_NVS_READWRITE
        } else {
            nvs_open_mode_t_NVS_READONLY
        };

        let ret = unsafe { nvs_open(ns_buf.as_ptr() as *const _, mode, &mut handle) };
        if ret != ESP_OK {
            return Err(ret);
        }

        let result = f(handle);
        unsafe {
            nvs_close(handle);
        }
        result
    }
}

/// Range-check every field.  Rejects rather than clamps.
pub fn validate_config(cfg: &LoggerConfig) -> Result<(), ConfigError> {
    if !(10..=5_000).contains(&cfg.reply_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "reply_timeout_ms must be 10–5000",
        ));
    }
    if cfg.accept_pulse_ms > 1_000 {
        return Err(ConfigError::ValidationFailed(
            "accept_pulse_ms must be 0–1000",
        ));
    }
    if !(1_000..=600_000).contains(&cfg.enumeration_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "enumeration_timeout_ms must be 1000–600000",
        ));
    }
    if !(1..=1_000).contains(&cfg.presence_stable_ms) {
        return Err(ConfigError::ValidationFailed(
            "presence_stable_ms must be 1–1000",
        ));
    }
    if cfg.presence_timeout_ms < cfg.presence_stable_ms || cfg.presence_timeout_ms > 10_000 {
        return Err(ConfigError::ValidationFailed(
            "presence_timeout_ms must be >= presence_stable_ms and <= 10000",
        ));
    }
    if !(1..=5_000).contains(&cfg.release_stable_ms) {
        return Err(ConfigError::ValidationFailed(
            "release_stable_ms must be 1–5000",
        ));
    }
    if cfg.release_timeout_ms < cfg.release_stable_ms || cfg.release_timeout_ms > 60_000 {
        return Err(ConfigError::ValidationFailed(
            "release_timeout_ms must be >= release_stable_ms and <= 60000",
        ));
    }
    if !(10..=60_000).contains(&cfg.packet_start_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "packet_start_timeout_ms must be 10–60000",
        ));
    }
    if !(10..=60_000).contains(&cfg.packet_complete_timeout_ms) {
        return Err(ConfigError::ValidationFailed(
            "packet_complete_timeout_ms must be 10–60000",
        ));
    }
    if !(1..=1_000).contains(&cfg.packet_retry_backoff_ms) {
        return Err(ConfigError::ValidationFailed(
            "packet_retry_backoff_ms must be 1–1000",
        ));
    }
    if cfg.reserve_blocks > 64 {
        return Err(ConfigError::ValidationFailed(
            "reserve_blocks must be 0–64",
        ));
    }
    Ok(())
}

impl ConfigPort for NvsConfigStore {
    fn load(&self) -> Result<LoggerConfig, ConfigError> {
        #[cfg(not(target_os = "espidf"))]
        {
            if let Some(bytes) = self.store.borrow().get(&Self::composite_key()) {
                let cfg: LoggerConfig =
                    postcard::from_bytes(bytes).map_err(|_| ConfigError::Corrupted)?;
                validate_config(&cfg)?;
                info!("NvsConfigStore: loaded config from store");
                Ok(cfg)
            } else {
                info!("NvsConfigStore: no stored config, using defaults");
                Ok(LoggerConfig::default())
            }
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(false, |handle| {
                let key_cstr = b"loggercfg\0";
                let mut size: usize = 0;

                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        core::ptr::null_mut(),
                        &mut size,
                    )
                };
                if ret == ESP_ERR_NVS_NOT_FOUND {
                    return Err(ESP_ERR_NVS_NOT_FOUND);
                }
                if ret != ESP_OK || size == 0 || size > MAX_BLOB_SIZE {
                    return Err(ret);
                }

                let mut buf = vec![0u8; size];
                let ret = unsafe {
                    nvs_get_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        buf.as_mut_ptr() as *mut _,
                        &mut size,
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(buf)
            });

            match result {
                Ok(bytes) => {
                    let cfg: LoggerConfig =
                        postcard::from_bytes(&bytes).map_err(|_| ConfigError::Corrupted)?;
                    validate_config(&cfg)?;
                    info!("NvsConfigStore: loaded config from NVS ({} bytes)", bytes.len());
                    Ok(cfg)
                }
                // A namespace that was never written cannot be opened read-only.
                Err(e) if e == ESP_ERR_NVS_NOT_FOUND => {
                    info!("NvsConfigStore: no stored config, using defaults");
                    Ok(LoggerConfig::default())
                }
                Err(e) => {
                    warn!("NvsConfigStore: NVS read error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }

    fn save(&self, config: &LoggerConfig) -> Result<(), ConfigError> {
        validate_config(config)?;
        let bytes = postcard::to_allocvec(config).map_err(|_| ConfigError::IoError)?;

        #[cfg(not(target_os = "espidf"))]
        {
            self.put_raw(&bytes);
            info!("NvsConfigStore: config saved (simulation)");
            Ok(())
        }

        #[cfg(target_os = "espidf")]
        {
            let result = Self::with_nvs_handle(true, |handle| {
                let key_cstr = b"loggercfg\0";
                let ret = unsafe {
                    nvs_set_blob(
                        handle,
                        key_cstr.as_ptr() as *const _,
                        bytes.as_ptr() as *const _,
                        bytes.len(),
                    )
                };
                if ret != ESP_OK {
                    return Err(ret);
                }
                let ret = unsafe { nvs_commit(handle) };
                if ret != ESP_OK {
                    return Err(ret);
                }
                Ok(())
            });
            match result {
                Ok(()) => {
                    info!("NvsConfigStore: config saved to NVS ({} bytes)", bytes.len());
                    Ok(())
                }
                Err(e) => {
                    warn!("NvsConfigStore: NVS write error {}", e);
                    Err(ConfigError::IoError)
                }
            }
        }
    }
}
