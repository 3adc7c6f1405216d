//! File-backed device id with race-free first creation.
//!
//! The id lives as raw bytes in a single file: no framing, no trailing
//! newline. It is written once and never overwritten. First creation goes
//! through a temp file in the same directory that is hard-linked onto the
//! target, so a reader never sees a partially written id and concurrent
//! creators converge on whichever link landed first.
//!
//! Filesystems without hard links fall back to an exclusive create followed
//! by a write; readers treat an empty file as not yet written.

use crate::credential::Credential;
use crate::ApigateError;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;
use uuid::Uuid;

/// How long a reader waits for an empty device id file to be filled in.
const SETTLE_ATTEMPTS: u32 = 50;
const SETTLE_DELAY: Duration = Duration::from_millis(2);

/// Resolves and persists the device id.
#[derive(Debug, Clone)]
pub struct DeviceIdStore {
    path: PathBuf,
}

impl DeviceIdStore {
    /// Store backed by the file at `path`. Nothing is touched until the
    /// first resolve.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Path of the device id file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Device id to sign with.
    ///
    /// A non-empty `credential.device_id` wins without any file I/O.
    /// Otherwise the file is read, or created with a fresh id if missing.
    ///
    /// File contents are returned as-is, trailing whitespace included. They
    /// must be UTF-8 since the id is signed and sent as text; other bytes are
    /// a `Storage` error rather than passed through.
    pub fn resolve(&self, credential: &Credential) -> Result<String, ApigateError> {
        if !credential.device_id.is_empty() {
            return Ok(credential.device_id.clone());
        }
        self.load_or_create()
    }

    /// Read the persisted id, generating and persisting one if the file is
    /// missing.
    pub fn load_or_create(&self) -> Result<String, ApigateError> {
        match self.read_settled()? {
            Some(id) => Ok(id),
            None => self.create(),
        }
    }

    /// Read the file verbatim. `None` if it does not exist.
    fn read(&self) -> Result<Option<String>, ApigateError> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(ApigateError::storage(
                    &self.path,
                    format!("Failed to read device id file: {}", e),
                ))
            }
        };

        String::from_utf8(bytes).map(Some).map_err(|e| {
            ApigateError::storage(&self.path, format!("Device id file is not UTF-8: {}", e))
        })
    }

    /// Like `read`, but an empty file is an id still being written by
    /// `create_exclusive`: wait for it, then give up.
    fn read_settled(&self) -> Result<Option<String>, ApigateError> {
        for _ in 0..SETTLE_ATTEMPTS {
            match self.read()? {
                Some(id) if id.is_empty() => thread::sleep(SETTLE_DELAY),
                other => return Ok(other),
            }
        }
        Err(ApigateError::storage(&self.path, "Device id file is empty"))
    }

    fn create(&self) -> Result<String, ApigateError> {
        let device_id = generate_device_id();
        let temp_path = self.temp_path();

        if let Err(e) = fs::write(&temp_path, device_id.as_bytes()) {
            let _ = fs::remove_file(&temp_path);
            return Err(ApigateError::storage(
                &self.path,
                format!("Failed to write device id file: {}", e),
            ));
        }

        // Publish only if nobody else did.
        let linked = fs::hard_link(&temp_path, &self.path);
        let _ = fs::remove_file(&temp_path);

        match linked {
            Ok(()) => Ok(device_id),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => self.read_existing(),
            // link(2) reports EPERM on filesystems without hard links (vfat, exFAT).
            Err(e) if matches!(e.kind(), ErrorKind::Unsupported | ErrorKind::PermissionDenied) => {
                self.create_exclusive(&device_id)
            }
            Err(e) => Err(ApigateError::storage(
                &self.path,
                format!("Failed to create device id file: {}", e),
            )),
        }
    }

    /// Fallback for filesystems without hard links: exclusive create, then
    /// write in place. Readers wait out the empty window in `read_settled`.
    fn create_exclusive(&self, device_id: &str) -> Result<String, ApigateError> {
        let mut file = match fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => return self.read_existing(),
            Err(e) => {
                return Err(ApigateError::storage(
                    &self.path,
                    format!("Failed to create device id file: {}", e),
                ))
            }
        };

        if let Err(e) = file.write_all(device_id.as_bytes()) {
            drop(file);
            let _ = fs::remove_file(&self.path);
            return Err(ApigateError::storage(
                &self.path,
                format!("Failed to write device id file: {}", e),
            ));
        }
        Ok(device_id.to_string())
    }

    /// Another writer created the file first; use its id.
    fn read_existing(&self) -> Result<String, ApigateError> {
        self.read_settled()?.ok_or_else(|| {
            ApigateError::storage(&self.path, "Device id file vanished after creation")
        })
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "device_id".to_string());
        let temp_name = format!(".{}.{}.tmp", name, Uuid::new_v4().simple());
        match self.path.parent() {
            Some(parent) => parent.join(temp_name),
            None => PathBuf::from(temp_name),
        }
    }
}

/// Time-ordered unique id in hyphenated form.
pub fn generate_device_id() -> String {
    Uuid::now_v7().to_string()
}
