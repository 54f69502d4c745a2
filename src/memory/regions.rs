//! Named shared memory region: create-or-open, map, unmap, close

use std::{
    fs::{File, OpenOptions},
    io::ErrorKind,
    os::unix::fs::OpenOptionsExt,
    ptr::NonNull,
    time::{Duration, Instant},
};

use memmap2::{MmapMut, MmapOptions};
use nix::{
    errno::Errno,
    fcntl::OFlag,
    sys::{
        mman::{shm_open, shm_unlink},
        stat::Mode,
    },
};

use crate::error::{BridgeError, Result};

use super::config::{BackingType, RegionConfig};

/// Whether this process created the backing object or found it existing
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum OpenMode {
    Created,
    Attached,
}

/// A mapped view of a named shared memory object.
///
/// Dropping the region unmaps the view and then closes the descriptor. The
/// contents and the name are left alone; see [`SharedMemoryRegion::remove`].
#[derive(Debug)]
pub struct SharedMemoryRegion {
    name: String,
    backing_type: BackingType,
    size: usize,
    open_mode: OpenMode,
    /// Memory-mapped view (dropped before the file)
    mmap: MmapMut,
    /// Descriptor for named backings
    _file: Option<File>,
}

impl SharedMemoryRegion {
    /// Create the named object with exactly `size` bytes, or open it if
    /// another process already created it.
    ///
    /// Creation is exclusive, so of two concurrent callers exactly one gets
    /// [`OpenMode::Created`]. An attacher waits up to
    /// `config.attach_timeout` for the creator to size the object.
    pub fn create_or_open(config: &RegionConfig, size: usize) -> Result<Self> {
        config.validate()?;
        if size == 0 {
            return Err(BridgeError::invalid_parameter(
                "size",
                "Region size must be greater than 0",
            ));
        }

        let (file, open_mode) = match config.backing_type {
            BackingType::PosixShm => Self::open_posix(config, size)?,
            BackingType::FileBacked => Self::open_file(config, size)?,
            BackingType::Anonymous => {
                let mmap = MmapOptions::new()
                    .len(size)
                    .map_anon()
                    .map_err(|e| BridgeError::mapping(format!("anonymous map failed: {}", e)))?;
                return Ok(Self {
                    name: config.name.clone(),
                    backing_type: config.backing_type,
                    size,
                    open_mode: OpenMode::Created,
                    mmap,
                    _file: None,
                });
            }
        };

        if open_mode == OpenMode::Attached {
            Self::wait_for_size(&file, size, config)?;
        }

        // On failure `file` is dropped here, releasing the descriptor.
        let mmap = Self::map(&file, size)?;

        log::debug!(
            "{} {} region '{}' ({} bytes)",
            match open_mode {
                OpenMode::Created => "created",
                OpenMode::Attached => "attached to",
            },
            config.backing_type.name(),
            config.name,
            size
        );

        Ok(Self {
            name: config.name.clone(),
            backing_type: config.backing_type,
            size,
            open_mode,
            mmap,
            _file: Some(file),
        })
    }

    fn open_posix(config: &RegionConfig, size: usize) -> Result<(File, OpenMode)> {
        let shm_name = config.shm_name();
        let mode = Mode::from_bits_truncate(config.permissions as libc::mode_t);

        match shm_open(
            shm_name.as_str(),
            OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR,
            mode,
        ) {
            Ok(fd) => {
                let file = File::from(fd);
                if let Err(e) = file.set_len(size as u64) {
                    let _ = shm_unlink(shm_name.as_str());
                    return Err(BridgeError::from_io(e, "Failed to size shared memory object"));
                }
                Ok((file, OpenMode::Created))
            }
            Err(Errno::EEXIST) => {
                let fd = shm_open(shm_name.as_str(), OFlag::O_RDWR, Mode::empty()).map_err(|e| {
                    BridgeError::from_io(e.into(), "Failed to open shared memory object")
                })?;
                Ok((File::from(fd), OpenMode::Attached))
            }
            Err(e) => Err(BridgeError::from_io(
                e.into(),
                "Failed to create shared memory object",
            )),
        }
    }

    fn open_file(config: &RegionConfig, size: usize) -> Result<(File, OpenMode)> {
        let path = config.default_file_path();

        match OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .mode(config.permissions)
            .open(&path)
        {
            Ok(file) => {
                if let Err(e) = file.set_len(size as u64) {
                    let _ = std::fs::remove_file(&path);
                    return Err(BridgeError::from_io(e, "Failed to set file size"));
                }
                Ok((file, OpenMode::Created))
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                let file = OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(&path)
                    .map_err(|e| BridgeError::from_io(e, "Failed to open existing file"))?;
                Ok((file, OpenMode::Attached))
            }
            Err(e) => Err(BridgeError::from_io(e, "Failed to create file")),
        }
    }

    /// The creator sizes the object right after creating it; an attacher
    /// that raced it may briefly see a zero-length object.
    fn wait_for_size(file: &File, size: usize, config: &RegionConfig) -> Result<()> {
        let start = Instant::now();
        loop {
            let len = file
                .metadata()
                .map_err(|e| BridgeError::from_io(e, "Failed to stat shared memory object"))?
                .len();

            if len == size as u64 {
                return Ok(());
            }
            if len != 0 {
                return Err(BridgeError::layout_mismatch("total_size", size as u64, len));
            }
            if start.elapsed() >= config.attach_timeout {
                return Err(BridgeError::region_not_ready(
                    &config.name,
                    start.elapsed().as_millis() as u64,
                ));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
    }

    fn map(file: &File, size: usize) -> Result<MmapMut> {
        // SAFETY: the object is sized to `size`; concurrent modification by
        // the peer is the point of the mapping and is mediated by atomics.
        unsafe {
            MmapOptions::new()
                .len(size)
                .map_mut(file)
                .map_err(|e| BridgeError::mapping(format!("Failed to map view: {}", e)))
        }
    }

    /// Unlink the named object so the next open creates a fresh one.
    ///
    /// Existing mappings stay valid until they are dropped. Returns `false`
    /// if there was nothing to remove.
    pub fn remove(config: &RegionConfig) -> Result<bool> {
        config.validate()?;
        match config.backing_type {
            BackingType::PosixShm => match shm_unlink(config.shm_name().as_str()) {
                Ok(()) => Ok(true),
                Err(Errno::ENOENT) => Ok(false),
                Err(e) => Err(BridgeError::from_io(
                    e.into(),
                    "Failed to unlink shared memory object",
                )),
            },
            BackingType::FileBacked => match std::fs::remove_file(config.default_file_path()) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                Err(e) => Err(BridgeError::from_io(e, "Failed to remove backing file")),
            },
            BackingType::Anonymous => Ok(false),
        }
    }

    /// Base address of the mapped view
    pub fn base_ptr(&self) -> NonNull<u8> {
        // A successful mapping is never null.
        NonNull::new(self.mmap.as_ptr() as *mut u8).unwrap_or(NonNull::dangling())
    }

    /// Get the size of the region
    pub fn size(&self) -> usize {
        self.size
    }

    /// Get the name of the region
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backing_type(&self) -> BackingType {
        self.backing_type
    }

    pub fn open_mode(&self) -> OpenMode {
        self.open_mode
    }

    /// Check if this process created the backing object
    pub fn is_creator(&self) -> bool {
        self.open_mode == OpenMode::Created
    }
}

impl Drop for SharedMemoryRegion {
    fn drop(&mut self) {
        log::debug!("unmapping region '{}'", self.name);
    }
}

unsafe impl Send for SharedMemoryRegion {}
unsafe impl Sync for SharedMemoryRegion {}
