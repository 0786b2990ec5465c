//! Backing files for cached nodes.
//!
//! A `BlockFile` is a flat, byte-addressed space with a bump allocator:
//! new objects are placed at the current end of file. Space is never
//! reclaimed here; reuse of old storage is the caller's business.

use blink_common::{Address, AddressWidth, BlinkError, FileConfig, Result};
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

/// Signature written at address 0 of every file. Keeps real objects away
/// from address 0.
pub const FILE_SIGNATURE: [u8; 8] = *b"\x89BLINK\r\n";

/// Byte-addressed backing storage.
pub trait BlockFile: Send + Sync {
    /// Reserves `size` bytes at the end of the file and returns their address.
    fn allocate(&self, size: usize) -> Result<Address>;

    /// Reads `buf.len()` bytes starting at `addr`.
    fn read_at(&self, addr: Address, buf: &mut [u8]) -> Result<()>;

    /// Writes `data` starting at `addr`. The range must already be allocated.
    fn write_at(&self, addr: Address, data: &[u8]) -> Result<()>;

    /// Forces written data to stable storage.
    fn sync(&self) -> Result<()>;

    /// Current end-of-file address.
    fn len(&self) -> u64;

    /// Width of addresses stored in this file.
    fn address_width(&self) -> AddressWidth;
}

impl<F: BlockFile + ?Sized> BlockFile for Box<F> {
    fn allocate(&self, size: usize) -> Result<Address> {
        (**self).allocate(size)
    }

    fn read_at(&self, addr: Address, buf: &mut [u8]) -> Result<()> {
        (**self).read_at(addr, buf)
    }

    fn write_at(&self, addr: Address, data: &[u8]) -> Result<()> {
        (**self).write_at(addr, data)
    }

    fn sync(&self) -> Result<()> {
        (**self).sync()
    }

    fn len(&self) -> u64 {
        (**self).len()
    }

    fn address_width(&self) -> AddressWidth {
        (**self).address_width()
    }
}

/// Opens the file described by `config`.
pub fn open_file(config: &FileConfig) -> Result<Box<dyn BlockFile>> {
    match &config.path {
        Some(path) => Ok(Box::new(DiskFile::open(
            path,
            config.address_width,
            config.fsync_enabled,
        )?)),
        None => Ok(Box::new(MemFile::new(config.address_width))),
    }
}

/// Checks that `[addr, addr + len)` lies inside `eof` and is defined.
fn check_range(addr: Address, len: usize, eof: u64) -> Result<u64> {
    if !addr.is_defined() {
        return Err(BlinkError::Storage("access through undefined address".to_string()));
    }
    let end = addr
        .offset()
        .checked_add(len as u64)
        .ok_or_else(|| BlinkError::Storage(format!("range at {addr} overflows")))?;
    if end > eof {
        return Err(BlinkError::Storage(format!(
            "range {addr}+{len} past end of file ({eof})"
        )));
    }
    Ok(end)
}

/// Next allocation address, checked against the address width.
fn bump(eof: u64, size: usize, width: AddressWidth) -> Result<(Address, u64)> {
    let end = eof + size as u64;
    if end > width.max_defined() {
        return Err(BlinkError::AddressOverflow {
            addr: end,
            width: width.bytes(),
        });
    }
    Ok((Address::new(eof), end))
}

/// In-memory file.
///
/// All bytes live in a single vector; addresses map directly to indices.
pub struct MemFile {
    width: AddressWidth,
    data: Mutex<Vec<u8>>,
}

impl MemFile {
    /// Creates an empty in-memory file.
    pub fn new(width: AddressWidth) -> Self {
        Self {
            width,
            data: Mutex::new(FILE_SIGNATURE.to_vec()),
        }
    }
}

impl BlockFile for MemFile {
    fn allocate(&self, size: usize) -> Result<Address> {
        let mut data = self.data.lock();
        let (addr, end) = bump(data.len() as u64, size, self.width)?;
        data.resize(end as usize, 0);
        Ok(addr)
    }

    fn read_at(&self, addr: Address, buf: &mut [u8]) -> Result<()> {
        let data = self.data.lock();
        let end = check_range(addr, buf.len(), data.len() as u64)? as usize;
        buf.copy_from_slice(&data[addr.offset() as usize..end]);
        Ok(())
    }

    fn write_at(&self, addr: Address, src: &[u8]) -> Result<()> {
        let mut data = self.data.lock();
        let end = check_range(addr, src.len(), data.len() as u64)? as usize;
        data[addr.offset() as usize..end].copy_from_slice(src);
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        Ok(())
    }

    fn len(&self) -> u64 {
        self.data.lock().len() as u64
    }

    fn address_width(&self) -> AddressWidth {
        self.width
    }
}

/// File on disk.
pub struct DiskFile {
    path: PathBuf,
    width: AddressWidth,
    fsync_enabled: bool,
    inner: Mutex<DiskInner>,
}

struct DiskInner {
    file: File,
    eof: u64,
}

impl DiskFile {
    /// Opens or creates the file at `path`.
    ///
    /// A new file gets the signature; an existing file must carry it.
    pub fn open(path: impl AsRef<Path>, width: AddressWidth, fsync_enabled: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;

        let eof = file.metadata()?.len();
        let eof = if eof == 0 {
            file.write_all(&FILE_SIGNATURE)?;
            if fsync_enabled {
                file.sync_all()?;
            }
            FILE_SIGNATURE.len() as u64
        } else {
            let mut sig = [0u8; FILE_SIGNATURE.len()];
            file.seek(SeekFrom::Start(0))?;
            file.read_exact(&mut sig)?;
            if sig != FILE_SIGNATURE {
                return Err(BlinkError::Storage(format!(
                    "{} is not a blink file",
                    path.display()
                )));
            }
            eof
        };

        Ok(Self {
            path,
            width,
            fsync_enabled,
            inner: Mutex::new(DiskInner { file, eof }),
        })
    }

    /// Returns the file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl BlockFile for DiskFile {
    fn allocate(&self, size: usize) -> Result<Address> {
        let mut inner = self.inner.lock();
        let (addr, end) = bump(inner.eof, size, self.width)?;
        inner.file.set_len(end)?;
        inner.eof = end;
        Ok(addr)
    }

    fn read_at(&self, addr: Address, buf: &mut [u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        check_range(addr, buf.len(), inner.eof)?;
        inner.file.seek(SeekFrom::Start(addr.offset()))?;
        inner.file.read_exact(buf)?;
        Ok(())
    }

    fn write_at(&self, addr: Address, data: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock();
        check_range(addr, data.len(), inner.eof)?;
        inner.file.seek(SeekFrom::Start(addr.offset()))?;
        inner.file.write_all(data)?;
        if self.fsync_enabled {
            inner.file.sync_all()?;
        }
        Ok(())
    }

    fn sync(&self) -> Result<()> {
        self.inner.lock().file.sync_all()?;
        Ok(())
    }

    fn len(&self) -> u64 {
        self.inner.lock().eof
    }

    fn address_width(&self) -> AddressWidth {
        self.width
    }
}

impl Drop for DiskFile {
    fn drop(&mut self) {
        let _ = self.inner.get_mut().file.sync_all();
    }
}
