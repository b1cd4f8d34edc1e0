//! Single-slot shared memory with seqlock publication.
//!
//! ## Layout
//!
//! ```text
//! offset 0  seq: u32 LE   odd = write in progress, even = committed
//! offset 4  len: u8       payload length of the committed write
//! offset 5  payload       `capacity` bytes
//! ```
//!
//! Every write replaces the whole payload. There is no queue and no history:
//! a second write before anyone reads loses the first one for good.

use crate::error::{ShmError, ShmResult};
use memmap2::{MmapMut, MmapOptions};
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicU32, Ordering, fence};
use tracing::{debug, info, warn};

/// Bytes of header preceding the payload.
pub const SLOT_HEADER_LEN: usize = 5;

/// Largest payload a slot can hold (length is a single byte).
pub const MAX_SLOT_CAPACITY: usize = u8::MAX as usize;

/// Read attempts before a read gives up on a busy writer.
const READ_RETRIES: usize = 16;

enum Backing {
    /// Stored as words so the sequence counter is 4-byte aligned.
    Heap(Vec<u32>),
    Mapped {
        map: MmapMut,
        path: PathBuf,
        remove_on_drop: bool,
    },
}

impl Backing {
    fn heap(total: usize) -> Self {
        Self::Heap(vec![0u32; total.div_ceil(4)])
    }

    fn as_ptr(&self) -> *const u8 {
        match self {
            Self::Heap(words) => words.as_ptr().cast(),
            Self::Mapped { map, .. } => map.as_ptr(),
        }
    }

    fn as_mut_ptr(&mut self) -> *mut u8 {
        match self {
            Self::Heap(words) => words.as_mut_ptr().cast(),
            Self::Mapped { map, .. } => map.as_mut_ptr(),
        }
    }
}

/// View the first header word as the shared sequence counter.
///
/// # Safety
/// `base` must point at a live slot buffer that is at least 4-byte aligned
/// and outlives `'a`. Heap buffers are `u32`-backed and mappings are
/// page-aligned, so every `Backing` satisfies this.
unsafe fn seq_at<'a>(base: *const u8) -> &'a AtomicU32 {
    // SAFETY: alignment and lifetime are guaranteed by the caller.
    unsafe { &*base.cast::<AtomicU32>() }
}

/// A fixed-size, last-write-wins byte slot.
///
/// Either heap-backed (in-process only) or backed by a memory-mapped file
/// that other processes can map to observe or replace the contents.
pub struct SharedSlot {
    name: String,
    capacity: usize,
    backing: Backing,
    writes: u64,
}

impl SharedSlot {
    /// Create an in-process slot.
    pub fn in_memory(name: &str, capacity: usize) -> ShmResult<Self> {
        validate_capacity(capacity)?;
        Ok(Self {
            name: name.to_string(),
            capacity,
            backing: Backing::heap(SLOT_HEADER_LEN + capacity),
            writes: 0,
        })
    }

    /// Create (or truncate) a file-backed slot at `path`.
    ///
    /// The file is zero-filled and removed again when the slot is dropped.
    pub fn create_mapped(name: &str, path: &Path, capacity: usize) -> ShmResult<Self> {
        validate_capacity(capacity)?;
        let total = SLOT_HEADER_LEN + capacity;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(total as u64)?;

        // SAFETY: the file was just sized to `total`; concurrent access from
        // other processes is mediated by the seqlock in the header.
        let mut map = unsafe { MmapOptions::new().len(total).map_mut(&file)? };
        map.fill(0);
        fence(Ordering::Release);

        info!("Created slot {} at {} ({} bytes)", name, path.display(), capacity);
        Ok(Self {
            name: name.to_string(),
            capacity,
            backing: Backing::Mapped {
                map,
                path: path.to_path_buf(),
                remove_on_drop: true,
            },
            writes: 0,
        })
    }

    /// Attach to a slot file created by another process.
    ///
    /// Capacity is derived from the file size. The file is left in place on drop.
    pub fn attach_mapped(name: &str, path: &Path) -> ShmResult<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let total = file.metadata()?.len() as usize;
        let capacity = total.saturating_sub(SLOT_HEADER_LEN);
        validate_capacity(capacity)?;

        // SAFETY: mapping covers exactly the current file length; see `create_mapped`.
        let map = unsafe { MmapOptions::new().len(total).map_mut(&file)? };

        debug!("Attached slot {} at {}", name, path.display());
        Ok(Self {
            name: name.to_string(),
            capacity,
            backing: Backing::Mapped {
                map,
                path: path.to_path_buf(),
                remove_on_drop: false,
            },
            writes: 0,
        })
    }

    /// Replace the slot contents with `payload`.
    ///
    /// # Errors
    /// Returns `ShmError::PayloadTooLarge` if `payload` exceeds the capacity;
    /// the previous contents are left untouched.
    pub fn write(&mut self, payload: &[u8]) -> ShmResult<()> {
        if payload.len() > self.capacity {
            return Err(ShmError::PayloadTooLarge {
                len: payload.len(),
                capacity: self.capacity,
            });
        }

        let base = self.backing.as_mut_ptr();
        // SAFETY: `base` comes from this slot's backing, which stays borrowed
        // for the rest of the call.
        let seq = unsafe { seq_at(base) };
        let begin = u32::from_le(seq.load(Ordering::Relaxed)).wrapping_add(1) | 1;
        seq.store(begin.to_le(), Ordering::Relaxed);
        fence(Ordering::Release);

        // SAFETY: `payload.len() <= capacity`, so the length byte and the
        // payload both fall inside the `SLOT_HEADER_LEN + capacity` buffer.
        unsafe {
            ptr::write_volatile(base.add(4), payload.len() as u8);
            ptr::copy_nonoverlapping(payload.as_ptr(), base.add(SLOT_HEADER_LEN), payload.len());
        }

        seq.store(begin.wrapping_add(1).to_le(), Ordering::Release);

        self.writes += 1;
        Ok(())
    }

    /// Copy the latest committed payload into `out`, returning its length.
    ///
    /// Reading never consumes the contents.
    ///
    /// # Errors
    /// - `ShmError::PayloadTooLarge` if `out` is shorter than the payload
    /// - `ShmError::Corrupt` if the header length exceeds the capacity
    /// - `ShmError::TornRead` if a writer kept the slot busy on every attempt
    pub fn read_into(&self, out: &mut [u8]) -> ShmResult<usize> {
        let base = self.backing.as_ptr();
        // SAFETY: see `write`.
        let seq = unsafe { seq_at(base) };
        for _ in 0..READ_RETRIES {
            let before = seq.load(Ordering::Acquire);
            if u32::from_le(before) & 1 == 1 {
                std::hint::spin_loop();
                continue;
            }

            // SAFETY: offset 4 lies inside the header.
            let len = unsafe { ptr::read_volatile(base.add(4)) } as usize;
            if len > self.capacity {
                return Err(ShmError::Corrupt {
                    name: self.name.clone(),
                    len,
                });
            }
            if len > out.len() {
                return Err(ShmError::PayloadTooLarge {
                    len,
                    capacity: out.len(),
                });
            }
            // SAFETY: `len` was checked against both the slot capacity and `out`.
            // A concurrent writer may change these bytes; the sequence check
            // below discards such a copy.
            unsafe {
                ptr::copy_nonoverlapping(base.add(SLOT_HEADER_LEN), out.as_mut_ptr(), len);
            }

            fence(Ordering::Acquire);
            if seq.load(Ordering::Relaxed) == before {
                return Ok(len);
            }
        }
        warn!("Slot {} busy for {} read attempts", self.name, READ_RETRIES);
        Err(ShmError::TornRead {
            name: self.name.clone(),
        })
    }

    /// Latest committed payload as an owned buffer.
    pub fn read(&self) -> ShmResult<Vec<u8>> {
        let mut out = vec![0u8; self.capacity];
        let len = self.read_into(&mut out)?;
        out.truncate(len);
        Ok(out)
    }

    /// Commit counter from the header; increases by 2 on every write.
    pub fn sequence(&self) -> u32 {
        // SAFETY: see `write`.
        let seq = unsafe { seq_at(self.backing.as_ptr()) };
        u32::from_le(seq.load(Ordering::Acquire))
    }

    /// Writes performed through this handle.
    pub fn writes(&self) -> u64 {
        self.writes
    }

    /// Slot name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Payload capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Backing file, if any.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::Heap(_) => None,
            Backing::Mapped { path, .. } => Some(path),
        }
    }
}

impl Drop for SharedSlot {
    fn drop(&mut self) {
        if let Backing::Mapped {
            path,
            remove_on_drop: true,
            ..
        } = &self.backing
        {
            if let Err(e) = std::fs::remove_file(path) {
                debug!("Failed to remove slot file {}: {}", path.display(), e);
            }
        }
    }
}

fn validate_capacity(capacity: usize) -> ShmResult<()> {
    if capacity == 0 || capacity > MAX_SLOT_CAPACITY {
        return Err(ShmError::InvalidSize {
            size: capacity,
            max: MAX_SLOT_CAPACITY,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_slot_reads_empty() {
        let slot = SharedSlot::in_memory("t", 10).unwrap();
        assert_eq!(slot.read().unwrap(), Vec::<u8>::new());
        assert_eq!(slot.sequence(), 0);
    }

    #[test]
    fn last_write_wins() {
        let mut slot = SharedSlot::in_memory("t", 10).unwrap();
        slot.write(&[1, 2, 3, 4, 5]).unwrap();
        slot.write(&[9, 8]).unwrap();
        assert_eq!(slot.read().unwrap(), vec![9, 8]);
        assert_eq!(slot.writes(), 2);
        assert_eq!(slot.sequence(), 4);
    }

    #[test]
    fn read_does_not_consume() {
        let mut slot = SharedSlot::in_memory("t", 4).unwrap();
        slot.write(&[7]).unwrap();
        assert_eq!(slot.read().unwrap(), vec![7]);
        assert_eq!(slot.read().unwrap(), vec![7]);
    }

    #[test]
    fn oversized_write_leaves_contents() {
        let mut slot = SharedSlot::in_memory("t", 2).unwrap();
        slot.write(&[1, 2]).unwrap();
        assert!(matches!(
            slot.write(&[1, 2, 3]),
            Err(ShmError::PayloadTooLarge { len: 3, capacity: 2 })
        ));
        assert_eq!(slot.read().unwrap(), vec![1, 2]);
    }

    #[test]
    fn heap_backing_is_word_aligned() {
        for capacity in [1, 3, 4, 255] {
            let slot = SharedSlot::in_memory("t", capacity).unwrap();
            assert_eq!(slot.backing.as_ptr() as usize % 4, 0);
            let mut out = vec![0u8; capacity];
            assert_eq!(slot.read_into(&mut out).unwrap(), 0);
        }
    }

    #[test]
    fn invalid_capacity_rejected() {
        assert!(SharedSlot::in_memory("t", 0).is_err());
        assert!(SharedSlot::in_memory("t", 256).is_err());
        assert!(SharedSlot::in_memory("t", 255).is_ok());
    }

    #[test]
    fn read_into_short_buffer_fails() {
        let mut slot = SharedSlot::in_memory("t", 8).unwrap();
        slot.write(&[0; 8]).unwrap();
        let mut out = [0u8; 4];
        assert!(matches!(
            slot.read_into(&mut out),
            Err(ShmError::PayloadTooLarge { .. })
        ));
    }
}
