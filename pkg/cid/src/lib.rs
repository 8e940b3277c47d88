//! Vsock CID allocation.
//!
//! Guest vsock CIDs are handed out of a fixed range
//! `[CID_BASE, CID_BASE + CID_CAPACITY)`. One bit per CID tracks whether
//! it is free; allocation and release are mutex-serialized.

use std::sync::{Mutex, OnceLock};

use civ_constants::vsock::{CID_BASE, CID_CAPACITY};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CidError {
    #[error("no free vsock CID available in [{CID_BASE}, {})", CID_BASE + CID_CAPACITY)]
    Exhausted,
    #[error("cid {0} is outside the allocator's range [{CID_BASE}, {})", CID_BASE + CID_CAPACITY)]
    OutOfRange(u32),
    #[error("cid {0} is already allocated")]
    AlreadyAllocated(u32),
}

/// A fixed-range pool of vsock CIDs, free bits tracked with a bool vec.
pub struct CidPool {
    free: Mutex<Vec<bool>>,
}

impl CidPool {
    pub fn new() -> Self {
        CidPool {
            free: Mutex::new(vec![true; CID_CAPACITY as usize]),
        }
    }

    /// Allocate the lowest-numbered free CID.
    pub fn acquire(&self) -> Result<u32, CidError> {
        let mut free = self.free.lock().expect("cid pool mutex poisoned");
        let pos = free.iter().position(|&is_free| is_free).ok_or(CidError::Exhausted)?;
        free[pos] = false;
        Ok(CID_BASE + pos as u32)
    }

    /// Allocate a specific CID, failing if it is out of range or taken.
    pub fn acquire_specific(&self, cid: u32) -> Result<u32, CidError> {
        let idx = self.index_of(cid)?;
        let mut free = self.free.lock().expect("cid pool mutex poisoned");
        if !free[idx] {
            return Err(CidError::AlreadyAllocated(cid));
        }
        free[idx] = false;
        Ok(cid)
    }

    /// Return a CID to the pool. No-op (returns `Ok`) if it was already free.
    pub fn release(&self, cid: u32) -> Result<(), CidError> {
        let idx = self.index_of(cid)?;
        let mut free = self.free.lock().expect("cid pool mutex poisoned");
        free[idx] = true;
        Ok(())
    }

    fn index_of(&self, cid: u32) -> Result<usize, CidError> {
        if cid < CID_BASE || cid >= CID_BASE + CID_CAPACITY {
            return Err(CidError::OutOfRange(cid));
        }
        Ok((cid - CID_BASE) as usize)
    }
}

impl Default for CidPool {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_POOL: OnceLock<CidPool> = OnceLock::new();

/// The process-wide CID pool, lazily initialized on first use.
pub fn global() -> &'static CidPool {
    GLOBAL_POOL.get_or_init(CidPool::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquires_lowest_free_cid_first() {
        let pool = CidPool::new();
        assert_eq!(pool.acquire().unwrap(), CID_BASE);
        assert_eq!(pool.acquire().unwrap(), CID_BASE + 1);
    }

    #[test]
    fn release_makes_a_cid_available_again() {
        let pool = CidPool::new();
        let cid = pool.acquire().unwrap();
        pool.release(cid).unwrap();
        assert_eq!(pool.acquire().unwrap(), cid);
    }

    #[test]
    fn acquire_specific_rejects_an_already_allocated_cid() {
        let pool = CidPool::new();
        let cid = pool.acquire().unwrap();
        assert_eq!(
            pool.acquire_specific(cid),
            Err(CidError::AlreadyAllocated(cid))
        );
    }

    #[test]
    fn acquire_specific_rejects_out_of_range_cids() {
        let pool = CidPool::new();
        assert_eq!(
            pool.acquire_specific(CID_BASE - 1),
            Err(CidError::OutOfRange(CID_BASE - 1))
        );
        assert_eq!(
            pool.acquire_specific(CID_BASE + CID_CAPACITY),
            Err(CidError::OutOfRange(CID_BASE + CID_CAPACITY))
        );
    }

    #[test]
    fn exhausts_after_capacity_allocations() {
        let pool = CidPool::new();
        for _ in 0..CID_CAPACITY {
            pool.acquire().unwrap();
        }
        assert_eq!(pool.acquire(), Err(CidError::Exhausted));
    }
}
