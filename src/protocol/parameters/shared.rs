//! Store shared between the polling task and the housekeeping path.
//!
//! Fields that must be observed together (an address and its validity flag,
//! a write-once value and its lock) are accessed inside one `lock` call.
use core::cell::RefCell;

use embassy_sync::blocking_mutex::{raw::CriticalSectionRawMutex, Mutex};

use crate::error::SdoAbort;
use crate::infra::storage::NvStorage;
use crate::protocol::parameters::access::{Direction, ObjectAccess};
use crate::protocol::parameters::store::ParameterStore;

pub struct SharedParameters<'a, S: NvStorage, const N: usize> {
    inner: Mutex<CriticalSectionRawMutex, RefCell<ParameterStore<'a, S, N>>>,
}

impl<'a, S: NvStorage, const N: usize> SharedParameters<'a, S, N> {
    pub const fn new(store: ParameterStore<'a, S, N>) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(store)),
        }
    }

    /// Run `f` with exclusive access to the store, inside a critical section.
    pub fn lock<R>(&self, f: impl FnOnce(&mut ParameterStore<'a, S, N>) -> R) -> R {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()))
    }

    pub fn into_inner(self) -> ParameterStore<'a, S, N> {
        self.inner.into_inner().into_inner()
    }
}

impl<'a, S: NvStorage, const N: usize> ObjectAccess for &SharedParameters<'a, S, N> {
    fn access(
        &mut self,
        direction: Direction,
        index: u16,
        sub_index: u8,
        buffer: &mut [u8],
    ) -> Result<usize, SdoAbort> {
        self.lock(|store| store.access(direction, index, sub_index, buffer))
    }
}
