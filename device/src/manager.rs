//! Host-to-device buffer bookkeeping for one task graph.
//!
//! Every host buffer a graph touches gets a slot. A slot holds the current
//! host buffer, its device allocation (allocated lazily) and the host version
//! that was last known to match device memory. Rebinding a slot to another
//! host buffer keeps the slot id, so tasks that refer to the slot pick up the
//! replacement without being rebuilt.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use snafu::{OptionExt, ensure};
use tracing::{debug, trace};

use crate::buffer::DeviceAllocation;
use crate::device::Device;
use crate::error::{IncompatibleReferenceSnafu, NotAllocatedSnafu, Result, UnboundBufferSnafu};
use crate::host::{AnyHostBuffer, HostBufferId};
use crate::kernel::LaunchArg;

/// Stable handle to a bound buffer within one manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(usize);

impl SlotId {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot{}", self.0)
    }
}

#[derive(Debug)]
struct Slot {
    host: Arc<dyn AnyHostBuffer>,
    allocation: Option<DeviceAllocation>,
    /// Host version matching device memory; `None` when device memory is
    /// fresh or belongs to a previous binding.
    synced_version: Option<u64>,
}

#[derive(Debug)]
pub struct DeviceBufferManager {
    device: Arc<dyn Device>,
    slots: Vec<Slot>,
    by_host: HashMap<HostBufferId, SlotId>,
}

impl DeviceBufferManager {
    pub fn new(device: Arc<dyn Device>) -> Self {
        Self { device, slots: Vec::new(), by_host: HashMap::new() }
    }

    pub fn device(&self) -> &Arc<dyn Device> {
        &self.device
    }

    /// Slot for `host`, creating one on first use.
    pub fn bind(&mut self, host: Arc<dyn AnyHostBuffer>) -> SlotId {
        if let Some(&slot) = self.by_host.get(&host.id()) {
            return slot;
        }

        let slot = SlotId(self.slots.len());
        trace!(buffer.id = %host.id(), %slot, dtype = %host.dtype(), len = host.len(), "binding host buffer");
        self.by_host.insert(host.id(), slot);
        self.slots.push(Slot { host, allocation: None, synced_version: None });
        slot
    }

    pub fn slot_of(&self, host: HostBufferId) -> Option<SlotId> {
        self.by_host.get(&host).copied()
    }

    /// Number of slots ever created.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn host(&self, slot: SlotId) -> &Arc<dyn AnyHostBuffer> {
        &self.slots[slot.0].host
    }

    pub fn allocation(&self, slot: SlotId) -> Option<&DeviceAllocation> {
        self.slots[slot.0].allocation.as_ref()
    }

    pub fn is_allocated(&self, slot: SlotId) -> bool {
        self.allocation(slot).is_some_and(DeviceAllocation::is_allocated)
    }

    /// Allocate device memory for the slot if it has none. Returns `true` if
    /// memory was allocated by this call.
    pub fn ensure_allocated(&mut self, slot: SlotId) -> Result<bool> {
        let entry = &mut self.slots[slot.0];
        if entry.allocation.as_ref().is_some_and(DeviceAllocation::is_allocated) {
            return Ok(false);
        }

        let allocation = self.device.allocate(entry.host.dtype(), entry.host.len())?;
        debug!(buffer.id = %entry.host.id(), %slot, bytes = allocation.size(), "allocated device buffer");
        entry.allocation = Some(allocation);
        entry.synced_version = None;
        Ok(true)
    }

    /// True if device memory is missing or older than the host content.
    pub fn needs_copy_in(&self, slot: SlotId) -> bool {
        let entry = &self.slots[slot.0];
        let allocated = entry.allocation.as_ref().is_some_and(DeviceAllocation::is_allocated);
        !allocated || entry.synced_version != Some(entry.host.version())
    }

    /// Copy host content to the device, allocating first if needed.
    pub fn copy_in(&mut self, slot: SlotId) -> Result<()> {
        self.ensure_allocated(slot)?;

        let entry = &mut self.slots[slot.0];
        let allocation = entry.allocation.as_ref().context(NotAllocatedSnafu)?;
        let version = entry.host.version();
        let mut result = Ok(());
        entry.host.with_bytes(&mut |bytes: &[u8]| result = self.device.copy_host_to_device(bytes, allocation));
        result?;

        trace!(buffer.id = %entry.host.id(), %slot, version, "copied to device");
        entry.synced_version = Some(version);
        Ok(())
    }

    /// Copy device content back into the bound host buffer.
    pub fn copy_out(&mut self, slot: SlotId) -> Result<()> {
        let entry = &mut self.slots[slot.0];
        let allocation = entry.allocation.as_ref().context(NotAllocatedSnafu)?;
        let mut result = Ok(());
        let version =
            entry.host.with_bytes_mut(&mut |bytes: &mut [u8]| result = self.device.copy_device_to_host(allocation, bytes));
        result?;

        trace!(buffer.id = %entry.host.id(), %slot, version, "copied to host");
        entry.synced_version = Some(version);
        Ok(())
    }

    /// Replace the host buffer bound under `old` with `new`.
    ///
    /// The slot keeps its id. Device memory is kept when the byte size is
    /// unchanged and released otherwise; either way the next input transfer
    /// copies the new content.
    pub fn update_reference(&mut self, old: HostBufferId, new: Arc<dyn AnyHostBuffer>) -> Result<SlotId> {
        let slot = self.slot_of(old).context(UnboundBufferSnafu { buffer: old })?;
        let current = &self.slots[slot.0].host;

        if new.id() != old {
            ensure!(
                !self.by_host.contains_key(&new.id()),
                IncompatibleReferenceSnafu { reason: format!("buffer {} is already bound to another slot", new.id()) }
            );
        }
        ensure!(
            new.dtype() == current.dtype(),
            IncompatibleReferenceSnafu {
                reason: format!("element type {} does not match bound type {}", new.dtype(), current.dtype())
            }
        );

        let entry = &mut self.slots[slot.0];
        let resized = new.byte_len() != entry.host.byte_len();
        if resized && let Some(mut allocation) = entry.allocation.take() {
            allocation.release();
        }
        debug!(old = %old, new = %new.id(), %slot, resized, "rebinding slot");

        entry.host = new;
        entry.synced_version = None;
        self.by_host.remove(&old);
        self.by_host.insert(entry.host.id(), slot);
        Ok(slot)
    }

    /// Launch argument for a bound slot.
    pub fn launch_arg(&self, slot: SlotId) -> Result<LaunchArg<'_>> {
        let allocation = self.allocation(slot).context(NotAllocatedSnafu)?;
        Ok(LaunchArg::Buffer(allocation))
    }

    /// Free the slot's device memory. The binding stays.
    pub fn release(&mut self, slot: SlotId) {
        if let Some(mut allocation) = self.slots[slot.0].allocation.take() {
            allocation.release();
        }
        self.slots[slot.0].synced_version = None;
    }

    pub fn release_all(&mut self) {
        for index in 0..self.slots.len() {
            self.release(SlotId(index));
        }
    }
}

impl Drop for DeviceBufferManager {
    fn drop(&mut self) {
        self.release_all();
    }
}
