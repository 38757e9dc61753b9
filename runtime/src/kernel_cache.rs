//! Compiled-program cache shared by every graph on one device.
//!
//! Keys are `(kernel id, device)`. Kernel ids are process-unique, so two
//! graphs that launch the same `Arc<Kernel>` share one compiled program.
//! Uses papaya's lock-free map; a compile that loses an insertion race is
//! discarded in favour of the program already stored.

use std::sync::Arc;

use papaya::{Compute, HashMap, Operation};
use tessera_device::{KernelId, Program};
use tessera_dtype::DeviceSpec;

type KernelKey = (KernelId, DeviceSpec);

#[derive(Default)]
pub struct KernelCache {
    programs: HashMap<KernelKey, Arc<dyn Program>>,
}

impl KernelCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached program for `(kernel, device)`, compiling it on first use.
    pub fn get_or_compile<F, E>(&self, kernel: KernelId, device: &DeviceSpec, compile_fn: F) -> Result<Arc<dyn Program>, E>
    where
        F: FnOnce() -> Result<Arc<dyn Program>, E>,
    {
        let key = (kernel, device.clone());
        let guard = self.programs.guard();

        // Fast path: program already cached
        if let Some(program) = self.programs.get(&key, &guard) {
            return Ok(Arc::clone(program));
        }

        let compiled = compile_fn()?;
        match self.programs.compute(
            key,
            |entry| match entry {
                Some((_, existing)) => Operation::Abort(Arc::clone(existing)),
                None => Operation::Insert(Arc::clone(&compiled)),
            },
            &guard,
        ) {
            Compute::Inserted(_, program) => Ok(Arc::clone(program)),
            Compute::Aborted(program) => Ok(program),
            _ => Ok(compiled),
        }
    }

    pub fn contains(&self, kernel: KernelId, device: &DeviceSpec) -> bool {
        self.programs.pin().contains_key(&(kernel, device.clone()))
    }

    pub fn len(&self) -> usize {
        self.programs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn clear(&self) {
        self.programs.pin().clear();
    }
}

impl std::fmt::Debug for KernelCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KernelCache").field("len", &self.len()).finish()
    }
}
