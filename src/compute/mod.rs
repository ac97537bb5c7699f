//! Data-parallel kernel dispatch.
//!
//! Both simulators express their inner loops as kernels over flat work-item
//! arrays: one waveguide step is a dispatch over all mesh nodes, one
//! ray-tracer depth layer is a dispatch over all rays. The
//! [`ComputeContext`] trait is the seam between that kernel shape and the
//! machinery that runs it; [`CpuContext`] is the built-in implementation on
//! a rayon thread pool.

use rayon::prelude::*;

use crate::error::Result;

/// Executes data-parallel kernels.
///
/// Implementations must run the kernel for every work item exactly once and
/// must not reorder observable writes within one dispatch; there is an
/// implicit barrier at the end of each call.
pub trait ComputeContext: Send + Sync {
    /// Runs `kernel(i)` for every `i in 0..out.len()`, writing one result
    /// per work item.
    fn dispatch<R, K>(&self, out: &mut [R], kernel: K) -> Result<()>
    where
        R: Send,
        K: Fn(usize) -> R + Send + Sync;

    /// Runs `kernel(i, &mut items[i])` for every work item in place.
    fn dispatch_mut<T, K>(&self, items: &mut [T], kernel: K) -> Result<()>
    where
        T: Send,
        K: Fn(usize, &mut T) + Send + Sync;
}

/// Kernel execution on the host CPU via rayon's global thread pool.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuContext;

impl CpuContext {
    pub fn new() -> Self {
        Self
    }
}

impl ComputeContext for CpuContext {
    fn dispatch<R, K>(&self, out: &mut [R], kernel: K) -> Result<()>
    where
        R: Send,
        K: Fn(usize) -> R + Send + Sync,
    {
        out.par_iter_mut()
            .enumerate()
            .for_each(|(i, slot)| *slot = kernel(i));
        Ok(())
    }

    fn dispatch_mut<T, K>(&self, items: &mut [T], kernel: K) -> Result<()>
    where
        T: Send,
        K: Fn(usize, &mut T) + Send + Sync,
    {
        items
            .par_iter_mut()
            .enumerate()
            .for_each(|(i, item)| kernel(i, item));
        Ok(())
    }
}
