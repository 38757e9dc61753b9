/// Kernel launch geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LaunchConfig {
    /// Global work size (total number of work items per dimension).
    pub global_size: [usize; 3],
    /// Local work size (work group size per dimension).
    pub local_size: [usize; 3],
}

impl LaunchConfig {
    pub fn new_1d(global: usize, local: usize) -> Self {
        Self { global_size: [global, 1, 1], local_size: [local, 1, 1] }
    }

    pub fn new_2d(global: [usize; 2], local: [usize; 2]) -> Self {
        Self { global_size: [global[0], global[1], 1], local_size: [local[0], local[1], 1] }
    }

    pub fn new_3d(global: [usize; 3], local: [usize; 3]) -> Self {
        Self { global_size: global, local_size: local }
    }

    /// Total number of work items.
    pub fn work_items(&self) -> usize {
        self.global_size.iter().product()
    }

    /// Number of work groups per dimension, rounding partial groups up.
    pub fn groups(&self) -> [usize; 3] {
        std::array::from_fn(|d| self.global_size[d].div_ceil(self.local_size[d].max(1)))
    }
}

impl Default for LaunchConfig {
    fn default() -> Self {
        Self { global_size: [1, 1, 1], local_size: [1, 1, 1] }
    }
}
