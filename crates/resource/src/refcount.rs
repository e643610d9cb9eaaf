use arbor_device::GraphicsDevice;

/// Shared reference count. Starts at 1 and never goes below 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefCount(u32);

impl Default for RefCount {
    fn default() -> Self {
        Self(1)
    }
}

impl RefCount {
    pub fn get(&self) -> u32 {
        self.0
    }

    pub fn increment(&mut self) -> u32 {
        self.0 += 1;
        self.0
    }

    pub fn decrement(&mut self) -> u32 {
        self.0 = self.0.saturating_sub(1);
        self.0
    }
}

/// A GPU-bound object shared between owners.
///
/// Owners call [`Resource::increment`] when adopting a reference and
/// [`Resource::close`] when dropping it. Only the last close releases the
/// device handles.
pub trait Resource {
    fn refs(&self) -> &RefCount;
    fn refs_mut(&mut self) -> &mut RefCount;

    /// Delete every device handle this resource currently holds.
    ///
    /// Handles are taken out as they are deleted, so a second call is a no-op.
    fn release(&mut self, device: &mut dyn GraphicsDevice);

    /// Reset bookkeeping to a freshly constructed state. Data is kept.
    fn initialize(&mut self);

    fn increment(&mut self) -> u32 {
        self.refs_mut().increment()
    }

    /// Drop one reference. Returns true when this was the last one and the
    /// device handles were released.
    fn close(&mut self, device: &mut dyn GraphicsDevice) -> bool {
        if self.refs().get() > 1 {
            self.refs_mut().decrement();
            return false;
        }
        self.refs_mut().decrement();
        self.release(device);
        self.initialize();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_one() {
        assert_eq!(RefCount::default().get(), 1);
    }

    #[test]
    fn never_below_zero() {
        let mut rc = RefCount::default();
        rc.decrement();
        assert_eq!(rc.decrement(), 0);
    }
}
