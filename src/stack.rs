/// One logical network packet as a chain of contiguous segments.
///
/// The stack owns the backing storage. A freshly allocated chain exposes its capacity
/// through [Self::segments_mut]; a filled chain exposes its contents through
/// [Self::segments]. Segment lengths sum to [Self::total_len] in both views.
pub trait PacketChain {
    /// Total payload length across all segments.
    fn total_len(&self) -> usize;

    /// The filled segments, in packet order.
    fn segments(&self) -> impl Iterator<Item = &[u8]> + '_;

    /// The segment storage, in packet order, for filling a freshly allocated chain.
    fn segments_mut(&mut self) -> impl Iterator<Item = &mut [u8]> + '_;
}

/// The slice of the network stack this adapter talks to: a fixed-size buffer pool and the
/// input entry point frames are handed to.
///
/// Allocation and free may be called from either execution context, so implementations must
/// make the pool itself safe for that; the bus guard does not cover it.
pub trait NetStack {
    type Chain: PacketChain;

    /// Allocate a chain with `len` bytes of capacity from the pool.
    ///
    /// `None` when the pool is exhausted. That is back-pressure, not a fault: the caller
    /// drops the frame and the stack recovers on its own clock.
    fn allocate(&self, len: usize) -> Option<Self::Chain>;

    /// Hand a received chain to the stack.
    ///
    /// On failure the chain comes back to the caller, which is then responsible for
    /// releasing it.
    fn input(&self, chain: Self::Chain) -> Result<(), Self::Chain>;

    /// Release a chain back to the pool.
    fn free(&self, chain: Self::Chain);
}
