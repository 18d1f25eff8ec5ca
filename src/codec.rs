use crate::{BufferKind, NetStack, PacketChain, RadioDriver, ReceivedFrame, TxFrameBuffer};

/// Minimum Ethernet frame length the radio firmware will accept without complaint.
/// Shorter frames are padded up to this with zeros.
pub const MIN_FRAME_LEN: usize = 60;

/// Granularity the bus transfers buffers at. Frame buffer requests are rounded up to this.
pub const LEN_ALIGN: usize = 64;

/// Round `len` up to the next multiple of `align`.
pub const fn round_up(len: usize, align: usize) -> usize {
    len.div_ceil(align) * align
}

/// Zero padding needed to lift `total` to the minimum frame length.
pub const fn frame_padding(total: usize) -> usize {
    if total < MIN_FRAME_LEN {
        MIN_FRAME_LEN - total
    } else {
        0
    }
}

/// Copy a packet chain into a freshly allocated driver frame buffer.
///
/// The buffer is requested at `round_up(total + padding, LEN_ALIGN)` body bytes plus the
/// driver's request header. Segments land back to back at the start of the body; everything
/// from the end of the payload to the end of the rounded body is zeroed, which covers both
/// the minimum-frame padding and the rounding slack. Returns the filled buffer and the
/// length to transmit (`total + padding`), or `None` when the driver's allocator is
/// exhausted. The caller owns the buffer until it frees it back to the driver.
pub fn encode<D: RadioDriver>(
    driver: &mut D,
    chain: &impl PacketChain,
) -> Option<(D::TxBuffer, usize)> {
    let total = chain.total_len();
    let padding = frame_padding(total);
    let body_len = round_up(total + padding, LEN_ALIGN);

    let mut buffer = driver.allocate_buffer(BufferKind::TxFrame, body_len + D::FRAME_HEADER_LEN)?;
    let body = buffer.body_mut();

    let mut offset = 0;
    for segment in chain.segments() {
        body[offset..offset + segment.len()].copy_from_slice(segment);
        offset += segment.len();
    }
    debug_assert_eq!(offset, total);
    body[offset..body_len].fill(0);

    Some((buffer, total + padding))
}

/// Copy a received frame into a chain allocated from the stack's pool.
///
/// Zero-length deliveries are no-ops and consume nothing. `None` on pool exhaustion means
/// the frame is dropped; that is back-pressure, not a fault. The payload is copied segment
/// by segment, honoring each segment's capacity, starting past the firmware's alignment
/// padding.
pub fn decode<S: NetStack>(stack: &S, frame: &ReceivedFrame<'_>) -> Option<S::Chain> {
    if frame.len == 0 {
        return None;
    }
    let mut chain = stack.allocate(frame.len)?;

    let payload = frame.payload();
    let mut offset = 0;
    for segment in chain.segments_mut() {
        let take = segment.len().min(payload.len() - offset);
        segment[..take].copy_from_slice(&payload[offset..offset + take]);
        offset += take;
        if offset == payload.len() {
            break;
        }
    }
    Some(chain)
}
