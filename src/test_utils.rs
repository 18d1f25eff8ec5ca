//! Shared test doubles: a scripted radio driver, a counting stack pool and a few polling
//! helpers. Only compiled for host tests.

use core::future::Future;
use core::pin::Pin;
use core::task::{Context, Poll, RawWaker, RawWakerVTable, Waker};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use embassy_futures::yield_now;

use crate::{
    AccessPointConfig, BufferKind, FramePriority, InitError, NetStack, PacketChain, RadioDriver,
    RadioEndpoint, RadioError, ReceivedFrame, StartupInfo, StationConfig, TxFrameBuffer,
};

pub const STA_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x01];
pub const AP_MAC: [u8; 6] = [0x02, 0x00, 0x00, 0x00, 0x00, 0x02];

const HEADER_LEN: usize = 12;

pub fn leak<T>(value: T) -> &'static mut T {
    Box::leak(Box::new(value))
}

/// Serializes tests that touch the process-wide interface registry.
pub fn registry_lock() -> MutexGuard<'static, ()> {
    static LOCK: Mutex<()> = Mutex::new(());
    LOCK.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn noop_waker() -> Waker {
    fn clone(_: *const ()) -> RawWaker {
        RawWaker::new(core::ptr::null(), &VTABLE)
    }
    fn noop(_: *const ()) {}
    static VTABLE: RawWakerVTable = RawWakerVTable::new(clone, noop, noop, noop);
    unsafe { Waker::from_raw(RawWaker::new(core::ptr::null(), &VTABLE)) }
}

/// Poll `fut` up to `times` times, stopping early if it completes.
pub fn poll_times<F: Future>(mut fut: Pin<&mut F>, times: usize) -> Poll<F::Output> {
    let waker = noop_waker();
    let mut cx = Context::from_waker(&waker);
    for _ in 0..times {
        if let Poll::Ready(out) = fut.as_mut().poll(&mut cx) {
            return Poll::Ready(out);
        }
    }
    Poll::Pending
}

/// A packet chain over heap segments.
pub struct VecChain {
    segments: Vec<Vec<u8>>,
}

impl VecChain {
    pub fn from_segments(segments: &[&[u8]]) -> Self {
        Self {
            segments: segments.iter().map(|s| s.to_vec()).collect(),
        }
    }

    /// A zeroed chain of `total` bytes split into segments of at most `segment_cap`.
    pub fn with_capacity(total: usize, segment_cap: usize) -> Self {
        let mut segments = Vec::new();
        let mut remaining = total;
        while remaining > 0 {
            let len = remaining.min(segment_cap);
            segments.push(vec![0u8; len]);
            remaining -= len;
        }
        Self { segments }
    }

    pub fn concat(&self) -> Vec<u8> {
        self.segments.concat()
    }

    pub fn segment_lens(&self) -> Vec<usize> {
        self.segments.iter().map(Vec::len).collect()
    }
}

impl PacketChain for VecChain {
    fn total_len(&self) -> usize {
        self.segments.iter().map(Vec::len).sum()
    }

    fn segments(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.segments.iter().map(Vec::as_slice)
    }

    fn segments_mut(&mut self) -> impl Iterator<Item = &mut [u8]> + '_ {
        self.segments.iter_mut().map(Vec::as_mut_slice)
    }
}

/// Counting buffer pool + input sink standing in for the network stack.
pub struct MockStack {
    pub state: Arc<StackState>,
    segment_capacity: usize,
}

#[derive(Default)]
pub struct StackState {
    allocated: AtomicUsize,
    freed: AtomicUsize,
    exhausted: AtomicBool,
    reject_input: AtomicBool,
    accepted: Mutex<Vec<Vec<u8>>>,
}

impl StackState {
    pub fn allocated(&self) -> usize {
        self.allocated.load(Ordering::SeqCst)
    }

    pub fn freed(&self) -> usize {
        self.freed.load(Ordering::SeqCst)
    }

    pub fn accepted_payloads(&self) -> Vec<Vec<u8>> {
        self.accepted.lock().unwrap().clone()
    }

    pub fn exhaust_pool(&self) {
        self.exhausted.store(true, Ordering::SeqCst);
    }

    pub fn reject_input(&self) {
        self.reject_input.store(true, Ordering::SeqCst);
    }
}

impl MockStack {
    pub fn new() -> Self {
        Self::with_segment_capacity(usize::MAX)
    }

    pub fn with_segment_capacity(segment_capacity: usize) -> Self {
        Self {
            state: Arc::new(StackState::default()),
            segment_capacity,
        }
    }
}

impl NetStack for MockStack {
    type Chain = VecChain;

    fn allocate(&self, len: usize) -> Option<VecChain> {
        if self.state.exhausted.load(Ordering::SeqCst) {
            return None;
        }
        self.state.allocated.fetch_add(1, Ordering::SeqCst);
        Some(VecChain::with_capacity(len, self.segment_capacity))
    }

    fn input(&self, chain: VecChain) -> Result<(), VecChain> {
        if self.state.reject_input.load(Ordering::SeqCst) {
            return Err(chain);
        }
        self.state.accepted.lock().unwrap().push(chain.concat());
        Ok(())
    }

    fn free(&self, _chain: VecChain) {
        self.state.freed.fetch_add(1, Ordering::SeqCst);
    }
}

/// One step of a scripted receive drain.
pub enum RxStep {
    /// Deliver a frame through the process-wide callback, then report the continuation flag.
    Frame { payload: Vec<u8>, more: bool },
    /// Report the continuation flag without delivering anything.
    Empty { more: bool },
    /// Fail the bus transaction.
    Error(RadioError),
}

#[derive(Clone, Copy)]
enum ConfirmBehavior {
    Confirm,
    Fail(RadioError),
    Never,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentFrame {
    pub body: Vec<u8>,
    pub len: usize,
    pub endpoint: RadioEndpoint,
    pub priority: FramePriority,
}

pub struct RadioState {
    ops: Mutex<Vec<&'static str>>,
    depth: AtomicUsize,
    max_depth: AtomicUsize,
    tx_alloc_sizes: Mutex<Vec<usize>>,
    tx_outstanding: AtomicUsize,
    tx_exhausted: AtomicBool,
    send_failure: Mutex<Option<RadioError>>,
    sent: Mutex<Vec<SentFrame>>,
    rx_script: Mutex<VecDeque<RxStep>>,
    rx_calls: AtomicUsize,
    init_result: Mutex<Result<StartupInfo, InitError>>,
    confirm: Mutex<ConfirmBehavior>,
}

impl RadioState {
    fn new() -> Self {
        Self {
            ops: Mutex::new(Vec::new()),
            depth: AtomicUsize::new(0),
            max_depth: AtomicUsize::new(0),
            tx_alloc_sizes: Mutex::new(Vec::new()),
            tx_outstanding: AtomicUsize::new(0),
            tx_exhausted: AtomicBool::new(false),
            send_failure: Mutex::new(None),
            sent: Mutex::new(Vec::new()),
            rx_script: Mutex::new(VecDeque::new()),
            rx_calls: AtomicUsize::new(0),
            init_result: Mutex::new(Ok(StartupInfo {
                station_address: STA_MAC,
                softap_address: AP_MAC,
            })),
            confirm: Mutex::new(ConfirmBehavior::Confirm),
        }
    }

    fn enter(&self, op: &'static str) -> OpGuard<'_> {
        self.ops.lock().unwrap().push(op);
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_depth.fetch_max(depth, Ordering::SeqCst);
        OpGuard { state: self }
    }

    pub fn ops(&self) -> Vec<&'static str> {
        self.ops.lock().unwrap().clone()
    }

    /// Deepest observed nesting of driver operations across all contexts.
    pub fn max_op_depth(&self) -> usize {
        self.max_depth.load(Ordering::SeqCst)
    }

    pub fn tx_alloc_sizes(&self) -> Vec<usize> {
        self.tx_alloc_sizes.lock().unwrap().clone()
    }

    /// Allocated-but-not-freed TX buffers.
    pub fn outstanding_tx_buffers(&self) -> usize {
        self.tx_outstanding.load(Ordering::SeqCst)
    }

    pub fn exhaust_tx_buffers(&self) {
        self.tx_exhausted.store(true, Ordering::SeqCst);
    }

    pub fn restock_tx_buffers(&self) {
        self.tx_exhausted.store(false, Ordering::SeqCst);
    }

    pub fn fail_next_send(&self, error: RadioError) {
        *self.send_failure.lock().unwrap() = Some(error);
    }

    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.sent.lock().unwrap().clone()
    }

    pub fn push_rx(&self, step: RxStep) {
        self.rx_script.lock().unwrap().push_back(step);
    }

    pub fn rx_calls(&self) -> usize {
        self.rx_calls.load(Ordering::SeqCst)
    }

    pub fn fail_init(&self, status: InitError) {
        *self.init_result.lock().unwrap() = Err(status);
    }

    pub fn fail_confirmation(&self, error: RadioError) {
        *self.confirm.lock().unwrap() = ConfirmBehavior::Fail(error);
    }

    pub fn confirmation_never_arrives(&self) {
        *self.confirm.lock().unwrap() = ConfirmBehavior::Never;
    }

    async fn confirm(&self) -> Result<(), RadioError> {
        let behavior = *self.confirm.lock().unwrap();
        match behavior {
            ConfirmBehavior::Confirm => Ok(()),
            ConfirmBehavior::Fail(error) => Err(error),
            ConfirmBehavior::Never => core::future::pending().await,
        }
    }
}

struct OpGuard<'a> {
    state: &'a RadioState,
}

impl Drop for OpGuard<'_> {
    fn drop(&mut self) {
        self.state.depth.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockBuffer {
    data: Vec<u8>,
}

impl TxFrameBuffer for MockBuffer {
    fn body_mut(&mut self) -> &mut [u8] {
        &mut self.data[HEADER_LEN..]
    }
}

/// Scripted radio driver. `yielding()` inserts suspension points inside every bus
/// operation, so concurrent callers genuinely interleave under `join`.
pub struct MockRadio {
    pub state: Arc<RadioState>,
    yields: bool,
}

impl MockRadio {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RadioState::new()),
            yields: false,
        }
    }

    pub fn yielding(mut self) -> Self {
        self.yields = true;
        self
    }

    async fn maybe_yield(&self) {
        if self.yields {
            yield_now().await;
        }
    }
}

impl RadioDriver for MockRadio {
    type TxBuffer = MockBuffer;

    const FRAME_HEADER_LEN: usize = HEADER_LEN;

    async fn init(&mut self) -> Result<StartupInfo, InitError> {
        let _op = self.state.enter("init");
        self.maybe_yield().await;
        *self.state.init_result.lock().unwrap()
    }

    fn allocate_buffer(&mut self, kind: BufferKind, len: usize) -> Option<MockBuffer> {
        assert_eq!(kind, BufferKind::TxFrame);
        if self.state.tx_exhausted.load(Ordering::SeqCst) {
            return None;
        }
        let _op = self.state.enter("alloc");
        self.state.tx_alloc_sizes.lock().unwrap().push(len);
        self.state.tx_outstanding.fetch_add(1, Ordering::SeqCst);
        // Poison fill, so the zero padding written by the codec is observable.
        Some(MockBuffer {
            data: vec![0xff; len],
        })
    }

    fn free_buffer(&mut self, _buffer: MockBuffer, kind: BufferKind) {
        assert_eq!(kind, BufferKind::TxFrame);
        let _op = self.state.enter("free");
        self.state.tx_outstanding.fetch_sub(1, Ordering::SeqCst);
    }

    async fn send_frame(
        &mut self,
        buffer: &mut MockBuffer,
        frame_len: usize,
        endpoint: RadioEndpoint,
        priority: FramePriority,
    ) -> Result<(), RadioError> {
        let _op = self.state.enter("send");
        self.maybe_yield().await;
        self.state.sent.lock().unwrap().push(SentFrame {
            body: buffer.data[HEADER_LEN..].to_vec(),
            len: frame_len,
            endpoint,
            priority,
        });
        match self.state.send_failure.lock().unwrap().take() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn receive_frame(&mut self) -> Result<bool, RadioError> {
        let _op = self.state.enter("recv");
        self.state.rx_calls.fetch_add(1, Ordering::SeqCst);
        self.maybe_yield().await;
        let step = self.state.rx_script.lock().unwrap().pop_front();
        match step {
            Some(RxStep::Frame { payload, more }) => {
                let mut data = vec![0xcc, 0xcc];
                data.extend_from_slice(&payload);
                crate::on_frame_received(&ReceivedFrame {
                    padding: 2,
                    len: payload.len(),
                    data: &data,
                });
                Ok(more)
            }
            Some(RxStep::Empty { more }) => Ok(more),
            Some(RxStep::Error(error)) => Err(error),
            None => Ok(false),
        }
    }

    async fn join(&mut self, _config: &StationConfig) -> Result<(), RadioError> {
        let _op = self.state.enter("join");
        self.state.confirm().await
    }

    async fn start_ap(&mut self, _config: &AccessPointConfig) -> Result<(), RadioError> {
        let _op = self.state.enter("start_ap");
        self.state.confirm().await
    }
}
