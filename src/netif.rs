use core::cell::Cell;

use bitfield_struct::bitfield;
use embassy_sync::{
    blocking_mutex::{self, raw::CriticalSectionRawMutex},
    mutex::Mutex,
};
use embassy_time::{with_timeout, Duration};
use portable_atomic::{AtomicU8, Ordering};

use crate::{
    codec::{self, frame_padding},
    sync::WakeSignal,
    AccessPointConfig, BufferKind, FramePriority, HardwareAddress, InitError, NetStack,
    PacketChain, RadioDriver, RadioEndpoint, RadioError, ReceivedFrame, StationConfig,
};

/// Raised from the radio's bus interrupt; parked on by [Netif::run].
static FRAME_PENDING: WakeSignal = WakeSignal::new();

/// The one interface receive deliveries route to. Written at bring-up, read-only after.
static ACTIVE_INTERFACE: blocking_mutex::Mutex<
    CriticalSectionRawMutex,
    Cell<Option<&'static dyn RxTarget>>,
> = blocking_mutex::Mutex::new(Cell::new(None));

/// Tell the receive task the radio has frames buffered.
///
/// Interrupt-safe. Calls coalesce: however many interrupts fire before the task resumes,
/// it wakes once and drains everything the device reports.
pub fn notify_frame_pending() {
    FRAME_PENDING.put();
}

/// Process-wide receive delivery entry point.
///
/// Radio drivers call this once per pulled frame, from inside
/// [receive_frame](RadioDriver::receive_frame), while the receive task holds the bus guard.
/// The frame borrow ends when this returns, so the payload is copied out here. Frames
/// arriving before an interface has registered are discarded; that is the normal startup
/// race, not a fault.
pub fn on_frame_received(frame: &ReceivedFrame<'_>) {
    match ACTIVE_INTERFACE.lock(|slot| slot.get()) {
        Some(target) => target.deliver(frame),
        None => trace!("rx frame discarded: no interface registered"),
    }
}

/// Make `target` the interface [on_frame_received] routes to.
pub(crate) fn register_active_interface(target: &'static dyn RxTarget) {
    ACTIVE_INTERFACE.lock(|slot| slot.set(Some(target)));
}

#[cfg(test)]
pub(crate) fn clear_active_interface() {
    ACTIVE_INTERFACE.lock(|slot| slot.set(None));
}

/// Receive side of an interface, as consulted by [on_frame_received].
pub(crate) trait RxTarget: Sync {
    fn deliver(&self, frame: &ReceivedFrame<'_>);
}

#[bitfield(u8)]
pub struct InterfaceFlags {
    /// The interface accepts broadcast traffic.
    pub broadcast: bool,
    /// The interface participates in address resolution.
    pub arp: bool,
    /// The association / AP-start handshake has completed.
    pub link_up: bool,
    #[bits(5)]
    pub __: u8,
}

/// Operating role of the interface, with the network parameters that go with it.
///
/// The set of roles is closed on purpose: everything mode-dependent (hardware address
/// selection, the association command, the transmit endpoint) matches on this exhaustively.
#[derive(Clone, Copy, Debug)]
pub enum OperatingMode {
    Station(StationConfig),
    AccessPoint(AccessPointConfig),
}

impl OperatingMode {
    /// The radio endpoint frames for this mode are sent on.
    pub const fn endpoint(&self) -> RadioEndpoint {
        match self {
            Self::Station(_) => RadioEndpoint::Station,
            Self::AccessPoint(_) => RadioEndpoint::SoftAp,
        }
    }
}

/// Interface configuration. Credentials and mode are opaque values decided elsewhere.
#[derive(Clone, Copy, Debug)]
pub struct NetifConfig {
    pub mode: OperatingMode,
    pub mtu: u16,
    /// Bound on the transmit path's wait for the bus guard. `None` waits indefinitely,
    /// which is the default: a held guard means a frame is in flight, not a hang.
    pub tx_guard_timeout: Option<Duration>,
    /// Bound on the association / AP-start confirmation wait during bring-up.
    pub confirmation_timeout: Duration,
    /// Access class outgoing frames are queued under.
    pub tx_priority: FramePriority,
}

impl NetifConfig {
    pub const DEFAULT_MTU: u16 = 1500;
    pub const DEFAULT_CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(5);

    pub const fn new(mode: OperatingMode) -> Self {
        Self {
            mode,
            mtu: Self::DEFAULT_MTU,
            tx_guard_timeout: None,
            confirmation_timeout: Self::DEFAULT_CONFIRMATION_TIMEOUT,
            tx_priority: FramePriority::BestEffort,
        }
    }
}

/// Errors interface bring-up can fail with.
///
/// Driver init statuses are mapped onto this at the bring-up boundary; nothing below it
/// leaks through. An association timeout is deliberately *not* here: the interface comes up
/// without the link-up flag instead (callers check [Netif::is_link_up]).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NetifError {
    /// The radio rejected the firmware keyset.
    InvalidKey,
    /// The firmware download did not complete in time.
    FirmwareDownload,
    /// The radio timed out during bring-up.
    Timeout,
    /// Any other radio failure.
    Radio,
}

impl From<InitError> for NetifError {
    fn from(status: InitError) -> Self {
        match status {
            InitError::InvalidKey => Self::InvalidKey,
            InitError::FirmwareDownloadTimeout => Self::FirmwareDownload,
            InitError::Timeout => Self::Timeout,
            InitError::Failure => Self::Radio,
        }
    }
}

pub type NetifResult<T> = Result<T, NetifError>;

/// Outcome of a single transmit call. None of these are fatal; retry policy belongs to the
/// stack above.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TxError {
    /// The bus guard was not acquired within the configured bound. The driver was not
    /// touched; this is a congestion signal.
    Timeout,
    /// The driver's frame allocator is exhausted.
    OutOfBuffers,
    /// The driver reported a send failure.
    Radio(RadioError),
}

/// One network interface bound to a bus-attached radio.
///
/// Owns the radio driver inside the bus guard: the only way to reach driver state is
/// through the guard's lock, so the transmit path and the receive task can never overlap
/// inside driver code. The stack's pool is shared separately and must be safe for calls
/// from both contexts.
pub struct Netif<D: RadioDriver, S: NetStack> {
    bus: Mutex<CriticalSectionRawMutex, D>,
    stack: S,
    config: NetifConfig,
    hardware_address: HardwareAddress,
    flags: AtomicU8,
}

impl<D: RadioDriver, S: NetStack> core::fmt::Debug for Netif<D, S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Netif")
            .field("config", &self.config)
            .field("hardware_address", &self.hardware_address)
            .field("flags", &self.flags)
            .finish()
    }
}

impl<D: RadioDriver, S: NetStack> Netif<D, S> {
    /// Build the interface handle and its bus guard. The radio is not touched until
    /// [Self::bring_up].
    pub fn new(driver: D, stack: S, config: NetifConfig) -> Self {
        Self {
            bus: Mutex::new(driver),
            stack,
            config,
            hardware_address: [0; 6],
            flags: AtomicU8::new(0),
        }
    }

    pub fn hardware_address(&self) -> HardwareAddress {
        self.hardware_address
    }

    pub fn mtu(&self) -> u16 {
        self.config.mtu
    }

    pub fn mode(&self) -> &OperatingMode {
        &self.config.mode
    }

    pub fn flags(&self) -> InterfaceFlags {
        InterfaceFlags::from_bits(self.flags.load(Ordering::Acquire))
    }

    /// Whether the association / AP-start handshake has completed.
    pub fn is_link_up(&self) -> bool {
        self.flags().link_up()
    }

    /// Record a link transition reported by the radio (connect/disconnect indications
    /// arriving after bring-up).
    pub fn set_link_state(&self, up: bool) {
        let _ = self.flags.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            Some(InterfaceFlags::from_bits(bits).with_link_up(up).into_bits())
        });
    }

    /// Send one packet chain out the radio.
    ///
    /// Takes the bus guard (bounded by [NetifConfig::tx_guard_timeout]), copies the chain
    /// into a driver frame buffer with minimum-frame padding, hands it to the firmware and
    /// returns the buffer to the driver's allocator. The guard is released on every path
    /// out of here. The chain itself is only read; the stack keeps ownership.
    pub async fn transmit(&self, chain: &S::Chain) -> Result<(), TxError> {
        // The wire length is known before the guard is taken.
        let total = chain.total_len();
        trace!("tx: {} payload bytes, {} on the wire", total, total + frame_padding(total));

        let mut driver = match self.config.tx_guard_timeout {
            Some(bound) => match with_timeout(bound, self.bus.lock()).await {
                Ok(guard) => guard,
                Err(_) => {
                    trace!("tx: bus guard busy, frame dropped");
                    return Err(TxError::Timeout);
                }
            },
            None => self.bus.lock().await,
        };

        let (mut buffer, tx_len) = match codec::encode(&mut *driver, chain) {
            Some(encoded) => encoded,
            None => return Err(TxError::OutOfBuffers),
        };

        let result = driver
            .send_frame(
                &mut buffer,
                tx_len,
                self.config.mode.endpoint(),
                self.config.tx_priority,
            )
            .await;
        driver.free_buffer(buffer, BufferKind::TxFrame);

        result.map_err(TxError::Radio)
    }

    /// The receive task body. Drive this from a dedicated task for the process lifetime.
    ///
    /// Parks on the frame-pending signal; every wake takes the bus guard and drains all
    /// frames the device has buffered. The guard wait here is unbounded: the transmit path
    /// holds it for one frame at most, and a guard that never frees is a system-level
    /// fault outside this layer's recovery scope.
    pub async fn run(&self) -> ! {
        loop {
            FRAME_PENDING.wait().await;
            self.drain().await;
        }
    }

    /// Pull frames from the device until its continuation flag clears.
    async fn drain(&self) {
        let mut driver = self.bus.lock().await;
        loop {
            match driver.receive_frame().await {
                Ok(true) => continue,
                Ok(false) => break,
                Err(status) => {
                    warn!("rx drain aborted: {:?}", status);
                    break;
                }
            }
        }
    }
}

impl<D, S> Netif<D, S>
where
    D: RadioDriver + Send + 'static,
    S: NetStack + Sync + 'static,
{
    /// Bring the interface up and register it as the active receive target.
    ///
    /// Initializes the radio firmware, takes the hardware address matching the configured
    /// mode, sets the capability flags and issues the join / start-AP command with a
    /// bounded wait for its confirmation.
    ///
    /// A confirmation timeout (or a rejected association) is a partial success, not an
    /// error: the interface is returned with the link-up flag unset and the handshake can
    /// be observed through [Self::is_link_up]. Only radio init failures are hard errors.
    pub async fn bring_up(&'static mut self) -> NetifResult<&'static Self> {
        let mut driver = self.bus.lock().await;

        let info = match driver.init().await {
            Ok(info) => info,
            Err(status) => {
                error!("radio init failed: {:?}", status);
                return Err(status.into());
            }
        };
        debug!("radio firmware up");

        self.hardware_address = match &self.config.mode {
            OperatingMode::Station(_) => info.station_address,
            OperatingMode::AccessPoint(_) => info.softap_address,
        };
        self.flags.store(
            InterfaceFlags::new()
                .with_broadcast(true)
                .with_arp(true)
                .into_bits(),
            Ordering::Release,
        );

        let confirmation = match &self.config.mode {
            OperatingMode::Station(station) => {
                debug!("joining network {}", station.ssid);
                with_timeout(self.config.confirmation_timeout, driver.join(station)).await
            }
            OperatingMode::AccessPoint(ap) => {
                debug!("starting AP {} on channel {}", ap.ssid, ap.channel);
                with_timeout(self.config.confirmation_timeout, driver.start_ap(ap)).await
            }
        };
        drop(driver);

        match confirmation {
            Ok(Ok(())) => {
                self.set_link_state(true);
                debug!("link up");
            }
            Ok(Err(status)) => warn!("association rejected: {:?}", status),
            Err(_) => warn!("association confirmation timed out"),
        }

        let this: &'static Self = self;
        register_active_interface(this);
        Ok(this)
    }
}

impl<D, S> RxTarget for Netif<D, S>
where
    D: RadioDriver + Send,
    S: NetStack + Sync,
{
    fn deliver(&self, frame: &ReceivedFrame<'_>) {
        match codec::decode(&self.stack, frame) {
            Some(chain) => {
                if let Err(chain) = self.stack.input(chain) {
                    // The one cleanup that must never be missed: an undelivered chain
                    // still belongs to us.
                    warn!("stack rejected rx frame, releasing chain");
                    self.stack.free(chain);
                }
            }
            None => trace!("rx frame dropped (empty or pool exhausted)"),
        }
    }
}
