use macro_bits::serializable_enum;

/// An IEEE 802 MAC address, as handed out by the radio firmware.
pub type HardwareAddress = [u8; 6];

/// Identities reported by the radio once its firmware is up.
///
/// The firmware owns two fixed addresses, one per operating role. Which one ends up on the
/// interface depends on the configured [OperatingMode](crate::OperatingMode).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StartupInfo {
    pub station_address: HardwareAddress,
    pub softap_address: HardwareAddress,
}

/// The allocator pools a radio driver manages.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BufferKind {
    TxFrame,
    RxFrame,
}

/// The logical radio endpoint a frame is sent on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioEndpoint {
    Station,
    SoftAp,
}

serializable_enum! {
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
    /// WMM-style access class a frame is queued under.
    pub enum FramePriority: u8 {
        #[default]
        BestEffort => 0,
        Background => 1,
        Video => 2,
        Voice => 3
    }
}

/// Status codes the radio can report while its firmware is brought up.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InitError {
    /// The firmware keyset was rejected by the device.
    InvalidKey,
    /// The firmware download did not complete in time.
    FirmwareDownloadTimeout,
    /// Polling the device for readiness timed out.
    Timeout,
    /// Any other failure reported by the device.
    Failure,
}

/// Errors a driver bus transaction can end in.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RadioError {
    /// The request timed out inside the driver.
    Timeout,
    /// The bus transaction itself failed.
    Bus,
    /// The firmware refused or failed the request.
    Rejected,
}

/// A frame as delivered by the radio, valid only for the duration of the delivery callback.
///
/// The driver invalidates the backing storage when the callback returns, so the payload must
/// be copied out before then. The firmware prepends `padding` scratch bytes to align the
/// payload for its own DMA; [Self::payload] skips them.
#[derive(Clone, Copy, Debug)]
pub struct ReceivedFrame<'a> {
    /// Number of alignment bytes preceding the payload.
    pub padding: usize,
    /// Payload length in bytes. Zero-length deliveries are legal no-ops.
    pub len: usize,
    /// Raw frame storage, including the leading padding.
    pub data: &'a [u8],
}

impl ReceivedFrame<'_> {
    /// The frame payload with the alignment padding stripped.
    pub fn payload(&self) -> &[u8] {
        &self.data[self.padding..self.padding + self.len]
    }
}

/// A transmit buffer obtained from the driver's allocator.
///
/// The region starts with the driver's frame request header, which the driver fills on send;
/// [Self::body_mut] is the payload region after it. Between allocation and the matching
/// [RadioDriver::free_buffer] the transmit path is the sole owner.
pub trait TxFrameBuffer {
    /// The writable payload region of the buffer.
    fn body_mut(&mut self) -> &mut [u8];
}

/// The command surface this adapter consumes from a bus-attached radio driver.
///
/// All methods that touch the bus are only ever called with the interface's bus guard held,
/// so implementations don't need their own locking against this crate. `receive_frame` must
/// deliver each pulled frame synchronously through [on_frame_received](crate::on_frame_received)
/// before it returns.
#[allow(async_fn_in_trait)]
pub trait RadioDriver {
    type TxBuffer: TxFrameBuffer;

    /// Length of the frame request header at the start of every TX buffer.
    const FRAME_HEADER_LEN: usize;

    /// Download and boot the radio firmware.
    async fn init(&mut self) -> Result<StartupInfo, InitError>;

    /// Allocate a buffer of `len` bytes (header included) from the given pool.
    ///
    /// `None` when the pool is exhausted.
    fn allocate_buffer(&mut self, kind: BufferKind, len: usize) -> Option<Self::TxBuffer>;

    /// Return a buffer to the pool it came from.
    fn free_buffer(&mut self, buffer: Self::TxBuffer, kind: BufferKind);

    /// Hand a filled frame of `frame_len` payload bytes to the firmware for transmission.
    async fn send_frame(
        &mut self,
        buffer: &mut Self::TxBuffer,
        frame_len: usize,
        endpoint: RadioEndpoint,
        priority: FramePriority,
    ) -> Result<(), RadioError>;

    /// Pull one buffered frame from the device.
    ///
    /// The frame is delivered synchronously through the process-wide receive callback. The
    /// returned flag is the device's continuation bit: `true` while more frames are buffered.
    async fn receive_frame(&mut self) -> Result<bool, RadioError>;

    /// Associate with the configured network. Resolves when the connect confirmation
    /// indication arrives; the caller bounds the wait.
    async fn join(&mut self, config: &StationConfig) -> Result<(), RadioError>;

    /// Start an access point. Resolves when the start-AP confirmation indication arrives;
    /// the caller bounds the wait.
    async fn start_ap(&mut self, config: &AccessPointConfig) -> Result<(), RadioError>;
}

/// Security suite for a join or start-AP command. Opaque to this crate; the driver maps it
/// onto its firmware's encoding.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Security {
    Open,
    Wep,
    WpaWpa2Psk,
    #[default]
    Wpa2Psk,
}

/// Parameters of the network to associate with in station mode.
#[derive(Clone, Copy, Debug)]
pub struct StationConfig {
    pub ssid: &'static str,
    pub passkey: &'static str,
    pub security: Security,
}

impl StationConfig {
    pub const fn new(ssid: &'static str, passkey: &'static str) -> Self {
        Self {
            ssid,
            passkey,
            security: Security::Wpa2Psk,
        }
    }
}

/// Parameters of the network to announce in access-point mode.
#[derive(Clone, Copy, Debug)]
pub struct AccessPointConfig {
    pub ssid: &'static str,
    pub passkey: &'static str,
    pub security: Security,
    pub channel: u8,
}

impl AccessPointConfig {
    pub const DEFAULT_CHANNEL: u8 = 6;

    pub const fn new(ssid: &'static str, passkey: &'static str) -> Self {
        Self {
            ssid,
            passkey,
            security: Security::Wpa2Psk,
            channel: Self::DEFAULT_CHANNEL,
        }
    }
}
