//! # `wifi-netif`
//! This crate glues a packet-oriented network stack to a Wi-Fi radio sitting on a shared
//! SPI/SDIO bus. The radio firmware and the stack run on their own clocks, so the adapter's
//! whole job is to move frames between their buffer worlds without ever letting the two
//! execution contexts touch the bus at the same time.
//! ## Architecture overview
//! This chapter gives a short overview of how the pieces fit together.
//!
//! ### Transmit (TX)
//! The stack hands [Netif::transmit] a [PacketChain]: an ordered run of segments forming one
//! frame. We total up the segment lengths, work out how much padding is needed to reach the
//! 60 byte Ethernet minimum, and then take the bus guard. Under the guard we ask the driver
//! for a frame buffer rounded up to the bus granularity, copy the segments in, zero the tail
//! and call [RadioDriver::send_frame]. The buffer goes straight back to the driver's
//! allocator and the guard is released, on the error paths too. If the guard can't be
//! acquired within the configured bound, the call returns [TxError::Timeout] without having
//! touched the driver. Retry policy lives in the stack above us.
//!
//! ### Receive (RX)
//! The radio raises a bus interrupt when it has frames buffered. The interrupt handler calls
//! [notify_frame_pending], which sets a single-slot wake signal, and the receive task blocked
//! in [Netif::run] resumes. It takes the bus guard and calls [RadioDriver::receive_frame] in
//! a loop for as long as the driver reports more pending data. Each call delivers the pulled
//! frame synchronously through [on_frame_received], which copies the payload into a stack
//! buffer chain and pushes it into the stack's input. Several interrupts arriving before the
//! task resumes collapse into one wake, which is fine: the drain loop is bounded by the
//! driver's continuation flag, not by the number of notifications.
//!
//! ### Bring-up
//! [Netif::bring_up] initializes the radio, picks the hardware address for the configured
//! operating mode (station or access point), sets the MTU and capability flags, and issues
//! the join or start-AP command with a bounded wait for the confirmation. A timed-out
//! handshake is not an error: the interface comes up without the link-up flag and the caller
//! is expected to check [Netif::is_link_up]. Finally the interface registers itself as the
//! one active receive target that [on_frame_received] routes to.
//!
//! ## Usage sketch
//! The interface wants a `'static` home so the receive delivery path can refer back to it; a
//! `static_cell::StaticCell` is the usual way to get one:
//! ```ignore
//! static NETIF: StaticCell<Netif<WfxDriver, LwipPool>> = StaticCell::new();
//!
//! let netif = NETIF.init(Netif::new(driver, pool, config));
//! let netif = netif.bring_up().await?;
//! spawner.spawn(rx_task(netif))?; // loops on netif.run()
//! ```
//! The radio driver's bus interrupt handler must call [notify_frame_pending], and its frame
//! delivery must go through [on_frame_received].

#![cfg_attr(not(test), no_std)]
pub(crate) mod fmt;

mod codec;
mod driver;
mod netif;
mod stack;
mod sync;
#[cfg(test)]
pub(crate) mod test_utils;

pub use codec::*;
pub use driver::*;
pub use netif::*;
pub use stack::*;
