//! Directional packet bridge between a device-control process and a host
//! application.
//!
//! A [`Bridge`] owns two independent directions, each driven by one OS
//! thread blocked in platform IPC calls:
//!
//! - **Tx**: packets enqueued by the device-control side are framed and
//!   written to the host application over the bridge's TX endpoint.
//! - **Rx**: frames arriving from the host application on the RX endpoint
//!   are decoded and handed to a [`PacketSink`].
//!
//! Endpoint identities are derived per instance as
//! `base_path + name + "TX"/"RX"`. Each direction accepts exactly one peer,
//! classifies I/O errors as transient / disconnect / fatal, and stays
//! restartable after a disconnect. Nothing in a worker loop ever terminates
//! the process; only endpoint creation reports an error to the caller.

pub mod bridge;
pub mod error;
pub mod queue;
pub mod sink;
pub mod worker;

pub use bridge::{Bridge, BridgeConfig, DEFAULT_BASE_PATH};
pub use error::{BridgeError, Result};
pub use queue::PacketQueue;
pub use sink::{LogSink, PacketSink};
pub use worker::{Direction, RxWorker, TxWorker, WorkerState};

pub use scopelink_frame::Packet;
