//! avrlib-eiscp: eISCP protocol driver for networked AV receivers.
//!
//! eISCP wraps the ASCII ISCP command language in a length-framed binary
//! envelope, carried over a persistent TCP connection on port 60128.
//! Devices announce themselves to a UDP broadcast on the same port.
//!
//! The crate is organized around the protocol's moving parts:
//!
//! | Module        | Purpose                                              |
//! |---------------|------------------------------------------------------|
//! | [`frame`]     | Binary frame encoding/decoding                       |
//! | [`stream`]    | Reassembling frames from an arbitrarily-chunked byte stream |
//! | [`commands`]  | Symbolic command name to wire opcode table           |
//! | [`decoders`]  | Per-group parameter decoders                         |
//! | [`state`]     | Last-known value cache per status group              |
//! | [`client`]    | [`EiscpClient`]: session lifecycle + command/response correlation |
//! | [`discovery`] | [`Discovery`]: UDP broadcast device discovery        |

pub mod client;
pub mod commands;
pub mod decoders;
pub mod discovery;
pub mod frame;
pub mod state;
pub mod stream;

mod correlate;
mod dispatch;

pub use client::{ClientOptions, EiscpClient, DEFAULT_PORT};
pub use commands::CommandSet;
pub use decoders::DecoderTable;
pub use discovery::{DetectedDevice, Discovery, DiscoveryOptions};
pub use state::DeviceState;
pub use stream::StreamReassembler;
