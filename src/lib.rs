//! # voltage_iec104_sim
//!
//! IEC 60870-5-104 controlled station (RTU) simulator.
//!
//! The simulator listens for controlling stations (SCADA masters,
//! telecontrol gateways) and answers them like a real substation RTU: it
//! runs the APCI link procedures, answers general interrogation, read,
//! clock synchronization and single/double commands, and reports
//! spontaneous changes of a set of simulated points.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use tokio_util::sync::CancellationToken;
//! use voltage_iec104_sim::{default_catalog, Iec104Server, PointRegistry, ServerConfig};
//!
//! #[tokio::main]
//! async fn main() -> voltage_iec104_sim::Result<()> {
//!     let registry = PointRegistry::new(default_catalog())?;
//!     let config = ServerConfig::new("0.0.0.0:2404").common_address(1);
//!
//!     let server = Iec104Server::bind(config, registry).await?;
//!     server.run(CancellationToken::new()).await
//! }
//! ```
//!
//! ## Protocol Overview
//!
//! IEC 60870-5-104 uses TCP/IP for communication (default port 2404).
//! The protocol defines three frame types:
//!
//! - **I-frame**: Information transfer (contains ASDU)
//! - **S-frame**: Supervisory (acknowledgment)
//! - **U-frame**: Unnumbered (control: STARTDT, STOPDT, TESTFR)
//!
//! ### APDU Structure
//!
//! ```text
//! APCI (6 bytes):
//! +--------+--------+--------+--------+--------+--------+
//! | 0x68   | Length | Control Field (4 bytes)           |
//! +--------+--------+--------+--------+--------+--------+
//! ```
//!
//! ## Layout
//!
//! - [`codec`]: APDU framing on the byte stream
//! - [`session`]: per-connection link layer (sequence numbers, k/w, t1-t3)
//! - [`handler`]: application layer, one request ASDU in, responses out
//! - [`points`]: simulated points and their value patterns
//! - [`server`]: TCP listener spawning one session per connection

#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod clock;
pub mod codec;
pub mod config;
pub mod error;
pub mod handler;
pub mod parser;
pub mod points;
pub mod server;
pub mod session;
pub mod types;

pub use clock::StationClock;
pub use codec::{Apdu, Iec104Codec};
pub use config::ServerConfig;
pub use error::{Iec104Error, Result};
pub use handler::AsduHandler;
pub use parser::{parse_asdu, parse_control, ControlObject};
pub use points::{
    default_catalog, load_catalog, parse_catalog, Pattern, PointConfig, PointReading,
    PointRegistry,
};
pub use server::Iec104Server;
pub use session::{Request, Session, SessionState};
pub use types::*;
