//! IEC 60870-5-104 type definitions.
//!
//! - `Apci` / `UFunction` - Application Protocol Control Information
//! - `TypeId` - Type identification (M_SP_NA_1, etc.)
//! - `Cot` - Cause of transmission
//! - `Asdu` - Application Service Data Unit
//! - `DataPoint` / `DataValue` - monitored values and their encoding
//! - `SingleCommand` / `DoubleCommand` - command qualifiers
//! - `Cp56Time2a` - seven-byte time tag

mod apci;
mod asdu;
mod command;
mod cot;
mod data;
mod time;
mod type_id;

pub use apci::*;
pub use asdu::*;
pub use command::*;
pub use cot::*;
pub use data::*;
pub use time::*;
pub use type_id::*;
