//! # Modbus Transport Core
//!
//! Protocol-level building blocks for Modbus masters: typed decoding and
//! encoding of register data, validated request blueprints with PDU
//! build/parse, and an async scheduler that pools connections per endpoint
//! and drives one-shot and recurring transactions.
//!
//! The wire transport itself stays outside the crate. Callers implement
//! [`SlaveConnection`] and [`ConnectionFactory`] for their sockets or serial
//! ports; everything above that line (pooling, serialization per endpoint,
//! inter-transaction spacing, retries, callbacks) is handled here.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use modbus_transport::{
//!     ConnectionFactory, Endpoint, ModbusManager, PollTask, ReadFunction, ReadRequest,
//! };
//!
//! # async fn run(factory: Arc<dyn ConnectionFactory>) {
//! let manager = ModbusManager::new(factory);
//! let endpoint = Endpoint::tcp("10.0.0.5", 502);
//! let request = ReadRequest::new(1, ReadFunction::ReadHoldingRegisters, 0, 10, 3).unwrap();
//! let task = PollTask::new(endpoint, request, Some(Arc::new(|result| {
//!     match result.outcome {
//!         Ok(data) => println!("read: {data:?}"),
//!         Err(err) => eprintln!("read failed: {err}"),
//!     }
//! })));
//! manager
//!     .register_poll(task, Duration::from_secs(1), Duration::ZERO)
//!     .await;
//! # }
//! ```

pub mod codec;
pub mod connection;
pub mod data;
pub mod endpoint;
pub mod error;
pub mod manager;
pub mod pdu;
pub mod request;
pub mod task;

pub use codec::{
    encode, extract, extract_bit, extract_f32, extract_i16, extract_string, extract_u16, Value,
    ValueType,
};
pub use connection::{ConnectionFactory, SlaveConnection};
pub use data::{BitArray, RegisterArray};
pub use endpoint::{Endpoint, EndpointPoolConfiguration};
pub use error::{CodecError, ExceptionCode, Result, TransportError};
pub use manager::{ModbusManager, TaskHandle};
pub use pdu::{
    build_read_pdu, build_write_pdu, parse_read_response, parse_write_response, ReadOutcome,
    WriteResponse,
};
pub use request::{
    InvalidRequest, ReadFunction, ReadRequest, WritePayload, WriteRequest, MAX_WRITE_COILS,
    MAX_WRITE_REGISTERS,
};
pub use task::{PollTask, ReadCallback, ReadResult, WriteCallback, WriteResult, WriteTask};
