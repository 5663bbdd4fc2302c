//! # Labwire
//!
//! A Rust library for operating laboratory instruments over stream sockets,
//! serial lines and telnet.
//!
//! This library provides line-oriented transports and a message-level
//! communicator for ASCII instrument protocols, the IEEE-488.2 common-command
//! subset with status-register decoding, and validation rules for keeping
//! command arguments inside each device's accepted vocabulary.
//!
//! ## Features
//!
//! - **Interchangeable transports**: TCP sockets, serial lines and telnet
//!   behind one [`Transport`] trait
//! - **Line-oriented messaging**: terminator-framed sends, budget- or
//!   line-based reads with per-device terminators
//! - **IEEE-488.2 common commands**: invoked by verbose name or terse alias,
//!   gated per device
//! - **Status registers**: standard event and status byte values decoded into
//!   named flags
//! - **Command validation**: range, step and choice rules with strict or
//!   coercing policies
//! - **Offline development**: scripted mock transport with an inspectable
//!   frame journal
//!
//! ## Examples
//!
//! ### Scripted Session Without Hardware
//!
//! ```rust
//! use labwire::{Communicator, MockTransport, ScpiClient, ScpiSubset};
//!
//! let mut mock = MockTransport::new();
//! mock.push_response(b"Keithley Instruments Inc.,3390,1234,1.00\n".to_vec());
//!
//! let mut com = Communicator::new(Box::new(mock));
//! com.open()?;
//!
//! let mut scpi = ScpiClient::new(com, ScpiSubset::All)?;
//! assert_eq!(scpi.identify()?, "Keithley Instruments Inc.,3390,1234,1.00");
//! # Ok::<(), labwire::ScpiError>(())
//! ```
//!
//! ### Socket-Attached Instrument
//!
//! ```rust,no_run
//! use labwire::{decode, Communicator, SocketConfig, SocketTransport};
//!
//! let config = SocketConfig::new("192.168.0.14", 5025);
//! let mut com = Communicator::new(Box::new(SocketTransport::new(config)));
//! com.open()?;
//!
//! com.send("OUTP ON")?;
//! let raw = com.query("SYST:ERR?")?;
//! println!("{}", decode(raw)?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Serial Discovery and Terminator Setup
//!
//! ```rust,no_run
//! use labwire::{list_ports, Communicator, SerialConfig, SerialTransport};
//!
//! for port in list_ports()? {
//!     println!("{}", port.port_name);
//! }
//!
//! let config = SerialConfig::new("/dev/ttyUSB0").with_baud_rate(115_200);
//! let mut com = Communicator::new(Box::new(SerialTransport::new(config)));
//! com.on_open(|link| {
//!     link.set_terminator("\r\n");
//!     Ok(())
//! });
//! com.open()?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Validated Command Arguments
//!
//! ```rust
//! use labwire::{CommandGuard, ValidationRule, Value};
//!
//! let guard = CommandGuard::new("set_frequency")
//!     .param("freq")
//!     .rule(ValidationRule::range_clamped("freq", 1e-6, 50e6));
//!
//! // Out-of-range values are clamped to the violated bound and logged.
//! let args = guard.check(&[Value::Float(80e6)], &[])?;
//! assert_eq!(args["freq"], Value::Float(50e6));
//! # Ok::<(), labwire::GuardError>(())
//! ```

pub mod communicator;
pub mod decode;
pub mod mock;
pub mod registers;
pub mod scpi;
pub mod serial;
pub mod socket;
pub mod telnet;
pub mod transport;
pub mod validate;

// Re-export the main types for convenience
pub use transport::{Transport, TransportError};

pub use socket::{SocketConfig, SocketTransport};

pub use serial::{list_ports, SerialConfig, SerialTransport};

pub use telnet::{TelnetConfig, TelnetTransport};

pub use mock::{MockJournal, MockTransport};

pub use communicator::{Communicator, ResponseMode};

pub use decode::{decode, DecodeError, RawResponse, TextResponse};

pub use registers::{
    extract_bits, or_of_bits, RegisterError, STANDARD_EVENT_REGISTER, STATUS_BYTE_REGISTER,
};

pub use scpi::{
    terse_alias, CommandSpec, Direction, ScpiClient, ScpiError, ScpiSubset, ScpiTable,
    COMMON_COMMANDS,
};

pub use validate::{
    BoundArgs, CommandGuard, ContractError, GuardError, Policy, Rule, ValidationError,
    ValidationRule, Value,
};
