pub mod crc;
pub mod engine;
pub mod registers;
pub mod request;
pub mod response;
pub mod transport;

pub use engine::{PollOutcome, SlaveEngine};
pub use registers::RegisterBank;
pub use request::{ExceptionCode, ExceptionInfo, Request};
pub use response::Signedness;
pub use transport::{RtuTimings, RtuTransport, SerialLink, UartLink};
