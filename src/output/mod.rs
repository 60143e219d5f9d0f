pub mod datalog;

pub use datalog::{broadcast, ConsoleDataLog, DataLogSink, FileDataLog, LogRecord};
