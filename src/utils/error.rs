use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Communication error: {0}")]
    CommunicationError(String),

    #[error("Encoding error: {0}")]
    EncodingError(String),

    #[error("Unknown {table} register address {address}")]
    UnknownRegister { table: &'static str, address: u16 },

    #[error("Sensor error: {0}")]
    SensorError(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<std::io::Error> for NodeError {
    fn from(err: std::io::Error) -> Self {
        NodeError::CommunicationError(format!("IO error: {}", err))
    }
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::SerializationError(format!("JSON error: {}", err))
    }
}

impl From<serialport::Error> for NodeError {
    fn from(err: serialport::Error) -> Self {
        NodeError::ConnectionError(format!("Serial port error: {}", err))
    }
}
