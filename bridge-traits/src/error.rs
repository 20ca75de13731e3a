use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    /// The native library reported a status code.
    #[error("Native call {call} failed with status {code:#010x}")]
    Native { call: &'static str, code: u32 },
}

pub type Result<T> = std::result::Result<T, BridgeError>;
