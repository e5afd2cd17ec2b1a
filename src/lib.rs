pub mod config;
pub mod nbt;
pub mod network;
pub mod scheduler;
pub mod types;

pub mod prelude {
    pub use crate::config::{ConfigError, PoolConfig, ServerConfig};
    pub use crate::network::packets::*;
    pub use crate::network::{dispatch, ByteCursor, PacketHeader, ProtocolError, Wire};
    pub use crate::scheduler::{AsyncPool, AsyncTask, PoolError, TaskContext, TaskHandle, TaskState};
    pub use crate::types::*;
}
