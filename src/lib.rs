pub mod arena;
pub mod buffer;
pub mod config;
pub mod error;
pub mod row;
pub mod stream;
pub mod table;

pub use arena::{Arena, ArenaRef, BlockPool};
pub use config::PoolConfig;
pub use error::CodecError;
pub use row::RowPtr;
