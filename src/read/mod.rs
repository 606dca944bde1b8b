mod memory;
pub use memory::*;
mod storage;
pub use storage::*;
