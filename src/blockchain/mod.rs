pub mod abi;
pub mod contracts;
pub mod rpc;
pub mod tokens;
pub mod traits;

pub use rpc::BlockchainClient;
pub use tokens::TokenRegistry;
pub use traits::*;
