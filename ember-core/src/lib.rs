pub mod block;
pub mod blockchain;
pub mod clock;
pub mod params;
pub mod pow;
pub mod script;
pub mod transaction;
pub mod utxo;

// Re-exports principais
pub use block::{calculate_merkle_root, Block, BlockHeader};
pub use blockchain::{BlockAccepted, Blockchain, ChainNode, ChainStats};
pub use clock::{Clock, FixedClock, SystemClock};
pub use params::{ConsensusParams, MAX_BLOCK_SIZE, MAX_SCRIPT_SIZE, MAX_TX_SIZE};
pub use script::{AcceptAllVerifier, ScriptVerifier};
pub use transaction::{Transaction, TxInput, TxOutput};
pub use utxo::{MemoryUtxoStore, OutPoint, UtxoStore};

// Re-exports de tipos compartilhados
pub use shared::{ChainError, Hash512, Result};
