pub mod configured_store;
pub mod ethereum;
pub mod file_store;
pub mod memory_store;
pub mod mock_mint_gate;
