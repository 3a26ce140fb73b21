use alloy::primitives::B256;

use evmwatch_common::types::Log;

/// Deterministically perturbs a block hash from its number and a fork
/// generation counter, so repeated reorgs of the same block produce
/// distinct, reproducible hashes instead of colliding.
pub(crate) fn fork_hash(block_number: u64, generation: u32) -> B256 {
    let mut bytes = [0u8; 32];
    bytes[0..8].copy_from_slice(&block_number.to_be_bytes());
    bytes[8..12].copy_from_slice(&generation.to_be_bytes());
    bytes[31] = 0xf0;
    B256::from(bytes)
}

/// Rewrites a block's logs to carry a new block hash and a perturbed
/// transaction hash, mirroring what a real reorg does to the logs of a
/// block that gets re-mined under a different parent.
pub(crate) fn fork_logs(logs: &[Log], new_hash: B256, generation: u32) -> Vec<Log> {
    logs.iter()
        .map(|log| {
            let mut tx_bytes = log.tx_hash.0;
            tx_bytes[0] ^= generation as u8;
            tx_bytes[1] = tx_bytes[1].wrapping_add(1);
            Log {
                block_hash: new_hash,
                tx_hash: B256::from(tx_bytes),
                ..log.clone()
            }
        })
        .collect()
}
