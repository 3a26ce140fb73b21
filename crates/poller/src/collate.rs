use std::collections::{BTreeMap, HashMap};

use evmwatch_common::error::PollerError;
use evmwatch_common::types::{Header, Log};

use crate::entry::PollEntry;

/// Groups logs by block, validates each block's logs agree on
/// `block_hash`, then overlays fetched headers on top — checking that
/// a header never disagrees with the hash already established by that
/// block's logs.
pub(crate) fn collate(
    logs: Vec<Log>,
    headers: HashMap<u64, Header>,
) -> Result<BTreeMap<u64, PollEntry>, PollerError> {
    let mut by_block: BTreeMap<u64, Vec<Log>> = BTreeMap::new();
    for log in logs {
        by_block.entry(log.block_number).or_default().push(log);
    }

    let mut entries = BTreeMap::new();
    for (number, mut block_logs) in by_block {
        block_logs.sort_by_key(|log| log.log_index);
        let hash = block_logs[0].block_hash;
        if block_logs.iter().any(|log| log.block_hash != hash) {
            return Err(PollerError::FetchMismatch { block_number: number });
        }
        entries.insert(number, PollEntry::from_logs(hash, block_logs));
    }

    for (number, header) in headers {
        match entries.get(&number) {
            Some(entry) if entry.hash != header.hash => {
                return Err(PollerError::FetchMismatch { block_number: number });
            }
            Some(_) => {}
            None => {
                entries.insert(number, PollEntry::empty(header.hash));
            }
        }
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256};

    fn log(number: u64, hash: B256, index: u64) -> Log {
        Log {
            block_number: number,
            block_hash: hash,
            tx_hash: B256::ZERO,
            log_index: index,
            topics: vec![],
            address: Address::ZERO,
            data: vec![],
        }
    }

    #[test]
    fn groups_logs_and_sorts_by_log_index() {
        let hash = B256::from([1; 32]);
        let logs = vec![log(10, hash, 1), log(10, hash, 0)];

        let entries = collate(logs, HashMap::new()).unwrap();

        let entry = &entries[&10];
        assert_eq!(entry.logs[0].log_index, 0);
        assert_eq!(entry.logs[1].log_index, 1);
    }

    #[test]
    fn disagreeing_block_hashes_within_one_block_is_a_mismatch() {
        let logs = vec![log(10, B256::from([1; 32]), 0), log(10, B256::from([2; 32]), 1)];

        let result = collate(logs, HashMap::new());
        assert!(matches!(result, Err(PollerError::FetchMismatch { block_number: 10 })));
    }

    #[test]
    fn header_disagreeing_with_logs_hash_is_a_mismatch() {
        let hash = B256::from([1; 32]);
        let logs = vec![log(10, hash, 0)];
        let mut headers = HashMap::new();
        headers.insert(
            10,
            Header {
                number: 10,
                hash: B256::from([9; 32]),
                nonce: [0; 8],
                timestamp: 0,
                gas_limit: 0,
                gas_used: 0,
            },
        );

        let result = collate(logs, headers);
        assert!(matches!(result, Err(PollerError::FetchMismatch { block_number: 10 })));
    }

    #[test]
    fn header_without_logs_creates_empty_entry() {
        let mut headers = HashMap::new();
        headers.insert(
            20,
            Header {
                number: 20,
                hash: B256::from([7; 32]),
                nonce: [0; 8],
                timestamp: 0,
                gas_limit: 0,
                gas_used: 0,
            },
        );

        let entries = collate(Vec::new(), headers).unwrap();

        assert!(entries[&20].logs.is_empty());
        assert_eq!(entries[&20].hash, B256::from([7; 32]));
    }
}
