//! Full storage-key enumeration through the Parity trie-walk extension.

use std::collections::HashSet;
use std::future::Future;

use chainmirror_common::types::BlockIdentifier;
use chainmirror_rpc::EthClient;
use ethereum_types::{Address, H256};
use tracing::debug;

use crate::errors::EngineError;

/// Enumerate every non-zero storage key of `address` at `block`.
///
/// Keys come back in the node's trie pre-order and that order is
/// preserved: downstream proof assembly relies on it. An empty contract
/// yields an empty vector.
pub async fn enumerate_storage_keys(
    client: &EthClient,
    address: Address,
    block: BlockIdentifier,
    page_size: usize,
) -> Result<Vec<H256>, EngineError> {
    let keys = paged_enumeration(page_size, |cursor| async move {
        client
            .list_storage_keys(address, page_size, cursor, block)
            .await
            .map_err(EngineError::from)
    })
    .await?;
    debug!(%address, %block, count = keys.len(), "storage keys enumerated");
    Ok(keys)
}

/// The pagination loop, generic over the page source.
///
/// Requests pages until one comes back short, using the last key of the
/// previous page as the cursor. Some nodes repeat the cursor key at the
/// head of the next page, so repeats are dropped defensively while
/// first-seen order is kept.
async fn paged_enumeration<F, Fut>(
    page_size: usize,
    mut fetch_page: F,
) -> Result<Vec<H256>, EngineError>
where
    F: FnMut(Option<H256>) -> Fut,
    Fut: Future<Output = Result<Vec<H256>, EngineError>>,
{
    let mut keys: Vec<H256> = Vec::new();
    let mut seen: HashSet<H256> = HashSet::new();
    let mut cursor: Option<H256> = None;

    loop {
        let page = fetch_page(cursor).await?;
        let page_len = page.len();
        for key in page {
            if seen.insert(key) {
                keys.push(key);
            }
        }
        if page_len < page_size {
            break;
        }
        // cursor semantics: next page starts strictly after the last key
        cursor = keys.last().copied();
    }
    Ok(keys)
}
