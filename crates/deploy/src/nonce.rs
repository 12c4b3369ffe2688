//! Nonce allocation for the deploying account.

use alloy_core::primitives::Address;

use crate::{ChainClient, ChainError};

/// Hands out the next nonce of an account.
///
/// Nothing is cached: other tools may share the account, and earlier attempts may still be
/// pending, so the node's pending count is the only source of truth.
#[derive(Debug)]
pub struct NonceAllocator<'a, C> {
    client: &'a C,
}

impl<'a, C: ChainClient> NonceAllocator<'a, C> {
    pub fn new(client: &'a C) -> Self {
        Self { client }
    }

    pub async fn next_nonce(&self, identity: Address) -> Result<u64, ChainError> {
        let nonce = self.client.pending_nonce(identity).await?;
        tracing::debug!(%identity, nonce, "Allocated nonce");
        Ok(nonce)
    }
}
