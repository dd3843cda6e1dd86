//! Transport-independent view of a settled transaction.

use alloy::{
    primitives::{Address, B256, Bytes, U256},
    rpc::types::TransactionReceipt,
};

/// One emitted log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
}

impl EventLog {
    pub fn signature(&self) -> Option<B256> {
        self.topics.first().copied()
    }

    /// Identifier carried by the event: the first indexed argument if there
    /// is one, otherwise the first data word.
    pub fn leading_id(&self) -> Option<U256> {
        if let Some(topic) = self.topics.get(1) {
            return Some(U256::from_be_bytes(topic.0));
        }
        self.data.get(..32).map(U256::from_be_slice)
    }
}

/// Receipt fields the workflows inspect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub transaction: B256,
    pub block_number: Option<u64>,
    pub gas_used: u64,
    /// Receipt status; `false` means the transaction reverted on-chain.
    pub succeeded: bool,
    pub logs: Vec<EventLog>,
}

impl Settlement {
    pub fn from_receipt(receipt: &TransactionReceipt) -> Self {
        let logs = receipt
            .inner
            .logs()
            .iter()
            .map(|log| EventLog {
                address: log.address(),
                topics: log.topics().to_vec(),
                data: log.data().data.clone(),
            })
            .collect();

        Self {
            transaction: receipt.transaction_hash,
            block_number: receipt.block_number,
            gas_used: receipt.gas_used,
            succeeded: receipt.status(),
            logs,
        }
    }

    /// First log whose signature topic equals `topic`.
    pub fn find_event(&self, topic: B256) -> Option<&EventLog> {
        self.logs.iter().find(|log| log.signature() == Some(topic))
    }

    pub fn has_event(&self, topic: B256) -> bool {
        self.find_event(topic).is_some()
    }
}

#[cfg(test)]
mod tests {
    use alloy::sol_types::SolEvent;

    use super::*;
    use crate::bindings::{DaoProposals, DaoSpaceFactory};

    fn log_of<E: SolEvent>(event: &E) -> EventLog {
        let data = event.encode_log_data();
        EventLog {
            address: Address::ZERO,
            topics: data.topics().to_vec(),
            data: data.data,
        }
    }

    #[test]
    fn finds_events_by_signature_topic() {
        let joined = DaoSpaceFactory::MemberJoined {
            spaceId: U256::from(9u64),
            member: Address::with_last_byte(1),
        };
        let settlement = Settlement {
            transaction: B256::ZERO,
            block_number: Some(1),
            gas_used: 50_000,
            succeeded: true,
            logs: vec![log_of(&joined)],
        };

        assert!(settlement.has_event(DaoSpaceFactory::MemberJoined::SIGNATURE_HASH));
        assert!(!settlement.has_event(DaoProposals::VoteCast::SIGNATURE_HASH));
    }

    #[test]
    fn leading_id_prefers_indexed_argument() {
        let created = DaoProposals::ProposalCreated {
            proposalId: U256::from(42u64),
            spaceId: U256::from(9u64),
            startTime: U256::from(1u64),
            endTime: U256::from(2u64),
            creator: Address::with_last_byte(3),
            targetContract: Address::with_last_byte(4),
        };
        assert_eq!(log_of(&created).leading_id(), Some(U256::from(42u64)));

        let unindexed = EventLog {
            address: Address::ZERO,
            topics: vec![B256::ZERO],
            data: U256::from(7u64).to_be_bytes::<32>().to_vec().into(),
        };
        assert_eq!(unindexed.leading_id(), Some(U256::from(7u64)));
    }
}
