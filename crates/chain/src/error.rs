//! Error types for ledger operations.

use alloy::{
    contract::Error as ContractError,
    providers::PendingTransactionError,
    sol_types::{Revert, SolError, decode_revert_reason},
    transports::TransportError,
};
use daoscript_types::RejectionReason;
use daoscript_util::{redact_sensitive, truncate_for_summary};
use thiserror::Error;

const DETAIL_LIMIT: usize = 240;

/// A classified refusal from the remote system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectionReason,
    /// Decoded revert reason, or the node's message when none was decoded.
    pub detail: String,
    /// JSON-RPC error code, when the refusal came back as an error response.
    pub code: Option<i64>,
}

impl Rejection {
    /// Classify a refusal from an already-decoded revert reason and the raw
    /// message.
    pub fn classify(revert_reason: Option<&str>, message: &str, code: Option<i64>) -> Self {
        let reason = RejectionReason::classify(revert_reason, message);
        let detail = revert_reason.unwrap_or(message);
        Self {
            reason,
            detail: truncate_for_summary(&redact_sensitive(detail), DETAIL_LIMIT),
            code,
        }
    }
}

/// Main error type for ledger operations.
#[derive(Debug, Error)]
pub enum ChainError {
    #[error("{operation} rejected: {}", .rejection.reason)]
    Rejected { operation: String, rejection: Rejection },

    #[error("{operation} reverted on-chain in {transaction}")]
    Reverted { operation: String, transaction: String },

    #[error("{operation} failed at the endpoint (code {code}): {message}")]
    Endpoint {
        operation: String,
        code: i64,
        message: String,
    },

    #[error("{operation} transport error: {message}")]
    Transport { operation: String, message: String },

    #[error("{operation} decode error: {message}")]
    Decode { operation: String, message: String },

    #[error("{operation}: {message}")]
    Unsupported { operation: String, message: String },

    #[error("invalid endpoint '{url}': {reason}")]
    InvalidEndpoint { url: String, reason: String },
}

impl ChainError {
    /// Create a rejection error.
    pub fn rejected(operation: impl Into<String>, rejection: Rejection) -> Self {
        Self::Rejected {
            operation: operation.into(),
            rejection,
        }
    }

    /// Create a transport error.
    pub fn transport(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            operation: operation.into(),
            message: redact_sensitive(&message.into()),
        }
    }

    /// Create a decode error.
    pub fn decode(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an unsupported-operation error.
    pub fn unsupported(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Unsupported {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Create an invalid endpoint error.
    pub fn invalid_endpoint(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: redact_sensitive(url),
            reason: reason.into(),
        }
    }

    pub fn rejection(&self) -> Option<&Rejection> {
        match self {
            ChainError::Rejected { rejection, .. } => Some(rejection),
            _ => None,
        }
    }

    /// Map a contract-layer failure (call, estimate or send).
    pub fn from_contract(operation: &str, error: ContractError) -> Self {
        match error {
            ContractError::TransportError(transport) => Self::from_transport(operation, &transport),
            ContractError::PendingTransactionError(pending) => Self::from_pending(operation, pending),
            ContractError::AbiError(abi) => Self::decode(operation, abi.to_string()),
            other => Self::transport(operation, other.to_string()),
        }
    }

    /// Map a failure while waiting for a receipt.
    pub fn from_pending(operation: &str, error: PendingTransactionError) -> Self {
        match error {
            PendingTransactionError::TransportError(transport) => Self::from_transport(operation, &transport),
            other => Self::transport(operation, other.to_string()),
        }
    }

    /// Map an RPC-level failure.
    ///
    /// Error responses carrying revert data are decoded first; the message
    /// text is only consulted when no reason could be decoded. Responses that
    /// match nothing are endpoint errors, not rejections.
    pub fn from_transport(operation: &str, error: &TransportError) -> Self {
        if let Some(payload) = error.as_error_resp() {
            let decoded = payload.as_revert_data().and_then(|data| revert_reason(&data));
            return Self::from_refusal(operation, decoded.as_deref(), &payload.message, payload.code);
        }

        let message = error.to_string();
        let rejection = Rejection::classify(None, &message, None);
        if matches!(rejection.reason, RejectionReason::Unclassified) {
            Self::transport(operation, message)
        } else {
            Self::rejected(operation, rejection)
        }
    }

    /// Map a JSON-RPC error response once its revert data has been decoded.
    pub fn from_refusal(operation: &str, revert_reason: Option<&str>, message: &str, code: i64) -> Self {
        let rejection = Rejection::classify(revert_reason, message, Some(code));
        if matches!(rejection.reason, RejectionReason::Unclassified) {
            return Self::Endpoint {
                operation: operation.to_string(),
                code,
                message: rejection.detail,
            };
        }
        Self::rejected(operation, rejection)
    }
}

/// Bare reason string from revert data. `Error(string)` is decoded directly;
/// other payloads (panics, custom errors) use the generic decoder.
fn revert_reason(data: &[u8]) -> Option<String> {
    if let Ok(revert) = Revert::abi_decode(data) {
        return Some(revert.reason);
    }
    let decoded = decode_revert_reason(data)?;
    Some(match decoded.strip_prefix("revert: ") {
        Some(reason) => reason.to_string(),
        None => decoded,
    })
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::Bytes,
        rpc::json_rpc::ErrorPayload,
        transports::RpcError,
    };

    use super::*;

    fn error_response(code: i64, message: &str, data: Option<Bytes>) -> TransportError {
        let data = data.map(|bytes| serde_json::value::to_raw_value(&bytes).unwrap());
        RpcError::ErrorResp(ErrorPayload {
            code,
            message: message.to_string().into(),
            data,
        })
    }

    #[test]
    fn revert_data_wins_over_message() {
        let revert: Bytes = Revert { reason: "Already a member".into() }.abi_encode().into();
        let error = error_response(3, "execution reverted", Some(revert));

        let mapped = ChainError::from_transport("joinSpace", &error);
        let rejection = mapped.rejection().unwrap();
        assert_eq!(rejection.reason, RejectionReason::AlreadyMember);
        assert_eq!(rejection.detail, "Already a member");
        assert_eq!(rejection.code, Some(3));
    }

    #[test]
    fn unknown_revert_reason_is_kept_verbatim() {
        let revert: Bytes = Revert { reason: "Voting closed".into() }.abi_encode().into();
        let error = error_response(3, "execution reverted", Some(revert));

        let rejection = ChainError::from_transport("vote", &error).rejection().cloned().unwrap();
        assert_eq!(
            rejection.reason,
            RejectionReason::Reverted {
                reason: Some("Voting closed".into())
            }
        );
        assert_eq!(rejection.detail, "Voting closed");
    }

    #[test]
    fn message_is_used_without_revert_data() {
        let error = error_response(-32000, "insufficient funds for gas * price + value", None);
        let mapped = ChainError::from_transport("createProposal", &error);
        assert_eq!(mapped.rejection().unwrap().reason, RejectionReason::InsufficientFunds);
    }

    #[test]
    fn unknown_error_responses_are_endpoint_errors() {
        let error = error_response(-32000, "nonce too low", None);
        let mapped = ChainError::from_transport("vote", &error);
        assert!(matches!(mapped, ChainError::Endpoint { code: -32000, .. }));
        assert!(mapped.rejection().is_none());
    }

    #[test]
    fn bare_revert_is_a_rejection_without_reason() {
        let error = error_response(3, "execution reverted", None);
        let mapped = ChainError::from_transport("vote", &error);
        assert_eq!(
            mapped.rejection().unwrap().reason,
            RejectionReason::Reverted { reason: None }
        );
    }
}
