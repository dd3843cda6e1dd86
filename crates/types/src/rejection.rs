//! Closed taxonomy of remote rejections.

use std::fmt;

/// Why the remote system refused an operation.
///
/// Classification prefers the decoded revert reason and falls back to the
/// transport's error message. Anything that matches no known phrase ends up
/// as [`RejectionReason::Reverted`] (the node reported a revert) or
/// [`RejectionReason::Unclassified`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// The caller is not a member of the space.
    NotAMember,
    /// The caller already belongs to the space.
    AlreadyMember,
    /// An invite for this address and space already exists.
    InviteAlreadyExists,
    /// The space's join method refused the caller.
    JoinCriteriaNotMet,
    /// The signer cannot cover value plus gas.
    InsufficientFunds,
    /// Execution reverted with a reason outside the known set, or none.
    Reverted { reason: Option<String> },
    /// Neither a revert nor a known phrase.
    Unclassified,
}

const KNOWN_PHRASES: &[(&str, RejectionReason)] = &[
    ("not a member of the space", RejectionReason::NotAMember),
    ("already a member", RejectionReason::AlreadyMember),
    ("invite already exists", RejectionReason::InviteAlreadyExists),
    ("join criteria not met", RejectionReason::JoinCriteriaNotMet),
    ("insufficient funds", RejectionReason::InsufficientFunds),
];

impl RejectionReason {
    /// Classify a rejection from its decoded revert reason (if the node
    /// returned revert data) and the raw error message.
    pub fn classify(revert_reason: Option<&str>, message: &str) -> Self {
        if let Some(reason) = revert_reason {
            if let Some(known) = match_phrase(reason) {
                return known;
            }
            return RejectionReason::Reverted {
                reason: Some(reason.to_string()),
            };
        }

        if let Some(known) = match_phrase(message) {
            return known;
        }

        if message.to_ascii_lowercase().contains("execution reverted") {
            return RejectionReason::Reverted { reason: None };
        }

        RejectionReason::Unclassified
    }

    /// Whether the reason is one of the named contract rejections.
    pub fn is_known(&self) -> bool {
        !matches!(self, RejectionReason::Reverted { .. } | RejectionReason::Unclassified)
    }
}

fn match_phrase(text: &str) -> Option<RejectionReason> {
    let lowered = text.to_ascii_lowercase();
    KNOWN_PHRASES
        .iter()
        .find(|(phrase, _)| lowered.contains(phrase))
        .map(|(_, reason)| reason.clone())
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::NotAMember => write!(f, "not a member of the space"),
            RejectionReason::AlreadyMember => write!(f, "already a member"),
            RejectionReason::InviteAlreadyExists => write!(f, "invite already exists"),
            RejectionReason::JoinCriteriaNotMet => write!(f, "join criteria not met"),
            RejectionReason::InsufficientFunds => write!(f, "insufficient funds"),
            RejectionReason::Reverted { reason: Some(reason) } => write!(f, "execution reverted: {reason}"),
            RejectionReason::Reverted { reason: None } => write!(f, "execution reverted"),
            RejectionReason::Unclassified => write!(f, "unclassified"),
        }
    }
}
