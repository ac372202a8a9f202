//! Structural and signature validation for typed blobs.
//!
//! These checks need nothing but the blob itself. Checks that need the
//! index (dependencies present, signer authorized for author) happen at
//! ingest.

use crate::change::Change;
use crate::delegation::{DelegationPurpose, KeyDelegation};
use crate::error::ValidationError;
use crate::hlc::{HlcTimestamp, MAX_PHYSICAL_MS};

/// Validate a change completely: structure, then signature.
pub fn validate_change(change: &Change) -> Result<(), ValidationError> {
    validate_change_structure(change)?;
    change.verify_signature()?;
    Ok(())
}

/// Structural checks only; no signature verification.
pub fn validate_change_structure(change: &Change) -> Result<(), ValidationError> {
    // 1. Timestamp must be set
    if change.hlc == HlcTimestamp::ZERO {
        return Err(ValidationError::ZeroTimestamp);
    }

    // 2. Timestamps are stored as signed 64-bit integers
    if change.hlc.as_u64() > i64::MAX as u64 {
        return Err(ValidationError::TimestampOutOfRange(change.hlc.as_u64()));
    }

    // 3. Deps strictly ascending by CID string
    if change.deps.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ValidationError::UnsortedDependencies);
    }

    // 4. A self-signed change has nothing to prove
    if change.is_self_signed() && change.delegation.is_some() {
        return Err(ValidationError::UnexpectedDelegation);
    }

    Ok(())
}

/// Validate a key delegation: purpose, distinct keys, issue time, signature.
pub fn validate_delegation(delegation: &KeyDelegation) -> Result<(), ValidationError> {
    if let DelegationPurpose::Other(purpose) = &delegation.purpose {
        return Err(ValidationError::UnsupportedPurpose(purpose.clone()));
    }
    if delegation.issuer == delegation.delegate {
        return Err(ValidationError::SelfDelegation);
    }
    // The issue time becomes the packed timestamp of the delegation row.
    if delegation.issue_time > MAX_PHYSICAL_MS {
        return Err(ValidationError::TimestampOutOfRange(delegation.issue_time));
    }
    delegation.verify_signature()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::change::ChangeBuilder;
    use crate::cid::{Cid, Codec};
    use crate::crypto::{Keypair, Signature};
    use crate::iri::Iri;

    fn kp(n: u8) -> Keypair {
        Keypair::from_seed(&[n; 32])
    }

    fn builder(author: &Keypair) -> ChangeBuilder {
        ChangeBuilder::new(author.public_key(), Iri::parse("hm://d/v").unwrap())
            .hlc(HlcTimestamp::new(10, 0))
    }

    #[test]
    fn test_valid_change() {
        let alice = kp(1);
        assert!(validate_change(&builder(&alice).sign(&alice)).is_ok());
    }

    #[test]
    fn test_zero_timestamp() {
        let alice = kp(1);
        let change = builder(&alice).hlc(HlcTimestamp::ZERO).sign(&alice);
        assert!(matches!(
            validate_change(&change),
            Err(ValidationError::ZeroTimestamp)
        ));
    }

    #[test]
    fn test_unsorted_deps() {
        let alice = kp(1);
        let mut change = builder(&alice)
            .deps([Cid::new(Codec::DagCbor, b"1"), Cid::new(Codec::DagCbor, b"2")])
            .sign(&alice);
        change.deps.reverse();
        assert!(matches!(
            validate_change_structure(&change),
            Err(ValidationError::UnsortedDependencies)
        ));
    }

    #[test]
    fn test_self_signed_with_delegation() {
        let alice = kp(1);
        let change = builder(&alice)
            .delegation(Cid::new(Codec::DagCbor, b"kd"))
            .sign(&alice);
        assert!(matches!(
            validate_change(&change),
            Err(ValidationError::UnexpectedDelegation)
        ));
    }

    #[test]
    fn test_bad_signature() {
        let alice = kp(1);
        let mut change = builder(&alice).sign(&alice);
        change.signature = Signature::EMPTY;
        assert!(matches!(
            validate_change(&change),
            Err(ValidationError::SignatureFailed)
        ));
    }

    #[test]
    fn test_delegation_rules() {
        let alice = kp(1);
        let device = kp(2);
        assert!(validate_delegation(&KeyDelegation::issue(&alice, device.public_key(), 1)).is_ok());

        assert!(matches!(
            validate_delegation(&KeyDelegation::issue(&alice, alice.public_key(), 1)),
            Err(ValidationError::SelfDelegation)
        ));

        let mut odd = KeyDelegation::issue(&alice, device.public_key(), 1);
        odd.purpose = DelegationPurpose::Other("admin".into());
        assert!(matches!(
            validate_delegation(&odd),
            Err(ValidationError::UnsupportedPurpose(p)) if p == "admin"
        ));
    }

    #[test]
    fn test_delegation_issue_time_must_pack() {
        let alice = kp(1);
        let device = kp(2).public_key();
        assert!(validate_delegation(&KeyDelegation::issue(&alice, device, MAX_PHYSICAL_MS)).is_ok());

        let late = KeyDelegation::issue(&alice, device, 1 << 48);
        assert!(matches!(
            validate_delegation(&late),
            Err(ValidationError::TimestampOutOfRange(t)) if t == 1 << 48
        ));
        assert!(matches!(
            validate_delegation(&KeyDelegation::issue(&alice, device, MAX_PHYSICAL_MS + 1)),
            Err(ValidationError::TimestampOutOfRange(_))
        ));
        assert_eq!(
            HlcTimestamp::new(MAX_PHYSICAL_MS, u16::MAX).as_u64(),
            i64::MAX as u64
        );
    }
}
