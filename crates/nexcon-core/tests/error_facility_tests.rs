use nexcon_core::errors::{ExError, ExErrorKind, NexconError};

#[test]
fn test_not_found_verifiable_by_kind() {
    let err = NexconError::NodeNotFound {
        path: "/entry/instrument/nothing".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::NotFound);
    assert_eq!(ex_err.code(), "ERR_NOT_FOUND");
    assert_eq!(ex_err.entity_path(), Some("/entry/instrument/nothing"));
}

#[test]
fn test_unknown_node_maps_to_not_found() {
    let ex_err: ExError = NexconError::UnknownNode { node_id: 7 }.into();

    assert_eq!(ex_err.kind(), ExErrorKind::NotFound);
    assert!(ex_err.message().contains("7"));
}

#[test]
fn test_dangling_reference_structured_fields() {
    let err = NexconError::DanglingReference {
        owner: "/entry/instrument/detector".to_string(),
        target: "/entry/instrument/gone".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::DanglingReference);
    assert_eq!(ex_err.code(), "ERR_DANGLING_REFERENCE");
    assert_eq!(ex_err.entity_path(), Some("/entry/instrument/detector"));
    assert_eq!(ex_err.target_path(), Some("/entry/instrument/gone"));
}

#[test]
fn test_zero_length_vector_is_invalid_input() {
    let ex_err: ExError = NexconError::ZeroLengthVector.into();

    assert_eq!(ex_err.kind(), ExErrorKind::InvalidInput);
    assert_eq!(ex_err.op(), Some("add_translation"));
    assert!(ex_err.message().contains("non-zero"));
}

#[test]
fn test_cycle_and_invariant_codes_distinct() {
    let cycle: ExError = NexconError::CycleDetected {
        path: "/entry/instrument/a".to_string(),
    }
    .into();
    let invariant: ExError = NexconError::InvariantViolation {
        reason: "registry out of sync".to_string(),
    }
    .into();

    assert_eq!(cycle.code(), "ERR_CYCLE_DETECTED");
    assert_eq!(invariant.code(), "ERR_INVARIANT_VIOLATION");
    assert_ne!(cycle.kind(), invariant.kind());
}

#[test]
fn test_serde_json_error_converts() {
    let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let err: NexconError = json_err.into();

    assert!(matches!(err, NexconError::Serialization { .. }));
    assert_eq!(ExError::from(&err).kind(), ExErrorKind::Serialization);
}

#[test]
fn test_all_codes_prefixed() {
    let kinds = [
        ExErrorKind::InvalidInput,
        ExErrorKind::InvalidName,
        ExErrorKind::NotFound,
        ExErrorKind::AlreadyExists,
        ExErrorKind::WrongNodeKind,
        ExErrorKind::DanglingReference,
        ExErrorKind::NotOwner,
        ExErrorKind::HasDependents,
        ExErrorKind::CycleDetected,
        ExErrorKind::InvariantViolation,
        ExErrorKind::Io,
        ExErrorKind::Serialization,
        ExErrorKind::Internal,
    ];
    for kind in kinds {
        assert!(kind.code().starts_with("ERR_"), "{:?}", kind);
    }
}
