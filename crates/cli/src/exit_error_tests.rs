// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn not_found_store_error_maps_to_exit_3() {
    let e: ExitError = v0_storage::StoreError::NotFound("auth".to_string()).into();
    assert_eq!(e.code, EXIT_NOT_FOUND);
    assert!(e.message.contains("auth"));
}

#[test]
fn held_engine_error_maps_to_exit_4() {
    let e: ExitError = EngineError::Held("auth".to_string()).into();
    assert_eq!(e.code, EXIT_HELD);
}

#[test]
fn other_engine_errors_map_to_exit_1() {
    let e: ExitError = EngineError::Git("merge failed".to_string()).into();
    assert_eq!(e.code, EXIT_FAILURE);
}

#[test]
fn nested_not_found_maps_through_engine_error() {
    let e: ExitError =
        EngineError::Store(v0_storage::StoreError::NotFound("x".to_string())).into();
    assert_eq!(e.code, EXIT_NOT_FOUND);
}
