//! Integration tests for AccountRegistry with the in-memory backend.

use std::sync::Arc;

use wsvfs_core::remote::LoginInfo;
use wsvfs_core::testing::{MemoryBackend, ScriptedUi};
use wsvfs_core::ui::messages;
use wsvfs_core::{
    Account, AccountRegistry, ExecResult, RegisterOutcome, RegistryError, RemoteClient, VirtualPath,
};

fn registry_with(backend: MemoryBackend) -> (Arc<MemoryBackend>, Arc<ScriptedUi>, AccountRegistry) {
    let backend = Arc::new(backend);
    let ui = Arc::new(ScriptedUi::new());
    let registry = AccountRegistry::load(backend.clone(), ui.clone());
    (backend, ui, registry)
}

// ============================================================================
// Loading and lookup
// ============================================================================

#[test]
fn test_load_keeps_persisted_order() {
    let (_, _, registry) = registry_with(
        MemoryBackend::new()
            .with_account("alice", "a")
            .with_account("bob", "b"),
    );
    let names: Vec<_> = registry.iter().map(|s| s.user_name().to_string()).collect();
    assert_eq!(names, ["alice", "bob"]);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get(1).unwrap().user_name(), "bob");
}

#[test]
fn test_load_skips_case_insensitive_duplicates() {
    let (_, _, registry) = registry_with(
        MemoryBackend::new()
            .with_account("alice", "a")
            .with_account("ALICE", "a"),
    );
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_by_name_is_case_insensitive() {
    let (_, _, registry) = registry_with(MemoryBackend::new().with_account("Alice", "a"));
    assert_eq!(registry.by_name("alice").unwrap().user_name(), "Alice");
    assert!(registry.contains("ALICE"));
    assert!(matches!(
        registry.by_name("carol"),
        Err(RegistryError::AccountNotFound(name)) if name == "carol"
    ));
}

#[test]
fn test_empty_backend() {
    let (_, _, registry) = registry_with(MemoryBackend::new());
    assert!(registry.is_empty());
    assert!(registry.get(0).is_none());
}

// ============================================================================
// Registration
// ============================================================================

#[test]
fn test_register_new_account() {
    let backend = MemoryBackend::new();
    backend.add_server_user("carol", "pw");
    let (backend, _, mut registry) = registry_with(backend);

    let outcome = registry.register(&LoginInfo::new("carol", "pw", true)).unwrap();
    assert_eq!(outcome, RegisterOutcome::Registered);
    assert!(registry.contains("carol"));
    assert_eq!(backend.persisted_names(), ["carol"]);

    let session = registry.by_name("carol").unwrap();
    assert!(session.is_logged_in());
    assert!(session.account().stored_password_hash().is_some());
}

#[test]
fn test_register_without_remember_keeps_no_hash() {
    let backend = MemoryBackend::new();
    backend.add_server_user("carol", "pw");
    let (_, _, mut registry) = registry_with(backend);

    registry.register(&LoginInfo::new("carol", "pw", false)).unwrap();
    let session = registry.by_name("carol").unwrap();
    assert!(session.account().stored_password_hash().is_none());
}

#[test]
fn test_register_existing_name_skips_backend() {
    let (backend, _, mut registry) = registry_with(MemoryBackend::new().with_account("alice", "a"));
    let outcome = registry.register(&LoginInfo::new("ALICE", "a", false)).unwrap();
    assert_eq!(outcome, RegisterOutcome::AlreadyExists);
    assert_eq!(backend.register_calls(), 0);
    assert_eq!(registry.len(), 1);
}

#[test]
fn test_register_wrong_password_is_rejected() {
    let backend = MemoryBackend::new();
    backend.add_server_user("carol", "pw");
    let (_, _, mut registry) = registry_with(backend);

    let outcome = registry.register(&LoginInfo::new("carol", "nope", false)).unwrap();
    assert_eq!(outcome, RegisterOutcome::Rejected);
    assert!(registry.is_empty());
}

#[test]
fn test_registered_session_lists_immediately() {
    let backend = MemoryBackend::new();
    let remote = backend.add_server_user("carol", "pw");
    remote.add_file(true, "/a.txt", b"1");
    let (_, ui, mut registry) = registry_with(backend);

    registry.register(&LoginInfo::new("carol", "pw", false)).unwrap();
    let listing = registry
        .by_name("carol")
        .unwrap()
        .list(&VirtualPath::parse("/carol/Private").unwrap())
        .unwrap();
    assert_eq!(listing.count(), 1);
    assert!(ui.password_prompts().is_empty());
}

// ============================================================================
// Add account flow
// ============================================================================

#[test]
fn test_add_new_account_navigates_to_root() {
    let backend = MemoryBackend::new();
    backend.add_server_user("carol", "pw");
    let (_, ui, mut registry) = registry_with(backend);
    ui.queue_credential("carol", "pw", true);

    assert_eq!(registry.add_new_account(None), ExecResult::SymLink("/".to_string()));
    assert!(registry.contains("carol"));
    assert!(ui.messages().is_empty());
}

#[test]
fn test_add_new_account_dismissed_prompt() {
    let (backend, ui, mut registry) = registry_with(MemoryBackend::new());
    assert_eq!(registry.add_new_account(Some("dave")), ExecResult::Ok);
    assert_eq!(ui.credential_prompts(), [Some("dave".to_string())]);
    assert_eq!(backend.register_calls(), 0);
    assert!(ui.messages().is_empty());
}

#[test]
fn test_add_new_account_existing_shows_notice() {
    let (_, ui, mut registry) = registry_with(MemoryBackend::new().with_account("alice", "a"));
    ui.queue_credential("Alice", "a", false);

    assert_eq!(registry.add_new_account(None), ExecResult::Ok);
    assert_eq!(ui.messages(), [messages::account_exists("Alice")]);
}

#[test]
fn test_add_new_account_wrong_password_shows_notice() {
    let backend = MemoryBackend::new();
    backend.add_server_user("carol", "pw");
    let (_, ui, mut registry) = registry_with(backend);
    ui.queue_credential("carol", "bad", false);

    assert_eq!(registry.add_new_account(None), ExecResult::Ok);
    assert_eq!(ui.messages(), [messages::WRONG_LOGIN]);
    assert!(registry.is_empty());
}

// ============================================================================
// Deregistration
// ============================================================================

#[test]
fn test_deregister_removes_session_and_logs_out() {
    let (backend, _, mut registry) = registry_with(
        MemoryBackend::new()
            .with_account("alice", "a")
            .with_account("bob", "b"),
    );
    let remote = backend.remote("alice").unwrap();
    remote.set_logged_in(true);

    assert!(registry.deregister("ALICE").unwrap());
    assert!(!registry.contains("alice"));
    assert_eq!(registry.len(), 1);
    assert_eq!(backend.persisted_names(), ["bob"]);
    assert!(!remote.is_logged_in());
}

#[test]
fn test_deregister_refused_keeps_session() {
    let (backend, ui, mut registry) = registry_with(MemoryBackend::new().with_account("alice", "a"));
    backend.reject_unregister(true);

    assert!(!registry.deregister("alice").unwrap());
    assert!(registry.contains("alice"));
    assert!(ui.messages().is_empty());
}

#[test]
fn test_deregister_failure_shows_notice() {
    let (backend, ui, mut registry) = registry_with(MemoryBackend::new().with_account("alice", "a"));
    backend.fail_unregister_with("server unavailable");

    assert!(!registry.deregister("alice").unwrap());
    assert!(registry.contains("alice"));
    assert_eq!(
        ui.messages(),
        ["Unregister account error:\nTransport: transport failure: server unavailable"]
    );
}

#[test]
fn test_deregister_unknown_account() {
    let (backend, _, mut registry) = registry_with(MemoryBackend::new());
    assert!(matches!(
        registry.deregister("ghost"),
        Err(RegistryError::AccountNotFound(_))
    ));
    assert_eq!(backend.unregister_calls(), 0);
}
