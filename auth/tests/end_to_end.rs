//! End-to-end request lifecycle tests.
//!
//! Each test drives `begin_request` and `end_request` the way a host
//! pipeline would and checks both the verdicts and the resulting store
//! state.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use ticketguard_auth::{
    compute_hash,
    constants::{EXAMPLE_HASH_SALT, HASH_HEX_LENGTH},
    mocks::MockTicketStore,
    user_data::{pack, EmbeddedData},
    AuthStatus, Clock, ComparisonResult, CookieDirective, CredentialTicket, GuardConfig, GuardError, RequestContext,
    TicketGuard, TicketKey, TicketStore, TransportCookie,
};
use ticketguard_testing::helpers::{
    context, echoed, init_tracing, test_codec, test_config, GuardHarness, TEST_SALT,
};
use ticketguard_testing::mocks::{test_instant, MutableClock};

const HOST: &str = "10.0.0.1";

// ═══════════════════════════════════════════════════════════════════════
// Scenarios
// ═══════════════════════════════════════════════════════════════════════

/// Scenario A: no cookie present.
#[test]
fn test_no_cookie_is_anonymous() {
    let harness = GuardHarness::new();

    let analysis = harness
        .guard
        .analyzer()
        .analyze(&context(HOST), None)
        .expect("analysis should succeed");

    assert!(!analysis.cookie.is_valid());
    assert!(!analysis.cookie.is_malicious());
    assert!(!analysis.is_authenticated());

    let (begin, end) = harness
        .round_trip(HOST, None, None)
        .expect("round trip should succeed");
    assert_eq!(begin.status, AuthStatus::NotFound);
    assert!(!begin.malicious);
    assert_eq!(end.verdict, Some(ComparisonResult::UnauthenticatedRequest));
    assert_eq!(end.directive, CookieDirective::Keep);
}

/// Scenario B: well-formed envelope around a value that does not decrypt.
#[test]
fn test_undecryptable_cookie_is_malicious() {
    init_tracing();
    let harness = GuardHarness::new();
    let config = harness.guard.config();
    let forged = TransportCookie::new(
        config.cookie.name.clone(),
        config.cookie.path.clone(),
        "q7Jx0cP2uZb5bX1kQ0d4Zm9yZ2VkLXRpY2tldA",
    );

    let analysis = harness
        .guard
        .analyzer()
        .analyze(&context(HOST), Some(&forged))
        .expect("analysis should succeed");
    assert!(analysis.cookie.checks.name_valid);
    assert!(analysis.cookie.checks.path_valid);
    assert!(!analysis.cookie.checks.value_decrypts);
    assert!(!analysis.cookie.is_valid());
    assert!(analysis.cookie.is_malicious());

    let (begin, end) = harness
        .round_trip(HOST, Some(&forged), None)
        .expect("round trip should succeed");
    assert_eq!(begin.status, AuthStatus::Invalid);
    assert!(begin.malicious);
    assert!(begin.downstream_cookie.is_none());
    assert_eq!(end.verdict, Some(ComparisonResult::MaliciousRequest));
    assert!(matches!(end.directive, CookieDirective::Clear(_)));
}

/// Scenario C: valid ticket whose auxiliary data carries a zero hash and a
/// key that is not in the store.
#[test]
fn test_unknown_key_and_zero_hash() {
    let harness = GuardHarness::new();
    let ticket = harness
        .guard
        .create_ticket("alice", false, "")
        .expect("ticket should be created");
    let unknown = TicketKey::new();
    let forged = ticket.with_user_data(pack(&"0".repeat(HASH_HEX_LENGTH), unknown));
    let cookie = harness.cookie_for(&forged).expect("cookie should encode");

    let analysis = harness
        .guard
        .analyzer()
        .analyze(&context(HOST), Some(&cookie))
        .expect("analysis should succeed");

    let checks = analysis.ticket.checks;
    assert!(checks.user_data_contains_hash);
    assert!(!checks.user_data_hash_valid);
    assert!(checks.user_data_contains_key);
    assert!(!checks.user_data_key_found);
    assert_eq!(analysis.ticket.embedded_key, Some(unknown));

    // Ticket validity ignores the hash and key checks.
    assert!(analysis.ticket.is_valid());
    assert!(analysis.is_authenticated());

    // Without a shadow record the request is not trusted, but not malicious.
    assert!(!analysis.is_valid());
    assert!(!analysis.is_malicious());
}

/// Scenario D: a full login sequence.
#[test]
fn test_login_creates_exactly_one_matching_record() {
    init_tracing();
    let harness = GuardHarness::new();
    let ticket = harness
        .guard
        .create_ticket("alice", true, "roles=admin")
        .expect("ticket should be created");
    let minted = harness.cookie_for(&ticket).expect("cookie should encode");

    let (begin, end) = harness
        .round_trip(HOST, None, Some(&minted))
        .expect("round trip should succeed");

    assert_eq!(begin.status, AuthStatus::NotFound);
    assert_eq!(end.verdict, Some(ComparisonResult::LoginRequest));

    let records = harness.store.all_records().expect("store should list");
    assert_eq!(records.len(), 1);
    let record = &records[0];

    let issued = echoed(&end.directive).expect("login should set a cookie");
    let client_ticket = harness.decode(&issued).expect("issued cookie should decode");
    let embedded = EmbeddedData::parse(&client_ticket.user_data);

    assert_eq!(embedded.key, Some(record.key));
    assert_eq!(
        Some(record.ticket_hash.clone()),
        compute_hash(&client_ticket, TEST_SALT).ok()
    );
    assert_eq!(embedded.hash.as_deref(), Some(record.ticket_hash.as_str()));
    assert_eq!(record.ticket_payload, "roles=admin");
    assert_eq!(record.subject, "alice");
    assert_eq!(record.host_address, HOST);
    assert!(record.ticket_is_persistent);
    assert_eq!(issued.expires, Some(client_ticket.expiration));
}

// ═══════════════════════════════════════════════════════════════════════
// Lifecycle
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_returning_client_sees_original_payload() {
    let harness = GuardHarness::new();
    let cookie = harness.login("alice", HOST).expect("login should succeed");

    let (begin, end) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");

    assert_eq!(begin.status, AuthStatus::Valid);
    assert_eq!(begin.subject(), Some("alice"));
    assert_eq!(end.verdict, None);
    assert_eq!(end.directive, CookieDirective::Keep);

    let downstream = begin
        .downstream_cookie
        .expect("valid request should have a downstream cookie");
    let seen = harness.decode(&downstream).expect("substitute should decode");
    assert_eq!(seen.user_data, "roles=user");
    assert_eq!(seen.name, "alice");
}

#[test]
fn test_logout_revokes_record() {
    let harness = GuardHarness::new();
    let cookie = harness.login("alice", HOST).expect("login should succeed");
    let logout = harness.guard.clear_cookie();

    let (_, end) = harness
        .round_trip(HOST, Some(&cookie), Some(&logout))
        .expect("round trip should succeed");

    assert_eq!(end.verdict, Some(ComparisonResult::LogoutRequest));
    assert!(matches!(end.directive, CookieDirective::Clear(_)));
    assert!(harness.store.all_keys().expect("store should list").is_empty());

    // The old cookie no longer resolves to a record.
    let (begin, end) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");
    assert_eq!(begin.status, AuthStatus::Invalid);
    assert!(!begin.malicious);
    assert_eq!(end.verdict, Some(ComparisonResult::LogoutRequest));
}

#[test]
fn test_stolen_cookie_from_other_host_is_malicious() {
    let harness = GuardHarness::new();
    let cookie = harness.login("alice", HOST).expect("login should succeed");

    let (begin, end) = harness
        .round_trip("203.0.113.9", Some(&cookie), None)
        .expect("round trip should succeed");

    assert_eq!(begin.status, AuthStatus::Invalid);
    assert!(begin.malicious);
    assert_eq!(
        begin.scope.before().malicious_layers(),
        vec!["shadow_record"]
    );
    assert_eq!(end.verdict, Some(ComparisonResult::MaliciousRequest));

    // Malice clears the client credential but leaves the record alone.
    assert_eq!(harness.store.all_keys().expect("store should list").len(), 1);
}

#[test]
fn test_other_host_allowed_without_enforcement() {
    let harness = GuardHarness::with_config(test_config().with_enforce_host_address(false));
    let cookie = harness.login("alice", HOST).expect("login should succeed");

    let (begin, _) = harness
        .round_trip("203.0.113.9", Some(&cookie), None)
        .expect("round trip should succeed");
    assert_eq!(begin.status, AuthStatus::Valid);
}

#[test]
fn test_tampered_hash_is_malicious() {
    let harness = GuardHarness::new();
    let cookie = harness.login("alice", HOST).expect("login should succeed");
    let ticket = harness.decode(&cookie).expect("cookie should decode");
    let key = EmbeddedData::parse(&ticket.user_data)
        .key
        .expect("login should embed a key");

    let tampered = ticket.with_user_data(pack(&"f".repeat(HASH_HEX_LENGTH), key));
    let cookie = harness.cookie_for(&tampered).expect("cookie should encode");

    let (begin, _) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");
    assert!(begin.malicious);
    assert!(!begin.scope.before().shadow.checks.hash_match);
}

#[test]
fn test_subject_swap_is_malicious() {
    let harness = GuardHarness::new();
    let cookie = harness.login("alice", HOST).expect("login should succeed");
    let ticket = harness.decode(&cookie).expect("cookie should decode");

    let swapped = CredentialTicket {
        name: "mallory".to_string(),
        ..ticket
    };
    let cookie = harness.cookie_for(&swapped).expect("cookie should encode");

    let (begin, _) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");
    assert!(begin.malicious);
    let before = begin.scope.before();
    assert!(!before.shadow.checks.subject_match);
    // The embedded hash still matches the record; it no longer matches the
    // ticket it rides in.
    assert!(before.shadow.checks.hash_match);
    assert!(!before.ticket.checks.user_data_hash_valid);
}

#[test]
fn test_natural_expiry_is_logout() {
    let harness = GuardHarness::new();
    let ticket = harness
        .guard
        .create_ticket("alice", true, "")
        .expect("ticket should be created");
    let minted = harness.cookie_for(&ticket).expect("cookie should encode");
    let (_, end) = harness
        .round_trip(HOST, None, Some(&minted))
        .expect("round trip should succeed");
    let cookie = echoed(&end.directive).expect("login should set a cookie");

    harness.clock.advance(Duration::hours(1));

    let (begin, end) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");
    assert_eq!(begin.status, AuthStatus::NotFound);
    assert!(!begin.malicious);
    assert!(begin.scope.before().cookie.is_expired());
    assert_eq!(end.verdict, Some(ComparisonResult::LogoutRequest));
    assert!(matches!(end.directive, CookieDirective::Clear(_)));

    // Expired records were purged when the request arrived.
    assert!(harness.store.is_empty());
}

#[test]
fn test_login_over_stale_credential_registers_new_record() {
    let harness = GuardHarness::new();
    let stale = harness.login("alice", HOST).expect("login should succeed");
    harness
        .guard
        .revoke_subject("alice")
        .expect("revocation should succeed");

    let ticket = harness
        .guard
        .create_ticket("alice", false, "roles=user")
        .expect("ticket should be created");
    let fresh = harness.cookie_for(&ticket).expect("cookie should encode");

    let (begin, end) = harness
        .round_trip(HOST, Some(&stale), Some(&fresh))
        .expect("round trip should succeed");
    assert_eq!(begin.status, AuthStatus::Invalid);
    assert_eq!(end.verdict, Some(ComparisonResult::AuthenticatedRequest));
    let reissued = echoed(&end.directive).expect("a new record should be registered");

    let (begin, _) = harness
        .round_trip(HOST, Some(&reissued), None)
        .expect("round trip should succeed");
    assert_eq!(begin.status, AuthStatus::Valid);
    assert_eq!(harness.store.all_keys().expect("store should list").len(), 1);
}

#[test]
fn test_sliding_expiration_renews_old_ticket() {
    let harness = GuardHarness::with_config(test_config().with_sliding_expiration(true));
    let cookie = harness.login("alice", HOST).expect("login should succeed");
    let original = harness.decode(&cookie).expect("cookie should decode");

    // Early in the lifetime nothing happens.
    harness.clock.advance(Duration::minutes(5));
    let (_, end) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");
    assert!(!end.renewed);
    assert_eq!(end.directive, CookieDirective::Keep);

    // Past the halfway mark the ticket and record are extended.
    harness.clock.advance(Duration::minutes(15));
    let (_, end) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");
    assert!(end.renewed);
    let renewed = echoed(&end.directive).expect("renewal should set a cookie");
    let ticket = harness.decode(&renewed).expect("renewed cookie should decode");
    assert_eq!(ticket.issue_date, original.issue_date);
    assert_eq!(ticket.expiration, harness.clock.now() + Duration::minutes(30));

    // The renewed cookie outlives the original.
    harness.clock.advance(Duration::minutes(20));
    let (begin, _) = harness
        .round_trip(HOST, Some(&renewed), None)
        .expect("round trip should succeed");
    assert_eq!(begin.status, AuthStatus::Valid);
}

#[test]
fn test_tracking_disabled_passes_cookie_through() {
    let harness = GuardHarness::with_config(test_config().with_enabled(false));
    let ticket = harness
        .guard
        .create_ticket("alice", false, "roles=user")
        .expect("ticket should be created");
    let cookie = harness.cookie_for(&ticket).expect("cookie should encode");

    let (begin, end) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");

    assert_eq!(begin.status, AuthStatus::Valid);
    assert_eq!(begin.downstream_cookie, Some(cookie));
    assert_eq!(end.verdict, None);
    assert!(harness.store.is_empty());
}

// ═══════════════════════════════════════════════════════════════════════
// Errors
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_example_salt_refused() {
    let result = GuardHarness::try_with_config(GuardConfig::new(EXAMPLE_HASH_SALT));
    assert!(matches!(result, Err(GuardError::ExampleHashSalt)));
}

#[test]
fn test_store_failure_propagates() {
    let clock = MutableClock::new(test_instant());
    let shared: Arc<dyn Clock> = Arc::new(clock);
    let store = Arc::new(MockTicketStore::new(shared.clone()));
    let guard = TicketGuard::new(test_config(), store.clone(), Arc::new(test_codec()), shared)
        .expect("guard should build");

    store.set_unavailable(true);
    let result = guard.begin_request(&context(HOST), None);
    assert!(matches!(result, Err(GuardError::Store(_))));
}

#[test]
fn test_inconsistent_principals_rejected() {
    use ticketguard_auth::Principal;

    let alice = Principal::authenticated("alice");
    let result = RequestContext::new(HOST, None, Some(&alice), Some(&Principal::anonymous()));
    assert_eq!(result, Err(GuardError::InconsistentPrincipal));
}

#[test]
fn test_unrepresentable_expiration_is_an_error() {
    let harness = GuardHarness::new();
    harness.clock.set(DateTime::<Utc>::MAX_UTC - Duration::minutes(1));

    let result = harness.guard.create_ticket("alice", false, "");
    assert!(matches!(result, Err(GuardError::InvalidConfiguration(_))));
}

#[test]
fn test_nil_key_is_recorded_as_a_miss() {
    let harness = GuardHarness::new();
    let ticket = harness
        .guard
        .create_ticket("alice", false, "")
        .expect("ticket should be created");
    let nil = TicketKey(uuid::Uuid::nil());
    let forged = ticket.with_user_data(pack(&"0".repeat(HASH_HEX_LENGTH), nil));
    let cookie = harness.cookie_for(&forged).expect("cookie should encode");

    let (begin, end) = harness
        .round_trip(HOST, Some(&cookie), None)
        .expect("round trip should succeed");

    let checks = begin.scope.before().ticket.checks;
    assert!(checks.user_data_contains_key);
    assert!(!checks.user_data_key_found);
    assert_eq!(begin.status, AuthStatus::Invalid);
    assert!(end.verdict.is_some());
}

#[test]
fn test_empty_subject_rejected() {
    let harness = GuardHarness::new();
    let result = harness.guard.create_ticket("", false, "");
    assert!(result.is_err_and(|e| e.is_contract_violation()));
}
