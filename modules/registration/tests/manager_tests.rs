#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Integration tests for the registration manager
//!
//! The transport and baseline are in-process fakes, so every test can see
//! exactly what would have gone over the wire and what was persisted.

use async_trait::async_trait;
use mk_facts::{FactMapping, StaticFactSource};
use mk_registration::{
    BaselineError, BaselineStore, FileBaselineStore, InMemoryBaselineStore, PAYLOAD_FORM_FIELD,
    RegistrationConfig, RegistrationError, RegistrationManager, Transport, TransportError,
    TransportResponse,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

const URI: &str = "http://razor.test:8026/razor/api/node/register";

/// One captured POST
#[derive(Debug, Clone)]
struct SentForm {
    uri: String,
    fields: Vec<(String, String)>,
}

impl SentForm {
    fn document(&self) -> Value {
        let (name, value) = &self.fields[0];
        assert_eq!(name, PAYLOAD_FORM_FIELD);
        serde_json::from_str(value).unwrap()
    }
}

/// Records every request and answers from a script (200 "ok" once exhausted)
#[derive(Default)]
struct RecordingTransport {
    sent: Mutex<Vec<SentForm>>,
    script: Mutex<VecDeque<Result<TransportResponse, TransportError>>>,
}

impl RecordingTransport {
    fn answering(responses: Vec<Result<TransportResponse, TransportError>>) -> Arc<Self> {
        Arc::new(Self {
            sent: Mutex::default(),
            script: Mutex::new(responses.into()),
        })
    }

    fn sent(&self) -> Vec<SentForm> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for RecordingTransport {
    async fn post_form(
        &self,
        uri: &str,
        fields: &[(&str, &str)],
    ) -> Result<TransportResponse, TransportError> {
        self.sent.lock().unwrap().push(SentForm {
            uri: uri.to_owned(),
            fields: fields
                .iter()
                .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
                .collect(),
        });
        self.script.lock().unwrap().pop_front().unwrap_or_else(|| {
            Ok(TransportResponse {
                status: 200,
                body: "ok".to_owned(),
            })
        })
    }
}

/// Reads fine, refuses every write
struct ReadOnlyBaselineStore;

impl BaselineStore for ReadOnlyBaselineStore {
    fn has_changed(&self, _current: &FactMapping) -> Result<bool, BaselineError> {
        Ok(true)
    }

    fn save(&self, _current: &FactMapping) -> Result<(), BaselineError> {
        Err(BaselineError::Io {
            path: "/read-only/baseline.json".into(),
            source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
        })
    }

    fn load(&self) -> Result<Option<FactMapping>, BaselineError> {
        Ok(None)
    }
}

/// Mutable fact source so a test can change the node between attempts
#[derive(Default)]
struct SwitchableFactSource {
    facts: Mutex<FactMapping>,
}

impl SwitchableFactSource {
    fn set(&self, facts: FactMapping) {
        *self.facts.lock().unwrap() = facts;
    }
}

impl mk_facts::FactSource for SwitchableFactSource {
    fn collect(
        &self,
        exclude: Option<&mk_facts::ExclusionPattern>,
    ) -> Result<FactMapping, mk_facts::FactsError> {
        let mut facts = self.facts.lock().unwrap().clone();
        if let Some(pattern) = exclude {
            pattern.apply(&mut facts);
        }
        Ok(facts)
    }
}

fn facts(pairs: &[(&str, &str)]) -> FactMapping {
    let mut facts = FactMapping::new();
    for (name, value) in pairs {
        facts.insert(*name, *value);
    }
    facts
}

fn scenario_facts() -> FactMapping {
    facts(&[("hostname", "mk0001"), ("os", "linux")])
}

fn config() -> RegistrationConfig {
    RegistrationConfig {
        uri: URI.to_owned(),
        ..RegistrationConfig::default()
    }
}

fn manager(
    facts: FactMapping,
    baseline: Arc<dyn BaselineStore>,
    transport: Arc<RecordingTransport>,
) -> RegistrationManager {
    RegistrationManager::new(
        config(),
        Arc::new(StaticFactSource::new(facts)),
        baseline,
        transport,
    )
    .unwrap()
}

fn rejection(status: u16, body: &str) -> Result<TransportResponse, TransportError> {
    Ok(TransportResponse {
        status,
        body: body.to_owned(),
    })
}

#[tokio::test]
async fn test_first_registration_sends_facts_and_saves_baseline() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![]);
    let manager = manager(scenario_facts(), baseline.clone(), transport.clone());

    let registration = manager.register_if_changed("booted").await.unwrap().unwrap();

    assert_eq!(registration.status, 200);
    assert_eq!(registration.body, "ok");
    assert_eq!(registration.identity.as_str(), "0001");
    assert_eq!(registration.fact_count, 2);

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].uri, URI);
    assert_eq!(sent[0].fields.len(), 1, "exactly one form field");
    assert_eq!(
        sent[0].document(),
        serde_json::json!({
            "@uuid": "0001",
            "@attributes_hash": {"hostname": "mk0001", "os": "linux"},
            "@last_state": "booted"
        })
    );

    assert_eq!(baseline.load().unwrap(), Some(scenario_facts()));
}

#[tokio::test]
async fn test_unchanged_facts_make_no_request() {
    let baseline = Arc::new(InMemoryBaselineStore::with_baseline(scenario_facts()));
    let transport = RecordingTransport::answering(vec![]);
    let manager = manager(scenario_facts(), baseline.clone(), transport.clone());

    let outcome = manager.register_if_changed("booted").await.unwrap();

    assert!(outcome.is_none());
    assert!(transport.sent().is_empty());
    assert_eq!(baseline.load().unwrap(), Some(scenario_facts()));
}

#[tokio::test]
async fn test_second_conditional_attempt_is_a_no_op() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![]);
    let manager = manager(scenario_facts(), baseline, transport.clone());

    assert!(manager.register_if_changed("booted").await.unwrap().is_some());
    assert!(manager.register_if_changed("booted").await.unwrap().is_none());
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_unconditional_registration_always_sends() {
    let baseline = Arc::new(InMemoryBaselineStore::with_baseline(scenario_facts()));
    let transport = RecordingTransport::answering(vec![]);
    let manager = manager(scenario_facts(), baseline, transport.clone());

    manager.register_unconditionally("booted").await.unwrap();
    manager.register_unconditionally("installed").await.unwrap();

    let sent = transport.sent();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[1].document()["@last_state"], "installed");
}

#[tokio::test]
async fn test_server_error_leaves_baseline_untouched() {
    let baseline = Arc::new(InMemoryBaselineStore::with_baseline(scenario_facts()));
    let transport = RecordingTransport::answering(vec![rejection(500, "internal error")]);
    let changed = facts(&[("hostname", "mk0001"), ("os", "freebsd")]);
    let manager = manager(changed.clone(), baseline.clone(), transport.clone());

    let err = manager.register_if_changed("booted").await.unwrap_err();

    match &err {
        RegistrationError::ServerRejection { status, body } => {
            assert_eq!(*status, 500);
            assert_eq!(body, "internal error");
        }
        other => panic!("expected ServerRejection, got {other}"),
    }
    assert!(err.is_retryable());
    assert_eq!(transport.sent().len(), 1);
    assert_eq!(baseline.load().unwrap(), Some(scenario_facts()));
    assert!(baseline.has_changed(&changed).unwrap());
}

#[tokio::test]
async fn test_client_error_is_not_retryable() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![rejection(400, "bad request")]);
    let manager = manager(scenario_facts(), baseline.clone(), transport);

    let err = manager.register_unconditionally("booted").await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(!err.is_retryable());
    assert!(baseline.load().unwrap().is_none());
}

#[tokio::test]
async fn test_redirect_status_is_a_rejection() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![rejection(302, "")]);
    let manager = manager(scenario_facts(), baseline.clone(), transport);

    let err = manager.register_unconditionally("booted").await.unwrap_err();

    assert!(matches!(err, RegistrationError::ServerRejection { status: 302, .. }));
    assert!(baseline.load().unwrap().is_none());
}

#[tokio::test]
async fn test_transport_failure_leaves_baseline_untouched() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![Err(TransportError::Timeout(
        Duration::from_secs(30),
    ))]);
    let manager = manager(scenario_facts(), baseline.clone(), transport);

    let err = manager.register_if_changed("booted").await.unwrap_err();

    assert!(matches!(err, RegistrationError::Transport(_)));
    assert!(err.is_retryable());
    assert!(baseline.load().unwrap().is_none());
}

#[tokio::test]
async fn test_failed_attempt_is_retried_by_next_conditional_call() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![rejection(503, "busy")]);
    let manager = manager(scenario_facts(), baseline.clone(), transport.clone());

    assert!(manager.register_if_changed("booted").await.is_err());
    let second = manager.register_if_changed("booted").await.unwrap();

    assert!(second.is_some());
    assert_eq!(transport.sent().len(), 2);
    assert_eq!(baseline.load().unwrap(), Some(scenario_facts()));
}

#[tokio::test]
async fn test_short_hostname_fails_before_any_request() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![]);
    let manager = manager(
        facts(&[("hostname", "mk"), ("os", "linux")]),
        baseline.clone(),
        transport.clone(),
    );

    let err = manager.register_unconditionally("booted").await.unwrap_err();

    assert!(matches!(err, RegistrationError::IdentityDerivation(_)));
    assert!(transport.sent().is_empty());
    assert!(baseline.load().unwrap().is_none());
}

#[tokio::test]
async fn test_missing_hostname_fails_before_any_request() {
    let transport = RecordingTransport::answering(vec![]);
    let manager = manager(
        facts(&[("os", "linux")]),
        Arc::new(InMemoryBaselineStore::new()),
        transport.clone(),
    );

    let err = manager.register_if_changed("booted").await.unwrap_err();

    assert!(matches!(err, RegistrationError::IdentityDerivation(_)));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_empty_last_state_is_rejected() {
    let transport = RecordingTransport::answering(vec![]);
    let manager = manager(
        scenario_facts(),
        Arc::new(InMemoryBaselineStore::new()),
        transport.clone(),
    );

    assert!(matches!(
        manager.register_unconditionally("").await,
        Err(RegistrationError::InvalidLastState)
    ));
    assert!(matches!(
        manager.register_if_changed("  ").await,
        Err(RegistrationError::InvalidLastState)
    ));
    assert!(transport.sent().is_empty());
}

#[tokio::test]
async fn test_exclusion_applies_to_sent_and_saved_facts() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![]);
    let source = facts(&[
        ("hostname", "mk0001"),
        ("uptime_seconds", "42"),
        ("mk_hw_uptime_probe", "1"),
        ("os", "linux"),
    ]);
    let manager = RegistrationManager::new(
        RegistrationConfig {
            exclude_pattern: Some("uptime".to_owned()),
            ..config()
        },
        Arc::new(StaticFactSource::new(source)),
        baseline.clone(),
        transport.clone(),
    )
    .unwrap();

    manager.register_unconditionally("booted").await.unwrap();

    let document = transport.sent()[0].document();
    let attributes = document["@attributes_hash"].as_object().unwrap();
    assert!(attributes.keys().all(|name| !name.contains("uptime")));
    assert_eq!(attributes.len(), 2);
    assert_eq!(baseline.load().unwrap(), Some(scenario_facts()));
}

#[tokio::test]
async fn test_excluded_fact_change_does_not_trigger_registration() {
    let source = Arc::new(SwitchableFactSource::default());
    let mut before = scenario_facts();
    before.insert("uptime_seconds", 10_i64);
    source.set(before);

    let transport = RecordingTransport::answering(vec![]);
    let manager = RegistrationManager::new(
        RegistrationConfig {
            exclude_pattern: Some("^uptime".to_owned()),
            ..config()
        },
        source.clone(),
        Arc::new(InMemoryBaselineStore::new()),
        transport.clone(),
    )
    .unwrap();

    assert!(manager.register_if_changed("booted").await.unwrap().is_some());

    let mut after = scenario_facts();
    after.insert("uptime_seconds", 99_i64);
    source.set(after);
    assert!(manager.register_if_changed("booted").await.unwrap().is_none());

    source.set(facts(&[("hostname", "mk0001"), ("os", "freebsd")]));
    assert!(manager.register_if_changed("booted").await.unwrap().is_some());
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn test_collect_facts_applies_exclusion() {
    let manager = RegistrationManager::new(
        RegistrationConfig {
            exclude_pattern: Some("^os$".to_owned()),
            ..config()
        },
        Arc::new(StaticFactSource::new(scenario_facts())),
        Arc::new(InMemoryBaselineStore::new()),
        RecordingTransport::answering(vec![]),
    )
    .unwrap();

    let collected = manager.collect_facts().await.unwrap();
    assert_eq!(collected, facts(&[("hostname", "mk0001")]));
}

#[tokio::test]
async fn test_baseline_save_failure_reports_accepted_status() {
    let transport = RecordingTransport::answering(vec![rejection(201, "created")]);
    let manager = manager(scenario_facts(), Arc::new(ReadOnlyBaselineStore), transport.clone());

    let err = manager.register_unconditionally("booted").await.unwrap_err();

    assert!(matches!(
        err,
        RegistrationError::BaselinePersist { status: 201, .. }
    ));
    assert!(!err.is_retryable());
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_file_baseline_survives_manager_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("mk_prev_facts.json");
    let transport = RecordingTransport::answering(vec![]);

    let first = manager(
        scenario_facts(),
        Arc::new(FileBaselineStore::new(&path)),
        transport.clone(),
    );
    assert!(first.register_if_changed("booted").await.unwrap().is_some());
    drop(first);

    let second = manager(
        scenario_facts(),
        Arc::new(FileBaselineStore::new(&path)),
        transport.clone(),
    );
    assert!(second.register_if_changed("booted").await.unwrap().is_none());
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_concurrent_attempts_are_serialized() {
    let baseline = Arc::new(InMemoryBaselineStore::new());
    let transport = RecordingTransport::answering(vec![]);
    let manager = Arc::new(manager(scenario_facts(), baseline, transport.clone()));

    let a = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.register_if_changed("booted").await }
    });
    let b = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.register_if_changed("booted").await }
    });

    let results = [a.await.unwrap().unwrap(), b.await.unwrap().unwrap()];

    // The second attempt sees the baseline saved by the first
    assert_eq!(results.iter().filter(|r| r.is_some()).count(), 1);
    assert_eq!(transport.sent().len(), 1);
}

#[test]
fn test_invalid_config_is_rejected_at_construction() {
    let result = RegistrationManager::new(
        RegistrationConfig {
            identity_prefix_len: 0,
            ..config()
        },
        Arc::new(StaticFactSource::new(scenario_facts())),
        Arc::new(InMemoryBaselineStore::new()),
        RecordingTransport::answering(vec![]),
    );
    assert!(result.is_err());
}
