use crate::config::{ConfigError, RegistrationConfig};
use crate::domain::baseline::BaselineStore;
use crate::domain::error::RegistrationError;
use crate::domain::identity::NodeIdentity;
use crate::domain::outcome::{Registration, StatusClass, classify};
use crate::domain::payload::{PAYLOAD_FORM_FIELD, RegistrationPayload};
use crate::transport::Transport;
use mk_facts::{ExclusionPattern, FactMapping, FactSource, FactsError};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Decides whether to register this node and performs the registration.
///
/// Attempts made through one manager never overlap. Each attempt collects
/// facts fresh, posts once and moves the baseline forward only when the
/// server answers 2xx.
pub struct RegistrationManager {
    config: RegistrationConfig,
    exclusion: Option<ExclusionPattern>,
    facts: Arc<dyn FactSource>,
    baseline: Arc<dyn BaselineStore>,
    transport: Arc<dyn Transport>,
    attempt_lock: Mutex<()>,
}

impl RegistrationManager {
    /// # Errors
    /// Returns `ConfigError` if the configuration does not validate.
    pub fn new(
        config: RegistrationConfig,
        facts: Arc<dyn FactSource>,
        baseline: Arc<dyn BaselineStore>,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let exclusion = config.exclusion()?;

        Ok(Self {
            config,
            exclusion,
            facts,
            baseline,
            transport,
            attempt_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn config(&self) -> &RegistrationConfig {
        &self.config
    }

    /// Register regardless of whether facts changed since the last success.
    ///
    /// # Errors
    /// Returns `RegistrationError` describing the failed step; the baseline
    /// is unchanged unless the error is `BaselinePersist`.
    pub async fn register_unconditionally(
        &self,
        last_state: &str,
    ) -> Result<Registration, RegistrationError> {
        check_last_state(last_state)?;
        let _guard = self.attempt_lock.lock().await;

        let facts = self.collect_facts().await?;
        self.send(&facts, last_state).await
    }

    /// Register only if the facts differ from the last accepted snapshot.
    ///
    /// `Ok(None)` means nothing changed and no request was sent.
    ///
    /// # Errors
    /// Same as [`register_unconditionally`](Self::register_unconditionally),
    /// plus `BaselineRead` when the baseline cannot be consulted.
    pub async fn register_if_changed(
        &self,
        last_state: &str,
    ) -> Result<Option<Registration>, RegistrationError> {
        check_last_state(last_state)?;
        let _guard = self.attempt_lock.lock().await;

        let facts = self.collect_facts().await?;
        let changed = self
            .baseline
            .has_changed(&facts)
            .map_err(RegistrationError::BaselineRead)?;
        if !changed {
            tracing::debug!(facts = facts.len(), "Facts unchanged; skipping registration");
            return Ok(None);
        }

        self.send(&facts, last_state).await.map(Some)
    }

    /// Facts the next attempt would send, exclusion applied
    ///
    /// # Errors
    /// Returns `RegistrationError::FactCollection` if collection fails.
    pub async fn collect_facts(&self) -> Result<FactMapping, RegistrationError> {
        let source = Arc::clone(&self.facts);
        let exclusion = self.exclusion.clone();

        let facts = tokio::task::spawn_blocking(move || source.collect(exclusion.as_ref()))
            .await
            .map_err(|e| {
                FactsError::SystemCollectionFailed(format!("fact collection task failed: {e}"))
            })??;

        Ok(facts)
    }

    async fn send(
        &self,
        facts: &FactMapping,
        last_state: &str,
    ) -> Result<Registration, RegistrationError> {
        let identity = NodeIdentity::derive(facts, self.config.identity_prefix_len)?;
        let document = RegistrationPayload::new(&identity, facts, last_state).to_json()?;

        tracing::info!(
            uri = %self.config.uri,
            node = %identity,
            last_state,
            facts = facts.len(),
            "Registering node"
        );

        let response = self
            .transport
            .post_form(&self.config.uri, &[(PAYLOAD_FORM_FIELD, document.as_str())])
            .await
            .inspect_err(|e| tracing::warn!(node = %identity, error = %e, "Registration request failed"))?;

        if classify(response.status) == StatusClass::Rejection {
            tracing::warn!(
                node = %identity,
                status = response.status,
                body = %response.body,
                "Server rejected registration"
            );
            return Err(RegistrationError::ServerRejection {
                status: response.status,
                body: response.body,
            });
        }

        self.baseline
            .save(facts)
            .map_err(|source| RegistrationError::BaselinePersist {
                status: response.status,
                source,
            })?;

        tracing::info!(node = %identity, status = response.status, "Registration accepted");

        Ok(Registration {
            identity,
            status: response.status,
            body: response.body,
            fact_count: facts.len(),
        })
    }
}

fn check_last_state(last_state: &str) -> Result<(), RegistrationError> {
    if last_state.trim().is_empty() {
        return Err(RegistrationError::InvalidLastState);
    }
    Ok(())
}
