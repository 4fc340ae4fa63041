//! Engine factory
//!
//! Produces ready-to-use engine adapters. Availability is the intersection
//! of the injected feature flags and per-engine settings; selection follows
//! a fixed precedence: explicit name, request metadata, interactive prompt
//! (only when permitted), then error.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::engines::bridge::{BridgeSettings, SubprocessBridge};
use crate::engines::dbt::DbtEngine;
use crate::engines::flags::FeatureFlags;
use crate::engines::sqlmesh::SqlmeshEngine;
use crate::engines::{EngineAdapter, EngineKind};
use crate::errors::PipeformError;
use crate::storage::settings::Settings;

/// Engine hints carried by an inbound request, in precedence order
#[derive(Debug, Clone, Default)]
pub struct RequestMeta {
    /// Dedicated engine header value
    pub header: Option<String>,

    /// `engine` query parameter
    pub query: Option<String>,

    /// `engine` body field
    pub body: Option<String>,
}

impl RequestMeta {
    /// First hint present, header before query before body
    fn first_hint(&self) -> Option<&str> {
        self.header
            .as_deref()
            .or(self.query.as_deref())
            .or(self.body.as_deref())
    }
}

/// Factory for engine adapters
pub struct EngineFactory {
    flags: FeatureFlags,
    project_path: String,
    call_timeout: Duration,
    dbt_enabled: bool,
    dbt_executable: String,
    sqlmesh_enabled: bool,
    sqlmesh_executable: String,
    allow_interactive: bool,
    strict: bool,
}

impl EngineFactory {
    /// Build a factory from settings plus injected feature flags
    pub fn new(settings: &Settings, flags: FeatureFlags) -> Self {
        Self {
            flags,
            project_path: settings.project_path.clone(),
            call_timeout: Duration::from_millis(settings.call_timeout_ms),
            dbt_enabled: settings.engines.dbt.enabled,
            dbt_executable: settings.engines.dbt.executable.clone(),
            sqlmesh_enabled: settings.engines.sqlmesh.enabled,
            sqlmesh_executable: settings.engines.sqlmesh.executable.clone(),
            allow_interactive: settings.allow_interactive_selection,
            strict: settings.strict_installation_check,
        }
    }

    /// Engines that are both flag-enabled and configured as enabled
    pub fn available_engines(&self) -> Vec<EngineKind> {
        EngineKind::all()
            .into_iter()
            .filter(|kind| self.is_available(*kind))
            .collect()
    }

    fn is_available(&self, kind: EngineKind) -> bool {
        let configured = match kind {
            EngineKind::Dbt => self.dbt_enabled,
            EngineKind::Sqlmesh => self.sqlmesh_enabled,
        };
        configured && self.flags.is_enabled(kind)
    }

    /// Resolve which engine a call should use.
    ///
    /// Precedence: explicit name, then request metadata, then an interactive
    /// prompt when permitted. Unknown names fail rather than fall through.
    pub fn resolve(
        &self,
        explicit: Option<&str>,
        meta: Option<&RequestMeta>,
    ) -> Result<EngineKind, PipeformError> {
        if let Some(name) = explicit {
            return self.parse_known(name);
        }

        if let Some(hint) = meta.and_then(|m| m.first_hint()) {
            return self.parse_known(hint);
        }

        if self.allow_interactive {
            return self.select_interactive();
        }

        Err(PipeformError::SelectionError(
            "no engine specified and none could be inferred from the request".to_string(),
        ))
    }

    /// Resolve strictly from request metadata; never prompts.
    ///
    /// Intended for HTTP boundary guards, where an unresolvable engine must
    /// become a client error instead of an interactive fallback.
    pub fn resolve_from_request(&self, meta: &RequestMeta) -> Result<EngineKind, PipeformError> {
        match meta.first_hint() {
            Some(hint) => self.parse_known(hint),
            None => Err(PipeformError::SelectionError(
                "no engine specified in request header, query or body".to_string(),
            )),
        }
    }

    fn parse_known(&self, name: &str) -> Result<EngineKind, PipeformError> {
        EngineKind::parse(name).ok_or_else(|| {
            PipeformError::SelectionError(format!("unknown engine '{}'", name.trim()))
        })
    }

    /// Construct an adapter for `kind`.
    ///
    /// Fails when the engine is not in the available set, or (in strict
    /// mode) when its installation does not validate.
    pub async fn create(&self, kind: EngineKind) -> Result<Arc<dyn EngineAdapter>, PipeformError> {
        if !self.is_available(kind) {
            return Err(PipeformError::SelectionError(format!(
                "engine '{}' is not available (enabled engines: {:?})",
                kind,
                self.available_engines()
                    .iter()
                    .map(|k| k.as_str())
                    .collect::<Vec<_>>()
            )));
        }

        let adapter = self.build(kind);

        if self.strict && !adapter.validate_installation().await {
            return Err(PipeformError::SelectionError(format!(
                "engine '{}' is not installed or not usable",
                kind
            )));
        }

        debug!("Constructed {} engine adapter", kind);
        Ok(adapter)
    }

    fn build(&self, kind: EngineKind) -> Arc<dyn EngineAdapter> {
        let executable = match kind {
            EngineKind::Dbt => &self.dbt_executable,
            EngineKind::Sqlmesh => &self.sqlmesh_executable,
        };
        let settings = BridgeSettings::new(executable, &self.project_path)
            .with_call_timeout(self.call_timeout);
        let bridge = SubprocessBridge::new(settings, self.flags.is_enabled(kind));

        match kind {
            EngineKind::Dbt => Arc::new(DbtEngine::new(bridge)),
            EngineKind::Sqlmesh => Arc::new(SqlmeshEngine::new(bridge)),
        }
    }

    /// Prompt on the terminal for an engine choice
    fn select_interactive(&self) -> Result<EngineKind, PipeformError> {
        let available = self.available_engines();
        if available.is_empty() {
            return Err(PipeformError::SelectionError(
                "no engines are enabled".to_string(),
            ));
        }

        let names: Vec<&str> = available.iter().map(|k| k.as_str()).collect();
        print!("Select engine [{}]: ", names.join(", "));
        std::io::stdout()
            .flush()
            .map_err(|e| PipeformError::SelectionError(e.to_string()))?;

        let mut line = String::new();
        std::io::stdin()
            .read_line(&mut line)
            .map_err(|e| PipeformError::SelectionError(e.to_string()))?;

        let kind = self.parse_known(&line)?;
        info!("Interactively selected engine: {}", kind);
        Ok(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory_with(flags: FeatureFlags) -> EngineFactory {
        EngineFactory::new(&Settings::default(), flags)
    }

    fn all_enabled() -> FeatureFlags {
        let mut map = std::collections::HashMap::new();
        map.insert("dbt_transformations".to_string(), true);
        map.insert("sqlmesh_transformations".to_string(), true);
        FeatureFlags::new(map)
    }

    #[test]
    fn test_available_engines_intersects_flags_and_config() {
        let factory = factory_with(FeatureFlags::safe_default());
        // dbt is configured enabled but flag-disabled by the safe default
        assert_eq!(factory.available_engines(), vec![EngineKind::Sqlmesh]);
    }

    #[test]
    fn test_explicit_name_beats_metadata() {
        let factory = factory_with(all_enabled());
        let meta = RequestMeta {
            header: Some("sqlmesh".to_string()),
            ..Default::default()
        };
        let kind = factory.resolve(Some("dbt"), Some(&meta)).unwrap();
        assert_eq!(kind, EngineKind::Dbt);
    }

    #[test]
    fn test_metadata_precedence_header_query_body() {
        let factory = factory_with(all_enabled());

        let meta = RequestMeta {
            header: Some("DBT".to_string()),
            query: Some("sqlmesh".to_string()),
            body: Some("sqlmesh".to_string()),
        };
        assert_eq!(factory.resolve(None, Some(&meta)).unwrap(), EngineKind::Dbt);

        let meta = RequestMeta {
            header: None,
            query: Some("sqlmesh".to_string()),
            body: Some("dbt".to_string()),
        };
        assert_eq!(
            factory.resolve(None, Some(&meta)).unwrap(),
            EngineKind::Sqlmesh
        );

        let meta = RequestMeta {
            header: None,
            query: None,
            body: Some("dbt".to_string()),
        };
        assert_eq!(factory.resolve(None, Some(&meta)).unwrap(), EngineKind::Dbt);
    }

    #[test]
    fn test_unknown_engine_fails() {
        let factory = factory_with(all_enabled());
        let err = factory.resolve(Some("spark"), None).unwrap_err();
        assert!(matches!(err, PipeformError::SelectionError(_)));
    }

    #[test]
    fn test_no_engine_resolvable_fails_without_interactive() {
        let factory = factory_with(all_enabled());
        let err = factory.resolve(None, None).unwrap_err();
        assert!(matches!(err, PipeformError::SelectionError(_)));
    }

    #[tokio::test]
    async fn test_create_rejects_unavailable_engine() {
        let factory = factory_with(FeatureFlags::safe_default());
        let err = factory.create(EngineKind::Dbt).await.unwrap_err();
        assert!(matches!(err, PipeformError::SelectionError(_)));
    }
}
