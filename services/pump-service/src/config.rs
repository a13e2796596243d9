use anyhow::Context;
use pp_core::ControllerConfig;
use std::net::SocketAddr;

const DEFAULT_ADDR: &str = "0.0.0.0:8080";

/// Process settings, read once at startup.
#[derive(Debug, Clone)]
pub(crate) struct ServiceConfig {
    pub(crate) addr: SocketAddr,
    /// RocksDB directory. The store is kept in memory when unset.
    pub(crate) store_path: Option<String>,
    pub(crate) controller: ControllerConfig,
}

impl ServiceConfig {
    pub(crate) fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let var = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());
        let mut controller = ControllerConfig::default();

        let addr = var("PUMP_SERVICE_ADDR")
            .unwrap_or_else(|| DEFAULT_ADDR.to_owned())
            .parse::<SocketAddr>()
            .context("PUMP_SERVICE_ADDR must be a socket address")?;

        if let Some(raw) = var("PUMP_RECONCILE_INTERVAL_MS") {
            controller.reconcile_interval_ms = raw
                .trim()
                .parse::<u64>()
                .context("PUMP_RECONCILE_INTERVAL_MS must be a number of milliseconds")?;
            anyhow::ensure!(
                controller.reconcile_interval_ms > 0,
                "PUMP_RECONCILE_INTERVAL_MS must be positive"
            );
        }

        if let Some(raw) = var("PUMP_DEFAULT_EXERCISE_MINUTES") {
            controller.default_exercise_minutes = raw
                .trim()
                .parse::<u32>()
                .context("PUMP_DEFAULT_EXERCISE_MINUTES must be a whole number of minutes")?;
            anyhow::ensure!(
                (1..=120).contains(&controller.default_exercise_minutes),
                "PUMP_DEFAULT_EXERCISE_MINUTES must be between 1 and 120"
            );
        }

        Ok(Self {
            addr,
            store_path: var("PUMP_STORE_PATH"),
            controller,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() -> anyhow::Result<()> {
        let config = ServiceConfig::from_lookup(lookup(&[]))?;
        assert_eq!(config.addr, "0.0.0.0:8080".parse::<SocketAddr>()?);
        assert_eq!(config.store_path, None);
        assert_eq!(config.controller, ControllerConfig::default());
        Ok(())
    }

    #[test]
    fn overrides_are_parsed() -> anyhow::Result<()> {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PUMP_SERVICE_ADDR", "127.0.0.1:9090"),
            ("PUMP_STORE_PATH", "/var/lib/pump"),
            ("PUMP_RECONCILE_INTERVAL_MS", "250"),
            ("PUMP_DEFAULT_EXERCISE_MINUTES", "45"),
        ]))?;
        assert_eq!(config.addr.port(), 9090);
        assert_eq!(config.store_path.as_deref(), Some("/var/lib/pump"));
        assert_eq!(config.controller.reconcile_interval_ms, 250);
        assert_eq!(config.controller.default_exercise_minutes, 45);
        Ok(())
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ServiceConfig::from_lookup(lookup(&[("PUMP_RECONCILE_INTERVAL_MS", "0")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("PUMP_DEFAULT_EXERCISE_MINUTES", "300")])).is_err());
        assert!(ServiceConfig::from_lookup(lookup(&[("PUMP_SERVICE_ADDR", "nowhere")])).is_err());
    }
}
