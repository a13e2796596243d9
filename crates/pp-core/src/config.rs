use serde::{Deserialize, Deserializer, Serialize, de};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Minutes preselected when the exercise picker opens.
    pub default_exercise_minutes: u32,
    /// Upper bound on events processed in one settle cycle. Never below 1.
    #[serde(deserialize_with = "non_zero_rounds")]
    pub max_settle_rounds: usize,
    /// Period of the reconciliation tick run by hosts.
    pub reconcile_interval_ms: u64,
}

impl ControllerConfig {
    /// Settle bound actually applied; a zero set in code still lets one event through.
    pub fn settle_limit(&self) -> usize {
        self.max_settle_rounds.max(1)
    }
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            default_exercise_minutes: 30,
            max_settle_rounds: 64,
            reconcile_interval_ms: 1_000,
        }
    }
}

fn non_zero_rounds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<usize, D::Error> {
    let rounds = usize::deserialize(deserializer)?;
    if rounds == 0 {
        return Err(de::Error::custom("max_settle_rounds must be at least 1"));
    }
    Ok(rounds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ControllerConfig = serde_json::from_str(r#"{ "max_settle_rounds": 8 }"#).unwrap();
        assert_eq!(config.max_settle_rounds, 8);
        assert_eq!(config.default_exercise_minutes, 30);
        assert_eq!(config.reconcile_interval_ms, 1_000);
    }

    #[test]
    fn zero_settle_rounds_rejected() {
        let err = serde_json::from_str::<ControllerConfig>(r#"{ "max_settle_rounds": 0 }"#)
            .unwrap_err();
        assert!(err.to_string().contains("at least 1"));
    }

    #[test]
    fn settle_limit_clamps_zero() {
        let config = ControllerConfig {
            max_settle_rounds: 0,
            ..ControllerConfig::default()
        };
        assert_eq!(config.settle_limit(), 1);
        assert_eq!(ControllerConfig::default().settle_limit(), 64);
    }
}
