use crate::config::LogConfig;

/// Installs the global `tracing` subscriber. Plain text by default, JSON when
/// `LOG_FORMAT=json`.
pub fn init_tracing(cfg: &LogConfig) -> anyhow::Result<()> {
    let builder = tracing_subscriber::fmt().with_env_filter(cfg.filter.as_str());

    let res = if cfg.json {
        builder.with_target(false).json().try_init()
    } else {
        builder.try_init()
    };
    res.map_err(|e| anyhow::anyhow!(e.to_string()))?;

    tracing::debug!(filter = %cfg.filter, json = cfg.json, "tracing initialised");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_error() {
        let cfg = LogConfig {
            filter: "accounts=debug".into(),
            json: false,
        };
        // An earlier test may already have installed one.
        let _ = init_tracing(&cfg);
        assert!(init_tracing(&cfg).is_err());
    }
}
