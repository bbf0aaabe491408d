use crate::error::ErrorContext;
use crate::types::{Config, SubprobeError};
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

pub fn load_config(config_path_str: &str) -> Result<Config, SubprobeError> {
    let mut config = Config::default();

    if Path::new(config_path_str).exists() {
        let contents = fs::read_to_string(config_path_str)
            .with_context(|| format!("Failed to read config file {}", config_path_str))?;
        apply_toml(&mut config, &contents)?;
    } else {
        log::warn!("Config file {} not found, using defaults", config_path_str);
    }

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

/// Config used when no file is given: defaults plus environment overrides.
pub fn default_config() -> Result<Config, SubprobeError> {
    let mut config = Config::default();
    apply_env_overrides(&mut config);
    validate_config(&config)?;
    Ok(config)
}

fn apply_toml(config: &mut Config, contents: &str) -> Result<(), SubprobeError> {
    let toml_config: toml::Value =
        toml::from_str(contents).with_context(|| "Failed to parse config file".to_string())?;

    let Some(table) = toml_config.as_table() else {
        return Ok(());
    };

    if let Some(ua) = table.get("user_agent").and_then(|v| v.as_str()) {
        config.user_agent = ua.to_string();
    }
    if let Some(proxy) = table.get("proxy").and_then(|v| v.as_str()) {
        config.proxy = Some(proxy.to_string());
    }
    if let Some(secs) = table.get("probe_timeout").and_then(|v| v.as_integer()) {
        config.probe_timeout = seconds("probe_timeout", secs)?;
    }
    if let Some(depth) = table.get("max_cname_depth").and_then(|v| v.as_integer()) {
        config.max_cname_depth = usize::try_from(depth)
            .with_context(|| "max_cname_depth must not be negative".to_string())?;
    }

    if let Some(limits) = table.get("rate_limits").and_then(|v| v.as_table()) {
        for (key, value) in limits {
            let limit = value.as_integer().and_then(|n| u32::try_from(n).ok());
            config.rate_limits.insert(key.clone(), limit);
        }
    }

    if let Some(aggregator) = table.get("aggregator").and_then(|v| v.as_table()) {
        if let Some(enabled) = aggregator.get("enabled").and_then(|v| v.as_bool()) {
            config.aggregator.enabled = enabled;
        }
        if let Some(url) = aggregator.get("url").and_then(|v| v.as_str()) {
            config.aggregator.url = url.to_string();
        }
        if let Some(secs) = aggregator.get("timeout").and_then(|v| v.as_integer()) {
            config.aggregator.timeout = seconds("aggregator.timeout", secs)?;
        }
    }

    if let Some(resolver) = table.get("resolver").and_then(|v| v.as_table()) {
        if let Some(secs) = resolver.get("timeout").and_then(|v| v.as_integer()) {
            config.resolver.timeout = seconds("resolver.timeout", secs)?;
        }
        if let Some(attempts) = resolver.get("attempts").and_then(|v| v.as_integer()) {
            config.resolver.attempts = usize::try_from(attempts)
                .with_context(|| "resolver.attempts must not be negative".to_string())?;
        }
        if let Some(system) = resolver.get("use_system_resolver").and_then(|v| v.as_bool()) {
            config.resolver.use_system_resolver = system;
        }
        if let Some(servers) = resolver.get("nameservers").and_then(|v| v.as_array()) {
            config.resolver.nameservers = servers
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect();
        }
    }

    if let Some(server) = table.get("server").and_then(|v| v.as_table()) {
        if let Some(host) = server.get("host").and_then(|v| v.as_str()) {
            config.server.host = host.to_string();
        }
        if let Some(dir) = server.get("static_dir").and_then(|v| v.as_str()) {
            config.server.static_dir = dir.into();
        }
    }

    Ok(())
}

fn seconds(key: &str, value: i64) -> Result<Duration, SubprobeError> {
    u64::try_from(value)
        .map(Duration::from_secs)
        .with_context(|| format!("{} must not be negative", key))
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(host) = env::var("SERVER_HOST") {
        if !host.trim().is_empty() {
            config.server.host = host.trim().to_string();
        }
    }
    if let Ok(ua) = env::var("SUBPROBE_USER_AGENT") {
        config.user_agent = ua;
    }
    if let Ok(proxy) = env::var("SUBPROBE_PROXY") {
        config.proxy = Some(proxy);
    }
}

fn validate_config(config: &Config) -> Result<(), SubprobeError> {
    if config.probe_timeout.is_zero() {
        return Err(SubprobeError::ConfigError("probe_timeout must be greater than 0".to_string()));
    }
    if config.aggregator.timeout.is_zero() {
        return Err(SubprobeError::ConfigError("aggregator.timeout must be greater than 0".to_string()));
    }
    if config.resolver.timeout.is_zero() {
        return Err(SubprobeError::ConfigError("resolver.timeout must be greater than 0".to_string()));
    }
    if config.max_cname_depth == 0 {
        return Err(SubprobeError::ConfigError("max_cname_depth must be greater than 0".to_string()));
    }
    if !config.resolver.use_system_resolver && config.resolver.nameservers.is_empty() {
        return Err(SubprobeError::ConfigError(
            "resolver.nameservers is empty and the system resolver is disabled".to_string(),
        ));
    }
    Ok(())
}
