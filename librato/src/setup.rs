use anyhow::Result;
use librato_config::Config;

pub fn check_config(config: &Config) -> Result<()> {
    if !config.simulate_enabled() && config.credentials().is_none() {
        anyhow::bail!(
            "no credentials configured. Set LIBRATO_EMAIL and LIBRATO_TOKEN, pass --email and \
             --token, or enable simulate mode with --simulate."
        );
    }

    Ok(())
}

/// Print launch infos to the log.
pub fn dump_spawn_infos(config: &Config) {
    if config.path().as_os_str().is_empty() {
        librato_log::debug!("running without config folder");
    } else {
        librato_log::debug!("using config folder {}", config.path().display());
    }

    librato_log::debug!("  upstream: {}", config.upstream());
    match config.credentials() {
        Some(credentials) => librato_log::debug!("  email: {}", credentials.email),
        None => librato_log::debug!("  email: -"),
    };
    librato_log::debug!("  source: {}", config.source().unwrap_or("-"));
    librato_log::debug!("  prefix: {}", config.prefix().unwrap_or("-"));
    librato_log::debug!("  simulate: {}", config.simulate_enabled());
    librato_log::debug!("  log level: {}", config.logging().level);
}

/// Dumps out the effective config with secrets masked.
#[allow(clippy::print_stdout)]
pub fn dump_config(config: &Config) -> Result<()> {
    print!("{}", config.to_redacted_yaml_string()?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_config() {
        assert!(check_config(&Config::default()).is_err());
        assert!(check_config(&Config::simulate()).is_ok());
        assert!(check_config(&Config::with_credentials("ops@example.com", "secret")).is_ok());
    }
}
