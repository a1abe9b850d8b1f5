//! Service configuration sourced from the process environment

use std::path::PathBuf;

/// Default HTTP listen port
pub const DEFAULT_PORT: u16 = 5999;

/// Default on-disk location of the ECharts browser bundle
pub const DEFAULT_ECHARTS_PATH: &str = "assets/echarts.min.js";

/// Runtime configuration for the render service.
///
/// Everything is read from environment variables once at startup; there is no
/// configuration file and no CLI surface.
///
/// | Variable             | Default                 | Meaning                          |
/// |----------------------|-------------------------|----------------------------------|
/// | `PORT`               | `5999`                  | HTTP listen port                 |
/// | `CHROME`             | engine discovery        | Chrome/Chromium executable path  |
/// | `ECHARTS_PATH`       | `assets/echarts.min.js` | ECharts browser bundle           |
/// | `RENDER_CONCURRENCY` | logical CPU count       | max concurrent in-flight renders |
///
/// `PUPPETEER_EXECUTABLE_PATH` is honored as a fallback alias for `CHROME` so
/// deployments of the Node predecessor keep working unchanged.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// HTTP listen port
    pub port: u16,
    /// Explicit browser executable path; `None` lets the engine discover one
    pub chrome_path: Option<PathBuf>,
    /// Path to the ECharts browser bundle injected into every page
    pub echarts_path: PathBuf,
    /// Maximum number of renders allowed in flight at once
    pub max_concurrent_renders: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            chrome_path: None,
            echarts_path: PathBuf::from(DEFAULT_ECHARTS_PATH),
            max_concurrent_renders: num_cpus::get(),
        }
    }
}

impl ServiceConfig {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup. Unset or unparsable values
    /// fall back to their defaults.
    fn from_lookup<F>(get: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            port: get("PORT")
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            chrome_path: get("CHROME")
                .filter(|v| !v.is_empty())
                .or_else(|| get("PUPPETEER_EXECUTABLE_PATH").filter(|v| !v.is_empty()))
                .map(PathBuf::from),
            echarts_path: get("ECHARTS_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.echarts_path),
            max_concurrent_renders: get("RENDER_CONCURRENCY")
                .and_then(|v| v.parse().ok())
                .filter(|&n| n > 0)
                .unwrap_or(defaults.max_concurrent_renders),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup<'a>(vars: &'a [(&'a str, &'a str)]) -> impl Fn(&str) -> Option<String> + 'a {
        let map: HashMap<&str, &str> = vars.iter().copied().collect();
        move |key| map.get(key).map(|v| v.to_string())
    }

    #[test]
    fn empty_environment_yields_defaults() {
        let config = ServiceConfig::from_lookup(|_| None);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.chrome_path, None);
        assert_eq!(config.echarts_path, PathBuf::from(DEFAULT_ECHARTS_PATH));
        assert!(config.max_concurrent_renders > 0);
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PORT", "3001"),
            ("CHROME", "/usr/bin/chromium"),
            ("ECHARTS_PATH", "/opt/echarts/echarts.min.js"),
            ("RENDER_CONCURRENCY", "3"),
        ]));
        assert_eq!(config.port, 3001);
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
        assert_eq!(
            config.echarts_path,
            PathBuf::from("/opt/echarts/echarts.min.js")
        );
        assert_eq!(config.max_concurrent_renders, 3);
    }

    #[test]
    fn unparsable_values_fall_back() {
        let config = ServiceConfig::from_lookup(lookup(&[
            ("PORT", "not-a-port"),
            ("RENDER_CONCURRENCY", "0"),
        ]));
        assert_eq!(config.port, DEFAULT_PORT);
        assert!(config.max_concurrent_renders > 0);
    }

    #[test]
    fn puppeteer_executable_path_is_a_fallback_alias() {
        let config = ServiceConfig::from_lookup(lookup(&[(
            "PUPPETEER_EXECUTABLE_PATH",
            "/usr/bin/chromium-browser",
        )]));
        assert_eq!(
            config.chrome_path,
            Some(PathBuf::from("/usr/bin/chromium-browser"))
        );

        // An explicit CHROME wins over the alias.
        let config = ServiceConfig::from_lookup(lookup(&[
            ("CHROME", "/usr/bin/chromium"),
            ("PUPPETEER_EXECUTABLE_PATH", "/usr/bin/chromium-browser"),
        ]));
        assert_eq!(config.chrome_path, Some(PathBuf::from("/usr/bin/chromium")));
    }

    #[test]
    fn empty_strings_are_treated_as_unset() {
        let config = ServiceConfig::from_lookup(lookup(&[("CHROME", ""), ("ECHARTS_PATH", "")]));
        assert_eq!(config.chrome_path, None);
        assert_eq!(config.echarts_path, PathBuf::from(DEFAULT_ECHARTS_PATH));
    }
}
