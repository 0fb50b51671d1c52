use super::settings::Settings;
use super::smart_load;
use anyhow::{Context, Result};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::Serialize;
use std::path::Path;

// Embed the default config at compile time
const DEFAULT_CONFIG: &str = include_str!("../../default-config.toml");

/// Extensions tried, in order, for the user and repository config files
const CONFIG_EXTENSIONS: &[&str] = &["toml", "json", "yaml", "yml"];

/// Repository config base name, looked up in the working directory
const REPO_CONFIG_BASE: &str = "fileintel";

/// Prefix for environment overrides; nested keys are joined with `__`
pub const ENV_PREFIX: &str = "FILEINTEL_";

pub struct FileIntelConfig {
    figment: Figment,
}

impl FileIntelConfig {
    /// Defaults, user config, repository config and environment
    pub fn load_default() -> Result<Self> {
        Self::load(None, None::<()>)
    }

    pub fn load<T: Serialize>(custom_config: Option<&str>, cli_overrides: Option<T>) -> Result<Self> {
        tracing::trace!("CONFIG LOAD: Starting");

        let mut figment = Figment::new().merge(Toml::string(DEFAULT_CONFIG)); // 1. Defaults (lowest)

        if let Some(custom_path) = custom_config {
            // A custom config replaces the user and repository files
            if !Path::new(custom_path).is_file() {
                anyhow::bail!("Config file not found: {custom_path}");
            }
            figment = figment.merge(smart_load::auto(custom_path));
        } else {
            if let Some(user_base) = Self::user_config_base_path() {
                for ext in CONFIG_EXTENSIONS {
                    figment = figment.merge(smart_load::auto(format!("{user_base}.{ext}"))); // 2. User config
                }
            }
            for ext in CONFIG_EXTENSIONS {
                figment = figment.merge(smart_load::auto(format!("{REPO_CONFIG_BASE}.{ext}"))); // 3. Repo config
            }
        }

        figment = figment.merge(Env::prefixed(ENV_PREFIX).split("__")); // 4. Environment variables

        if let Some(cli) = cli_overrides {
            tracing::trace!("CONFIG LOAD: Applying CLI overrides");
            figment = figment.merge(Serialized::defaults(cli)); // 5. CLI (highest priority)
        }

        Ok(FileIntelConfig { figment })
    }

    /// Typed view of the merged configuration
    pub fn settings(&self) -> Result<Settings> {
        self.figment
            .extract()
            .context("Configuration does not match the expected shape")
    }

    /// Get the full merged configuration as a structured value
    pub fn get_full_config(&self) -> Result<serde_json::Value> {
        let value = self.figment.extract()?;
        Ok(value)
    }

    /// Names of the sources that contributed a value, lowest priority first
    pub fn sources(&self) -> Vec<String> {
        self.figment
            .metadata()
            .map(|metadata| match &metadata.source {
                Some(source) => format!("{} ({})", metadata.name, source),
                None => metadata.name.to_string(),
            })
            .collect()
    }

    fn user_config_base_path() -> Option<String> {
        std::env::var("HOME")
            .ok()
            .map(|home| format!("{home}/.config/fileintel/config"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use std::path::PathBuf;

    fn load_in(jail: &mut Jail) -> figment::error::Result<Settings> {
        let home = jail.directory().display().to_string();
        jail.set_env("HOME", home);
        let config = FileIntelConfig::load_default().map_err(|e| e.to_string())?;
        config.settings().map_err(|e| e.to_string().into())
    }

    #[test]
    fn test_defaults_load() {
        Jail::expect_with(|jail| {
            let settings = load_in(jail)?;
            assert!(settings.run.roots.is_empty());
            assert_eq!(settings.run.dest, None);
            assert!(!settings.run.dry_run);
            assert_eq!(settings.run.workers, 8);
            assert!(settings.walk.ignore_dirs.contains(&".git".to_string()));
            assert!(settings.detect.content_sniffing);
            assert_eq!(settings.rules.len(), 1);
            assert_eq!(settings.rules[0].name, "All images");
            assert_eq!(settings.rules[0].mime_patterns, vec!["image/*"]);
            Ok(())
        });
    }

    #[test]
    fn test_repo_config_replaces_rules() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "fileintel.toml",
                r#"
                [run]
                dest = "/srv/sorted"

                [[rules]]
                name = "Documents"
                mime_patterns = ["application/pdf"]
                ext_patterns = [".pdf", ".docx"]

                [[rules]]
                name = "Video"
                mime_patterns = ["video/*"]
                "#,
            )?;

            let settings = load_in(jail)?;
            assert_eq!(settings.run.dest, Some(PathBuf::from("/srv/sorted")));
            let names: Vec<_> = settings.rules.iter().map(|r| r.name.as_str()).collect();
            assert_eq!(names, vec!["Documents", "Video"]);
            assert!(settings.rules[1].ext_patterns.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_user_config_in_yaml() {
        Jail::expect_with(|jail| {
            jail.create_dir(".config/fileintel")?;
            jail.create_file(".config/fileintel/config.yaml", "run:\n  record_unmatched: true\n")?;

            let settings = load_in(jail)?;
            assert!(settings.run.record_unmatched);
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_files() {
        Jail::expect_with(|jail| {
            jail.create_file("fileintel.toml", "[run]\nworkers = 2\n")?;
            jail.set_env("FILEINTEL_RUN__WORKERS", "4");
            jail.set_env("FILEINTEL_RUN__DRY_RUN", "true");

            let settings = load_in(jail)?;
            assert_eq!(settings.run.workers, 4);
            assert!(settings.run.dry_run);
            Ok(())
        });
    }

    #[test]
    fn test_cli_overrides_win() {
        Jail::expect_with(|jail| {
            let home = jail.directory().display().to_string();
            jail.set_env("HOME", home);
            jail.set_env("FILEINTEL_RUN__DRY_RUN", "false");

            let overrides = serde_json::json!({ "run": { "dry_run": true, "dest": "/tmp/out" } });
            let config = FileIntelConfig::load(None, Some(overrides)).map_err(|e| e.to_string())?;
            let settings = config.settings().map_err(|e| e.to_string())?;

            assert!(settings.run.dry_run);
            assert_eq!(settings.run.dest, Some(PathBuf::from("/tmp/out")));
            assert_eq!(settings.run.workers, 8);
            Ok(())
        });
    }

    #[test]
    fn test_custom_config_skips_repo_config() {
        Jail::expect_with(|jail| {
            let home = jail.directory().display().to_string();
            jail.set_env("HOME", home);
            jail.create_file("fileintel.toml", "[run]\nworkers = 2\n")?;
            jail.create_file("custom.json", r#"{ "run": { "bucket_by_rule": true } }"#)?;

            let config = FileIntelConfig::load(Some("custom.json"), None::<()>).map_err(|e| e.to_string())?;
            let settings = config.settings().map_err(|e| e.to_string())?;

            assert!(settings.run.bucket_by_rule);
            assert_eq!(settings.run.workers, 8);
            Ok(())
        });
    }

    #[test]
    fn test_missing_custom_config_is_an_error() {
        Jail::expect_with(|_jail| {
            assert!(FileIntelConfig::load(Some("nope.toml"), None::<()>).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_full_config_sections() {
        Jail::expect_with(|jail| {
            let home = jail.directory().display().to_string();
            jail.set_env("HOME", home);
            let config = FileIntelConfig::load_default().map_err(|e| e.to_string())?;
            let merged = config.get_full_config().map_err(|e| e.to_string())?;
            let walk = &merged["walk"];
            assert_eq!(walk["follow_symlinks"], serde_json::Value::Bool(false));
            assert!(walk["ignore_dirs"].as_array().is_some_and(|dirs| !dirs.is_empty()));
            Ok(())
        });
    }
}
