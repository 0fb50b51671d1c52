//! Layered configuration
//!
//! Sources, lowest priority first:
//!
//! 1. the embedded `default-config.toml`
//! 2. `~/.config/fileintel/config.{toml,json,yaml,yml}`
//! 3. `fileintel.{toml,json,yaml,yml}` in the working directory
//!    (2 and 3 are replaced by `--config <FILE>` when given)
//! 4. `FILEINTEL_*` environment variables, e.g. `FILEINTEL_RUN__DRY_RUN=true`
//! 5. command-line flags

pub mod core;
pub mod overrides;
pub mod settings;
pub mod smart_load;

pub use self::core::FileIntelConfig;
pub use overrides::ConfigOverrides;
pub use settings::{RuleConfig, Settings};
