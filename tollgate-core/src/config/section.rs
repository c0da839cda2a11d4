use super::{ConfigError, TollgateConfig};

/// Trait for strongly-typed configuration sections.
///
/// A section reads its keys below [`prefix`](ConfigSection::prefix) and
/// validates them once, so components receive a checked value instead of
/// raw config access.
///
/// ```ignore
/// impl ConfigSection for DedupSettings {
///     fn prefix() -> &'static str {
///         "tollgate.dedup"
///     }
///
///     fn from_config(config: &TollgateConfig) -> Result<Self, ConfigError> {
///         let hard_expiry_ms: Option<u64> = config.get_opt("tollgate.dedup.hard_expiry_ms")?;
///         Ok(DedupSettings { hard_expiry: hard_expiry_ms.map(Duration::from_millis) })
///     }
/// }
/// ```
pub trait ConfigSection: Sized {
    /// The configuration key prefix (e.g. `"tollgate.security"`).
    fn prefix() -> &'static str;

    /// Construct from a `TollgateConfig` instance.
    fn from_config(config: &TollgateConfig) -> Result<Self, ConfigError>;

    /// Absolute key for a property of this section.
    fn key(property: &str) -> String {
        format!("{}.{property}", Self::prefix())
    }
}
