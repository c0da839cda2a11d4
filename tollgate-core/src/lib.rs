pub mod config;
pub mod guards;
pub mod interceptors;
pub mod layers;

pub use config::{ConfigError, ConfigSection, ConfigValue, FromConfigValue, TollgateConfig};
pub use guards::{Guard, GuardContext, Identity, NoIdentity};
pub use interceptors::{Interceptor, InterceptorContext};
pub use layers::init_tracing;

pub mod prelude {
    //! Re-exports of the most commonly used core types.
    pub use crate::{
        ConfigSection, Guard, GuardContext, Identity, Interceptor, InterceptorContext,
        TollgateConfig,
    };
}
