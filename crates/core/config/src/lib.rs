use cached::proc_macro::cached;
use config::{Config, ConfigError, File, FileFormat};
use futures_locks::RwLock;
use log::info;
use once_cell::sync::Lazy;
use serde::Deserialize;

static CONFIG_BUILDER: Lazy<RwLock<Config>> = Lazy::new(|| {
    RwLock::new({
        let mut builder = Config::builder().add_source(File::from_str(
            include_str!("../Stampede.toml"),
            FileFormat::Toml,
        ));

        if std::path::Path::new("Stampede.toml").exists() {
            builder = builder.add_source(File::new("Stampede.toml", FileFormat::Toml));
        }

        builder.build().unwrap()
    })
});

#[derive(Deserialize, Debug, Clone)]
pub struct Database {
    pub redis: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Cache {
    pub entry_ttl_ms: u64,
    pub invalidation_channel: String,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Locks {
    pub lease_ttl_ms: u64,
}

#[derive(Deserialize, Debug, Clone)]
pub struct Settings {
    pub database: Database,
    pub cache: Cache,
    pub locks: Locks,
}

/// Validate the configuration, returning the resolved settings.
///
/// Binaries call this once at startup and decide for themselves whether a
/// broken override file is fatal.
pub async fn init() -> Result<Settings, ConfigError> {
    let settings = read().await.try_deserialize::<Settings>()?;

    info!(
        ":: Stampede Configuration ::\n\x1b[32m{:?}\x1b[0m",
        settings
    );

    Ok(settings)
}

pub async fn read() -> Config {
    CONFIG_BUILDER.read().await.clone()
}

/// Fetch the current settings, expecting a configuration already
/// validated by [`init`].
#[cached(time = 30)]
pub async fn config() -> Settings {
    read()
        .await
        .try_deserialize::<Settings>()
        .expect("configuration was validated at startup")
}

/// Configure logging, environment and error reporting for a binary
#[macro_export]
macro_rules! configure {
    ( $name: ident ) => {
        let _sentry_guard = $crate::setup_logging(concat!("stampede-", stringify!($name)));
    };
}

/// Set up dotenv, the logger and (when `SENTRY_DSN` is present) Sentry
pub fn setup_logging(release: &'static str) -> Option<sentry::ClientInitGuard> {
    dotenv::dotenv().ok();

    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info");
    }

    pretty_env_logger::init();

    let dsn = std::env::var("SENTRY_DSN").unwrap_or_default();
    if dsn.is_empty() {
        None
    } else {
        Some(sentry::init((
            dsn,
            sentry::ClientOptions {
                release: Some(release.into()),
                ..Default::default()
            },
        )))
    }
}

/// Report an error and carry on
pub fn capture_error<E: std::error::Error + ?Sized>(error: &E) {
    log::error!("{error}");
    sentry::capture_error(error);
}
