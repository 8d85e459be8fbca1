use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_URL: &str = "https://codein.withgoogle.com";
pub const DEFAULT_DATADIR: &str = "gci_data";
pub const DEFAULT_COOKIE_FILE: &str = "sacsid_cookie.txt";
pub const DEFAULT_THROTTLE_SECS: u64 = 1;

/// Optional config file looked up in the working directory, any extension `config` understands.
const CONFIG_FILE: &str = "gci";
const ENV_PREFIX: &str = "GCI";

/// Runtime settings shared by the archiver and the submitter.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Settings {
    pub apikey: String,
    #[serde(default = "default_url")]
    pub url: String,
    #[serde(default = "default_datadir")]
    pub datadir: PathBuf,
    #[serde(default = "default_cookie_file")]
    pub cookie_file: PathBuf,
    #[serde(default = "default_throttle_secs")]
    pub throttle_secs: u64,
}

/// Values given on the command line; they win over every other source.
#[derive(Clone, Debug, Default)]
pub struct Overrides {
    pub apikey: Option<String>,
    pub url: Option<String>,
    pub datadir: Option<PathBuf>,
    pub cookie_file: Option<PathBuf>,
}

impl Settings {
    /// Loads settings from `gci.toml`, then `GCI_*` environment variables, then the
    /// command line.
    pub fn load(overrides: Overrides) -> anyhow::Result<Self> {
        let builder = config::Config::builder()
            .add_source(config::File::with_name(CONFIG_FILE).required(false))
            .add_source(config::Environment::with_prefix(ENV_PREFIX));
        Self::from_builder(builder, overrides)
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
        overrides: Overrides,
    ) -> anyhow::Result<Self> {
        let s = builder
            .set_override_option("apikey", overrides.apikey)?
            .set_override_option("url", overrides.url)?
            .set_override_option("datadir", overrides.datadir.map(path_string))?
            .set_override_option("cookie_file", overrides.cookie_file.map(path_string))?
            .build()?;

        let settings: Settings = s
            .try_deserialize()
            .map_err(|e| anyhow::anyhow!("invalid settings (is --apikey set?): {e}"))?;
        if settings.apikey.trim().is_empty() {
            anyhow::bail!("api key must not be empty");
        }
        Ok(settings)
    }

    pub fn throttle(&self) -> Duration {
        Duration::from_secs(self.throttle_secs)
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.datadir.join("tasks")
    }

    pub fn instances_dir(&self) -> PathBuf {
        self.datadir.join("instances")
    }
}

fn path_string(path: PathBuf) -> String {
    path.to_string_lossy().into_owned()
}

fn default_url() -> String {
    DEFAULT_URL.to_string()
}

fn default_datadir() -> PathBuf {
    PathBuf::from(DEFAULT_DATADIR)
}

fn default_cookie_file() -> PathBuf {
    PathBuf::from(DEFAULT_COOKIE_FILE)
}

fn default_throttle_secs() -> u64 {
    DEFAULT_THROTTLE_SECS
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_builder() -> config::ConfigBuilder<config::builder::DefaultState> {
        config::Config::builder()
    }

    mod deser_tests {
        use super::*;

        #[test]
        fn test_settings_deserialize_from_toml() {
            // Arrange
            let toml_str = r#"
                apikey = "secret"
                url = "http://localhost:9000"
                datadir = "archive"
                cookie_file = "cookie.txt"
                throttle_secs = 0
            "#;

            // Act
            let settings: Settings = toml::from_str(toml_str).unwrap();

            // Assert
            assert_eq!(settings.apikey, "secret");
            assert_eq!(settings.url, "http://localhost:9000");
            assert_eq!(settings.datadir, PathBuf::from("archive"));
            assert_eq!(settings.cookie_file, PathBuf::from("cookie.txt"));
            assert_eq!(settings.throttle(), Duration::ZERO);
        }

        #[test]
        fn test_settings_defaults() {
            // Arrange
            let toml_str = r#"apikey = "secret""#;

            // Act
            let settings: Settings = toml::from_str(toml_str).unwrap();

            // Assert
            assert_eq!(settings.url, DEFAULT_URL);
            assert_eq!(settings.datadir, PathBuf::from(DEFAULT_DATADIR));
            assert_eq!(settings.cookie_file, PathBuf::from(DEFAULT_COOKIE_FILE));
            assert_eq!(settings.throttle(), Duration::from_secs(1));
        }

        #[test]
        fn test_settings_require_apikey() {
            let result = toml::from_str::<Settings>(r#"url = "http://localhost""#);
            assert!(result.is_err());
        }
    }

    #[test]
    fn test_overrides_win_over_sources() {
        // Arrange
        let builder = empty_builder()
            .set_default("apikey", "from-file")
            .unwrap()
            .set_default("datadir", "from-file")
            .unwrap();
        let overrides = Overrides {
            apikey: Some("from-cli".to_string()),
            datadir: Some(PathBuf::from("cli_data")),
            ..Default::default()
        };

        // Act
        let settings = Settings::from_builder(builder, overrides).unwrap();

        // Assert
        assert_eq!(settings.apikey, "from-cli");
        assert_eq!(settings.datadir, PathBuf::from("cli_data"));
        assert_eq!(settings.url, DEFAULT_URL);
    }

    #[test]
    fn test_missing_apikey_is_an_error() {
        let result = Settings::from_builder(empty_builder(), Overrides::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_blank_apikey_is_an_error() {
        let overrides = Overrides {
            apikey: Some("   ".to_string()),
            ..Default::default()
        };
        assert!(Settings::from_builder(empty_builder(), overrides).is_err());
    }

    #[test]
    fn test_derived_directories() {
        let settings: Settings = toml::from_str(r#"
            apikey = "k"
            datadir = "root"
        "#)
        .unwrap();

        assert_eq!(settings.tasks_dir(), PathBuf::from("root").join("tasks"));
        assert_eq!(settings.instances_dir(), PathBuf::from("root").join("instances"));
    }
}
