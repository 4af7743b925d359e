use {
    anyhow::{Context as _, Result, anyhow, bail},
    serde::{Deserialize, Serialize},
    std::path::{Path, PathBuf},
    url::Url,
};

pub const CONFIG_FILE_NAME: &str = "keepsake.json5";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// API root of the storage server, e.g. `https://keepsake.example/`.
    pub server_url: Option<Url>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: None,
            log_filter: default_log_filter(),
        }
    }
}

fn default_log_filter() -> String {
    "warn".into()
}

pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| anyhow!("cannot find config dir"))?;
    Ok(config_dir.join(CONFIG_FILE_NAME))
}

impl Config {
    pub fn parse(path: &Path) -> Result<Self> {
        json5::from_str(&fs_err::read_to_string(path)?)
            .with_context(|| format!("failed to parse config {}", path.display()))
    }

    /// Reads `path` if given, otherwise the default config file if it exists.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::parse(path);
        }
        let path = default_config_path()?;
        if path.try_exists()? {
            Self::parse(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn server_url(&self, overridden: Option<&Url>) -> Result<Url> {
        match overridden.or(self.server_url.as_ref()) {
            Some(url) => Ok(url.clone()),
            None => bail!("no server URL; pass `--server-url` or set `server_url` in the config"),
        }
    }
}
