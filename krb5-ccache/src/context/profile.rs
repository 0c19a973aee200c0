use config::{Config, File, FileFormat};
use std::env;

const KRB5_CLIENT_CONFIG_ENV: &str = "KRB5_CLIENT_CONFIG";
const DEFAULT_PROFILE_PATH: &str = "/etc/krb5-ccache.conf";

/// INI-style client profile, read through the `config` crate.
#[derive(Debug)]
pub struct Profile {
    config: Config,
}

macro_rules! get_value {
    ($fn:ident, $type:ident) => {
        pub fn $fn(&self, key: &str) -> Option<$type> {
            self.config.$fn(key).ok()
        }
    };
}

impl Profile {
    /// Loads `filename`, or the file named by `KRB5_CLIENT_CONFIG`, or the
    /// system default.
    pub fn new(filename: Option<&str>) -> anyhow::Result<Self> {
        let filename = match filename {
            Some(filename) => filename.to_owned(),
            None => env::var(KRB5_CLIENT_CONFIG_ENV).unwrap_or(DEFAULT_PROFILE_PATH.to_owned()),
        };
        let expanded_filename = match (filename.starts_with("~/"), env::var("HOME")) {
            (true, Ok(home_env)) => format!("{}{}", home_env, &filename[1..]),
            _ => filename,
        };
        let config = Config::builder()
            .add_source(File::with_name(&expanded_filename).format(FileFormat::Ini))
            .build()?;
        Ok(Self { config })
    }

    pub fn from_ini(contents: &str) -> anyhow::Result<Self> {
        let config = Config::builder()
            .add_source(File::from_str(contents, FileFormat::Ini))
            .build()?;
        Ok(Self { config })
    }

    get_value!(get_string, String);

    get_value!(get_int, i64);
}
