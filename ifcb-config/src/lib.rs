use envconfig::Envconfig;
use lazy_static::lazy_static;

#[derive(Debug, Envconfig)]
pub struct Config {
    #[envconfig(from = "IFCB_LOG_LEVEL", default = "info")]
    pub log_level: String,
    /// Deflate level for compressed container datasets, 0 disables compression
    #[envconfig(from = "IFCB_COMPRESSION_LEVEL", default = "4")]
    pub compression_level: i32,
    /// Whether bins written to a container embed the raw ADC and HDR bytes
    #[envconfig(from = "IFCB_ARCHIVE", default = "false")]
    pub archive: bool,
}

impl Config {
    pub fn init() -> Config {
        Config::init_from_env().expect("Failed to load config")
    }

    /// Compression level to hand to the container engine, if any.
    pub fn compression(&self) -> Option<i32> {
        match self.compression_level {
            level if level <= 0 => None,
            level => Some(level.min(9)),
        }
    }
}

lazy_static! {
    pub static ref CONFIG: Config = Config::init();
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::init_from_hashmap(&HashMap::new()).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.compression(), Some(4));
        assert!(!config.archive);
    }

    #[test]
    fn test_compression_disabled() {
        let vars = HashMap::from([("IFCB_COMPRESSION_LEVEL".to_string(), "0".to_string())]);
        let config = Config::init_from_hashmap(&vars).unwrap();
        assert_eq!(config.compression(), None);
    }

    #[test]
    fn test_compression_clamped() {
        let vars = HashMap::from([("IFCB_COMPRESSION_LEVEL".to_string(), "12".to_string())]);
        let config = Config::init_from_hashmap(&vars).unwrap();
        assert_eq!(config.compression(), Some(9));
    }
}
