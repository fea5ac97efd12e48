use crate::config::model::Config;

/// 默认配置文件路径
const DEFAULT_CONFIG_PATH: &str = "config.toml";

/// 获取配置文件路径，优先使用CONFIG_PATH环境变量
pub fn get_config_path() -> String {
    std::env::var("CONFIG_PATH").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string())
}

pub fn load_config() -> Result<Config, anyhow::Error> {
    load_config_from_path(&get_config_path())
}

pub fn load_config_from_path(config_path: &str) -> Result<Config, anyhow::Error> {
    let config_str = std::fs::read_to_string(config_path)?;
    load_config_from_str(&config_str)
}

pub fn load_config_from_str(config_str: &str) -> Result<Config, anyhow::Error> {
    let config: Config = toml::from_str(config_str)?;
    config.validate()?;
    Ok(config)
}
