use crate::planner::{NamingMode, NamingPolicy};
use crate::session::DEFAULT_EXTENSIONS;
use crate::template::DEFAULT_TEMPLATE;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub mode: NamingMode,
    pub template: String,
    pub start_number: i64,
    pub recursive_default: bool,
    pub include_hidden_default: bool,
    pub extensions: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            mode: NamingMode::SerialOnly,
            template: DEFAULT_TEMPLATE.to_string(),
            start_number: 1,
            recursive_default: false,
            include_hidden_default: false,
            extensions: DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        }
    }
}

impl AppConfig {
    pub fn policy(&self) -> NamingPolicy {
        NamingPolicy::from_mode(self.mode, &self.template)
    }
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "multi-rename", "multi-rename")
        .context("OS標準設定ディレクトリを取得できませんでした")?;
    let config_dir = proj.config_dir().to_path_buf();
    Ok(AppPaths {
        config_path: config_dir.join("config.toml"),
        config_dir,
    })
}

pub fn load_config() -> Result<AppConfig> {
    load_config_from(&app_paths()?.config_path)
}

pub fn save_config(config: &AppConfig) -> Result<()> {
    save_config_to(&app_paths()?.config_path, config)
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("設定ファイルを読めませんでした: {}", path.display()))?;
    let config = toml::from_str::<AppConfig>(&raw).context("設定ファイルのパースに失敗しました")?;
    Ok(config)
}

pub fn save_config_to(path: &Path, config: &AppConfig) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).with_context(|| {
            format!("設定ディレクトリを作成できませんでした: {}", dir.display())
        })?;
    }
    let body = toml::to_string_pretty(config).context("設定のシリアライズに失敗しました")?;
    fs::write(path, body)
        .with_context(|| format!("設定ファイルを書き込めませんでした: {}", path.display()))?;
    Ok(())
}
