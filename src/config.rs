use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub display: DisplayConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// モデルファイルのパス
    #[serde(default = "default_model_path")]
    pub path: String,
    /// テンソルアリーナのサイズ（KiB）
    #[serde(default = "default_arena_kib")]
    pub arena_kib: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// カメラindex（CLI引数で上書き可能）
    #[serde(default)]
    pub index: i32,
    /// キャプチャ解像度（要求値。デバイスが無視する場合あり）
    #[serde(default = "default_capture_width")]
    pub width: u32,
    #[serde(default = "default_capture_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    /// ウィンドウタイトル
    #[serde(default = "default_window_title")]
    pub title: String,
    /// 1フレームごとの待機時間（表示リフレッシュ兼ループペーシング）
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,
    /// フレーム取得失敗時のリトライ待機時間
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
}

fn default_model_path() -> String { "models/person_detect.onnx".to_string() }
fn default_arena_kib() -> usize { 320 }
fn default_capture_width() -> u32 { 640 }
fn default_capture_height() -> u32 { 480 }
fn default_window_title() -> String { "person watch".to_string() }
fn default_frame_interval_ms() -> u64 { 30 }
fn default_retry_interval_ms() -> u64 { 10 }

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: default_model_path(),
            arena_kib: default_arena_kib(),
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            index: 0,
            width: default_capture_width(),
            height: default_capture_height(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            title: default_window_title(),
            frame_interval_ms: default_frame_interval_ms(),
            retry_interval_ms: default_retry_interval_ms(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// 設定ファイルがなければデフォルト値。壊れている場合は警告してデフォルト値。
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        if !path.exists() {
            return Config::default();
        }
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("config {} is invalid ({}); using defaults", path.display(), e);
                Config::default()
            }
        }
    }
}
