use opencv::{
    core::Mat,
    prelude::*,
    videoio::{self, VideoCapture, VideoCaptureAPIs},
};
use thiserror::Error;

use crate::config::CameraConfig;

/// キャプチャバックエンドの候補。宣言順に試行し、最初に開けたものを採用する。
#[derive(Debug, Clone, Copy)]
pub struct BackendCandidate {
    pub api: VideoCaptureAPIs,
    pub name: &'static str,
}

/// バックエンド候補リスト（固定・順序に意味がある）
pub const BACKEND_CANDIDATES: &[BackendCandidate] = &[
    BackendCandidate { api: VideoCaptureAPIs::CAP_AVFOUNDATION, name: "avfoundation" },
    BackendCandidate { api: VideoCaptureAPIs::CAP_VFW, name: "v4l" },
    BackendCandidate { api: VideoCaptureAPIs::CAP_MSMF, name: "msmf" },
    BackendCandidate { api: VideoCaptureAPIs::CAP_DSHOW, name: "dshow" },
    BackendCandidate { api: VideoCaptureAPIs::CAP_GSTREAMER, name: "gstreamer" },
    BackendCandidate { api: VideoCaptureAPIs::CAP_ANY, name: "any" },
];

/// どのバックエンドでもカメラを開けなかった
#[derive(Debug, Error)]
#[error("no capture backend could open camera {index}")]
pub struct NoBackendAvailable {
    pub index: i32,
}

/// 一時的なフレーム取得失敗。呼び出し側は少し待ってリトライする。
#[derive(Debug, Error)]
#[error("frame grab failed: {reason}")]
pub struct FrameReadError {
    pub reason: String,
}

/// バックエンド選択の結果。成功するまでに拒否された候補も保持する。
pub struct BackendSelection<T> {
    /// 採用前に拒否された候補と理由（宣言順）
    pub refused: Vec<(BackendCandidate, String)>,
    /// 最初に成功した候補とそのハンドル。全滅ならNone。
    pub opened: Option<(BackendCandidate, T)>,
}

/// 候補を宣言順に試し、最初に成功したものを採用する。
/// 成功した時点で残りの候補は試行しない。診断出力は呼び出し側の責務。
pub fn select_backend<T>(
    candidates: &[BackendCandidate],
    mut try_open: impl FnMut(&BackendCandidate) -> Result<T, String>,
) -> BackendSelection<T> {
    let mut refused = Vec::new();
    for candidate in candidates {
        match try_open(candidate) {
            Ok(handle) => {
                return BackendSelection {
                    refused,
                    opened: Some((*candidate, handle)),
                }
            }
            Err(reason) => refused.push((*candidate, reason)),
        }
    }
    BackendSelection { refused, opened: None }
}

/// 1バックエンドでの試行。open成功かつデバイスがopenedを報告した場合のみ成功。
fn probe_backend(index: i32, api: VideoCaptureAPIs) -> Result<VideoCapture, String> {
    match VideoCapture::new(index, api as i32) {
        Ok(capture) => match capture.is_opened() {
            Ok(true) => Ok(capture),
            Ok(false) => Err("device reports not opened".to_string()),
            Err(e) => Err(e.to_string()),
        },
        Err(e) => Err(e.to_string()),
    }
}

/// OpenCVを使用したカメラキャプチャ
pub struct CameraAcquirer {
    capture: VideoCapture,
    width: u32,
    height: u32,
}

impl CameraAcquirer {
    /// バックエンド候補を順に試してカメラを開く
    pub fn acquire(index: i32, config: &CameraConfig) -> Result<Self, NoBackendAvailable> {
        let selection = select_backend(BACKEND_CANDIDATES, |candidate| {
            probe_backend(index, candidate.api)
        });

        // 試行したバックエンドごとに1行ずつ診断を出す
        for (candidate, reason) in &selection.refused {
            eprintln!("[fail] backend {}: {}", candidate.name, reason);
        }
        let mut capture = match selection.opened {
            Some((candidate, capture)) => {
                println!("[ok] opened camera {} via {}", index, candidate.name);
                capture
            }
            None => return Err(NoBackendAvailable { index }),
        };

        // 解像度・バッファは要求ベース。拒否されても続行する。
        let _ = capture.set(videoio::CAP_PROP_FRAME_WIDTH, config.width as f64);
        let _ = capture.set(videoio::CAP_PROP_FRAME_HEIGHT, config.height as f64);
        let _ = capture.set(videoio::CAP_PROP_BUFFERSIZE, 1.0);

        let actual_width = capture
            .get(videoio::CAP_PROP_FRAME_WIDTH)
            .map(|w| w as u32)
            .unwrap_or(config.width);
        let actual_height = capture
            .get(videoio::CAP_PROP_FRAME_HEIGHT)
            .map(|h| h as u32)
            .unwrap_or(config.height);

        Ok(Self {
            capture,
            width: actual_width,
            height: actual_height,
        })
    }

    /// 実際のキャプチャ解像度
    pub fn resolution(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// フレームを読み込む（BGR形式）。失敗は一時的なものとして扱う。
    pub fn read(&mut self) -> Result<Mat, FrameReadError> {
        let mut frame = Mat::default();
        let grabbed = self
            .capture
            .read(&mut frame)
            .map_err(|e| FrameReadError { reason: e.to_string() })?;

        if !grabbed || frame.empty() {
            return Err(FrameReadError {
                reason: "empty frame received".to_string(),
            });
        }

        Ok(frame)
    }
}
