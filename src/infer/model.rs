use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// モデルファイルの読み込み失敗。NotFoundとそれ以外のI/O失敗を区別する。
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("model file not found: {0}")]
    NotFound(PathBuf),
    #[error("failed to read model file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// 読み込み済みのモデルバッファ。起動時に1回読み、以後不変。
#[derive(Debug)]
pub struct Model {
    bytes: Vec<u8>,
}

impl Model {
    /// ファイルからモデルを読み込む
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        match fs::read(path) {
            Ok(bytes) => Ok(Self { bytes }),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(ModelError::NotFound(path.to_path_buf()))
            }
            Err(e) => Err(ModelError::Read {
                path: path.to_path_buf(),
                source: e,
            }),
        }
    }

    /// テスト・組み込み用
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}
