use ndarray::{ArrayD, IxDyn};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{Tensor, ValueType};
use thiserror::Error;

use crate::decision::Logits;

use super::arena::{carve, Arena, Segment};
use super::model::Model;
use super::tensor::{TensorKind, TensorSpec};

/// ランタイムが受け入れるモデルのスキーマバージョン。
/// モデル書き出し側がmodel_versionに埋め込む互換タグと一致する必要がある。
pub const SUPPORTED_SCHEMA_VERSION: i64 = 1;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model schema version {found} does not match supported version {supported}")]
    SchemaMismatch { found: i64, supported: i64 },
    #[error("tensor footprint {required} bytes exceeds arena capacity {capacity} bytes")]
    ArenaExhausted { required: usize, capacity: usize },
    #[error("unsupported tensor element type: {0}")]
    UnsupportedTensorType(String),
    #[error("model is not usable: {0}")]
    MalformedModel(String),
    #[error("forward pass failed: {0}")]
    Invoke(#[source] ort::Error),
    #[error(transparent)]
    Runtime(#[from] ort::Error),
}

/// 推論エンジン。モデルとアリーナを排他所有し、bind時に一度だけテンソルを割り付ける。
/// 値が存在する = Ready。bind失敗はコンストラクタのErrで表現する。
pub struct InferenceEngine {
    session: Session,
    arena: Arena,
    input_name: String,
    output_name: String,
    input_spec: TensorSpec,
    input_dims: Vec<usize>,
    output_kind: TensorKind,
    input_seg: Segment,
    output_seg: Segment,
}

impl InferenceEngine {
    /// モデルをアリーナに束縛する。スキーマ検査 → 形状導出 → アリーナ切り出しの順で、
    /// すべてループ開始前に確定する。
    pub fn bind(model: Model, arena: Arena) -> Result<Self, EngineError> {
        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .commit_from_memory(model.bytes())?;

        let version = session.metadata()?.version()?;
        check_schema(version)?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| EngineError::MalformedModel("model has no inputs".to_string()))?;
        let input_name = input.name.clone();
        let (input_kind, input_dims) = describe_tensor(&input.input_type)?;
        let (height, width) = spatial_dims(&input_dims)?;
        let input_spec = TensorSpec {
            kind: input_kind,
            height,
            width,
        };
        let input_dims = concrete_dims(&input_dims);

        let output = session
            .outputs
            .first()
            .ok_or_else(|| EngineError::MalformedModel("model has no outputs".to_string()))?;
        let output_name = output.name.clone();
        let (output_kind, output_dims) = describe_tensor(&output.output_type)?;
        let output_len: usize = concrete_dims(&output_dims).iter().product();
        if output_len < 2 {
            return Err(EngineError::MalformedModel(format!(
                "output tensor holds {output_len} logits, need at least 2"
            )));
        }

        // 必要メモリはbind時に1回だけ検査する。ループ中の不足はあり得ない。
        let segments = carve(arena.capacity(), &[input_spec.len(), output_len]).map_err(
            |required| EngineError::ArenaExhausted {
                required,
                capacity: arena.capacity(),
            },
        )?;

        Ok(Self {
            session,
            arena,
            input_name,
            output_name,
            input_spec,
            input_dims,
            output_kind,
            input_seg: segments[0],
            output_seg: segments[1],
        })
    }

    /// 入力テンソルの仕様（要素型・空間次元）。FrameTransformerがこれに合わせる。
    pub fn input_spec(&self) -> TensorSpec {
        self.input_spec
    }

    /// 量子化済み入力バイト列で1回のフォワードパスを実行し、2クラスのロジットを返す。
    /// 失敗してもエンジンはReadyのまま。そのフレームの判定が無いだけ。
    pub fn invoke(&mut self, input: &[u8]) -> Result<Logits, EngineError> {
        if input.len() != self.input_spec.len() {
            return Err(EngineError::MalformedModel(format!(
                "input buffer holds {} bytes, model expects {}",
                input.len(),
                self.input_spec.len()
            )));
        }

        // 入力はアリーナの入力セグメントに置いてから読む
        self.arena.segment_mut(self.input_seg).copy_from_slice(input);
        let staged = self.arena.segment(self.input_seg);
        let dims = IxDyn(&self.input_dims);

        let outputs = match self.input_spec.kind {
            TensorKind::Int8 => {
                let data: Vec<i8> = staged.iter().map(|b| *b as i8).collect();
                let array = ArrayD::from_shape_vec(dims, data)
                    .map_err(|e| EngineError::MalformedModel(e.to_string()))?;
                let tensor = Tensor::from_array(array).map_err(EngineError::Invoke)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(EngineError::Invoke)?
            }
            TensorKind::Uint8 => {
                let data: Vec<u8> = staged.to_vec();
                let array = ArrayD::from_shape_vec(dims, data)
                    .map_err(|e| EngineError::MalformedModel(e.to_string()))?;
                let tensor = Tensor::from_array(array).map_err(EngineError::Invoke)?;
                self.session
                    .run(ort::inputs![self.input_name.as_str() => tensor])
                    .map_err(EngineError::Invoke)?
            }
        };

        let (no, yes) = match self.output_kind {
            TensorKind::Int8 => {
                let view: ndarray::ArrayViewD<i8> = outputs[self.output_name.as_str()]
                    .try_extract_array()
                    .map_err(EngineError::Invoke)?;
                let mut it = view.iter();
                let no = *it.next().ok_or_else(short_output)?;
                let yes = *it.next().ok_or_else(short_output)?;
                (no as i32, yes as i32)
            }
            TensorKind::Uint8 => {
                let view: ndarray::ArrayViewD<u8> = outputs[self.output_name.as_str()]
                    .try_extract_array()
                    .map_err(EngineError::Invoke)?;
                let mut it = view.iter();
                let no = *it.next().ok_or_else(short_output)?;
                let yes = *it.next().ok_or_else(short_output)?;
                (no as i32, yes as i32)
            }
        };
        drop(outputs);

        // ロジットはアリーナの出力セグメントに格納する（bind〜teardown間有効なビュー）
        let raw = [no as u8, yes as u8];
        self.arena.segment_mut(self.output_seg)[..2].copy_from_slice(&raw);

        Ok(Logits { no, yes })
    }
}

fn short_output() -> EngineError {
    EngineError::MalformedModel("output tensor yielded fewer than 2 logits".to_string())
}

/// スキーマバージョンの互換検査。不一致は致命的で、プロセスは先へ進めない。
pub fn check_schema(found: i64) -> Result<(), EngineError> {
    if found != SUPPORTED_SCHEMA_VERSION {
        return Err(EngineError::SchemaMismatch {
            found,
            supported: SUPPORTED_SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// ValueTypeから要素型と宣言形状を取り出す
fn describe_tensor(value_type: &ValueType) -> Result<(TensorKind, Vec<i64>), EngineError> {
    match value_type {
        ValueType::Tensor { ty, shape, .. } => {
            let kind = TensorKind::from_element_type(*ty)?;
            Ok((kind, shape.iter().copied().collect()))
        }
        other => Err(EngineError::MalformedModel(format!(
            "expected a tensor input/output, got {other:?}"
        ))),
    }
}

/// 空間次元の導出: H = dims[len-3], W = dims[len-2]（NHWC想定、チャネルは1）
pub fn spatial_dims(dims: &[i64]) -> Result<(usize, usize), EngineError> {
    if dims.len() < 3 {
        return Err(EngineError::MalformedModel(format!(
            "input rank {} is too small to carry spatial dims",
            dims.len()
        )));
    }
    let height = dims[dims.len() - 3];
    let width = dims[dims.len() - 2];
    let channels = dims[dims.len() - 1];
    if height <= 0 || width <= 0 {
        return Err(EngineError::MalformedModel(format!(
            "spatial dims must be static and positive, got {height}x{width}"
        )));
    }
    if channels != 1 {
        return Err(EngineError::MalformedModel(format!(
            "expected single-channel input, got {channels} channels"
        )));
    }
    Ok((height as usize, width as usize))
}

/// 動的次元（-1等）をバッチ1として具体化する
fn concrete_dims(dims: &[i64]) -> Vec<usize> {
    dims.iter()
        .map(|&d| if d > 0 { d as usize } else { 1 })
        .collect()
}
