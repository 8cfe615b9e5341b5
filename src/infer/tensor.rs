use ort::tensor::TensorElementType;

use super::engine::EngineError;

/// サポートするテンソル要素型。閉じたenumで、画素マッピングは各バリアント固有の純関数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TensorKind {
    Int8,
    Uint8,
}

impl TensorKind {
    /// モデルの宣言する要素型から変換。i8/u8以外は明示的に失敗させる。
    pub fn from_element_type(ty: TensorElementType) -> Result<Self, EngineError> {
        match ty {
            TensorElementType::Int8 => Ok(TensorKind::Int8),
            TensorElementType::Uint8 => Ok(TensorKind::Uint8),
            other => Err(EngineError::UnsupportedTensorType(format!("{other:?}"))),
        }
    }

    /// signed 8bit: 0..255 の画素を -128..127 に再センタリングする
    pub fn quantize_i8(pixel: u8) -> i8 {
        (pixel as i16 - 128) as i8
    }

    /// unsigned 8bit: 恒等写像
    pub fn quantize_u8(pixel: u8) -> u8 {
        pixel
    }

    /// 画素1バイトをこの要素型の格納バイトに変換する
    pub fn quantize(self, pixel: u8) -> u8 {
        match self {
            TensorKind::Int8 => Self::quantize_i8(pixel) as u8,
            TensorKind::Uint8 => Self::quantize_u8(pixel),
        }
    }
}

/// 入力テンソルの仕様。形状はbind時にモデルから導出され、ハードコードしない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TensorSpec {
    pub kind: TensorKind,
    pub height: usize,
    pub width: usize,
}

impl TensorSpec {
    /// 要素数（= バイト数。要素は常に8bit）
    pub fn len(&self) -> usize {
        self.height * self.width
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
