//! カメラフレームを量子化済み入力テンソルに変換する。
//! グレースケール化 → INTER_AREAリサイズ → 要素型ごとの画素マッピング。

use opencv::{
    core::{Mat, Size},
    imgproc,
    prelude::*,
};
use thiserror::Error;

use crate::infer::TensorSpec;

#[derive(Debug, Error)]
pub enum TransformError {
    #[error("image operation failed: {0}")]
    Cv(#[from] opencv::Error),
}

/// BGRフレームをモデル入力のバイト列に変換する。
/// リサイズはINTER_AREA（縮小時にローパスしてからデシメートするためエイリアシングが出ない）。
pub fn transform(frame: &Mat, spec: &TensorSpec) -> Result<Vec<u8>, TransformError> {
    let mut gray = Mat::default();
    imgproc::cvt_color_def(frame, &mut gray, imgproc::COLOR_BGR2GRAY)?;

    let mut resized = Mat::default();
    imgproc::resize(
        &gray,
        &mut resized,
        Size::new(spec.width as i32, spec.height as i32),
        0.0,
        0.0,
        imgproc::INTER_AREA,
    )?;

    // リサイズ直後のMatは連続領域なのでそのまま舐められる
    let pixels = resized.data_bytes()?;
    Ok(pixels.iter().map(|p| spec.kind.quantize(*p)).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infer::TensorKind;
    use opencv::core::{Scalar, CV_8UC3};

    fn uniform_frame(value: f64, rows: i32, cols: i32) -> Mat {
        Mat::new_rows_cols_with_default(rows, cols, CV_8UC3, Scalar::all(value)).unwrap()
    }

    fn spec(kind: TensorKind) -> TensorSpec {
        TensorSpec {
            kind,
            height: 96,
            width: 96,
        }
    }

    #[test]
    fn test_output_length_matches_spec() {
        let frame = uniform_frame(90.0, 480, 640);
        for kind in [TensorKind::Int8, TensorKind::Uint8] {
            let out = transform(&frame, &spec(kind)).unwrap();
            assert_eq!(out.len(), 96 * 96, "kind {:?}", kind);
        }
    }

    #[test]
    fn test_uniform_200_frame_maps_to_72_signed() {
        // B=G=R=200 のグレースケールは正確に200になり、i8写像で 200-128=72
        let frame = uniform_frame(200.0, 480, 640);
        let out = transform(&frame, &spec(TensorKind::Int8)).unwrap();
        assert!(
            out.iter().all(|&b| b as i8 == 72),
            "expected uniform 72, got {:?}...",
            &out[..8]
        );
    }

    #[test]
    fn test_uniform_frame_is_identity_unsigned() {
        let frame = uniform_frame(200.0, 480, 640);
        let out = transform(&frame, &spec(TensorKind::Uint8)).unwrap();
        assert!(out.iter().all(|&b| b == 200));
    }

    #[test]
    fn test_values_stay_in_range_per_kind() {
        // グラデーションで全域の画素値を通す
        let mut frame = uniform_frame(0.0, 256, 256);
        for y in 0..256 {
            for x in 0..256 {
                let px = frame.at_2d_mut::<opencv::core::Vec3b>(y, x).unwrap();
                *px = opencv::core::Vec3b::from([y as u8, y as u8, y as u8]);
            }
        }
        let signed = transform(&frame, &spec(TensorKind::Int8)).unwrap();
        for &b in &signed {
            let v = b as i8 as i16;
            assert!((-128..=127).contains(&v));
        }
        let unsigned = transform(&frame, &spec(TensorKind::Uint8)).unwrap();
        assert_eq!(unsigned.len(), 96 * 96);
    }

    #[test]
    fn test_upscale_also_lands_on_exact_dims() {
        // 入力がターゲットより小さくても出力サイズは厳密に spec 通り
        let frame = uniform_frame(128.0, 32, 32);
        let out = transform(&frame, &spec(TensorKind::Int8)).unwrap();
        assert_eq!(out.len(), 96 * 96);
        assert!(out.iter().all(|&b| b as i8 == 0));
    }
}
