//! 判定結果のオーバーレイ描画

use opencv::core::{Mat, Point, Scalar};
use opencv::imgproc;

use crate::decision::DecisionState;

/// 状態に対応するラベル文字列
pub fn label(state: &DecisionState) -> &'static str {
    match state {
        DecisionState::Decided(d) if d.is_person => "person: YES",
        DecisionState::Decided(_) => "person: no",
        DecisionState::Unavailable => "person: --",
    }
}

/// 状態に対応する前景色 (BGR): 人あり=緑、人なし=赤、判定不能=アンバー
fn color(state: &DecisionState) -> Scalar {
    match state {
        DecisionState::Decided(d) if d.is_person => Scalar::new(0.0, 255.0, 0.0, 0.0),
        DecisionState::Decided(_) => Scalar::new(0.0, 0.0, 255.0, 0.0),
        DecisionState::Unavailable => Scalar::new(0.0, 191.0, 255.0, 0.0),
    }
}

/// フレーム左上に判定ラベルを描き込む。
/// 背景（黒・太字）の上に前景色を重ねて視認性を確保する。
pub fn annotate(frame: &mut Mat, state: &DecisionState) -> opencv::Result<()> {
    let text = label(state);
    let origin = Point::new(20, 30);

    imgproc::put_text(
        frame,
        text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.8,
        Scalar::new(0.0, 0.0, 0.0, 0.0),
        4,
        imgproc::LINE_8,
        false,
    )?;
    imgproc::put_text(
        frame,
        text,
        origin,
        imgproc::FONT_HERSHEY_SIMPLEX,
        0.8,
        color(state),
        2,
        imgproc::LINE_8,
        false,
    )?;

    Ok(())
}
