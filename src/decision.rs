//! 2クラスのロジットを二値判定に変換する。純関数・状態なし。

/// 出力テンソルの先頭2要素（no, yes）。同一の出力読み出しに由来すること。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Logits {
    pub no: i32,
    pub yes: i32,
}

/// マージンの判定しきい値。margin > THRESHOLD で「人あり」（厳密な不等号）。
pub const DECISION_THRESHOLD: i32 = 20;

/// フレーム1枚分の判定。毎イテレーション再計算され、持ち越さない。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub is_person: bool,
    /// yesスコア − noスコア
    pub margin: i32,
}

/// そのフレームについて描画すべき状態。
/// 推論失敗は「人なし」と区別できる形で保持する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionState {
    Decided(Decision),
    /// 推論が失敗し、このフレームに有効な判定がない
    Unavailable,
}

/// ロジットマージンによる二値判定
pub fn decide(no: i32, yes: i32) -> Decision {
    let margin = yes - no;
    Decision {
        is_person: margin > DECISION_THRESHOLD,
        margin,
    }
}
