//! テンソルアリーナ。固定容量のバイト領域からbind時にセグメントを切り出す。
//! 動的な拡張はしない。

/// セグメントのアラインメント（バイト）
const SEGMENT_ALIGN: usize = 16;

/// アリーナ内の連続領域
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub offset: usize,
    pub len: usize,
}

/// 固定容量のテンソルアリーナ。起動時に1回確保し、所有権ごとエンジンに渡す。
pub struct Arena {
    buf: Box<[u8]>,
}

impl Arena {
    pub fn with_capacity(bytes: usize) -> Self {
        Self {
            buf: vec![0u8; bytes].into_boxed_slice(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn segment(&self, seg: Segment) -> &[u8] {
        &self.buf[seg.offset..seg.offset + seg.len]
    }

    pub fn segment_mut(&mut self, seg: Segment) -> &mut [u8] {
        &mut self.buf[seg.offset..seg.offset + seg.len]
    }
}

fn align_up(n: usize) -> usize {
    (n + SEGMENT_ALIGN - 1) & !(SEGMENT_ALIGN - 1)
}

/// 要求サイズ列をアリーナ容量から切り出す。容量不足なら必要量をErrで返す。
/// bind時に1回だけ呼ばれ、ループ中の再配置はない。
pub fn carve(capacity: usize, lens: &[usize]) -> Result<Vec<Segment>, usize> {
    let mut segments = Vec::with_capacity(lens.len());
    let mut offset = 0usize;
    for &len in lens {
        segments.push(Segment { offset, len });
        offset += align_up(len);
    }
    if offset > capacity {
        return Err(offset);
    }
    Ok(segments)
}
