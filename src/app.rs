//! メインループとアプリケーション組み立て。
//! read → transform → invoke → decide → render → quitポーリング を1スレッドで順に回す。

use std::thread;
use std::time::Duration;

use anyhow::Result;
use opencv::core::Mat;
use thiserror::Error;

use crate::camera::{CameraAcquirer, FrameReadError, NoBackendAvailable};
use crate::config::Config;
use crate::decision::{decide, DecisionState};
use crate::infer::{Arena, EngineError, InferenceEngine, Model, ModelError};
use crate::render::{overlay, MinifbRenderer};
use crate::transform::transform;

/// 致命的エラー。終了コードへの対応はexit_code()が持つ。
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error(transparent)]
    Camera(#[from] NoBackendAvailable),
    #[error(transparent)]
    Runtime(#[from] anyhow::Error),
}

impl AppError {
    /// モデル/スキーマ/アリーナ/表示の失敗は1、カメラ全滅は2
    pub fn exit_code(&self) -> u8 {
        match self {
            AppError::Camera(_) => 2,
            _ => 1,
        }
    }
}

/// フレーム供給源。失敗はすべて一時的なものとして表現される。
pub trait FrameSource {
    fn read(&mut self) -> Result<Mat, FrameReadError>;
}

impl FrameSource for CameraAcquirer {
    fn read(&mut self) -> Result<Mat, FrameReadError> {
        CameraAcquirer::read(self)
    }
}

/// フレーム1枚を判定状態に変換する。Errは致命的失敗のみ。
/// 推論の一時的失敗はDecisionState::Unavailableとして吸収する。
pub trait Classify {
    fn classify(&mut self, frame: &Mat) -> Result<DecisionState>;
}

/// 判定つきフレームの提示とquit検知
pub trait Present {
    fn present(&mut self, frame: &mut Mat, state: &DecisionState) -> Result<()>;
    fn is_open(&self) -> bool;
}

/// 変換→推論→判定のパイプライン本体
pub struct PersonClassifier {
    engine: InferenceEngine,
}

impl PersonClassifier {
    pub fn new(engine: InferenceEngine) -> Self {
        Self { engine }
    }
}

impl Classify for PersonClassifier {
    fn classify(&mut self, frame: &Mat) -> Result<DecisionState> {
        let spec = self.engine.input_spec();
        let input = transform(frame, &spec)?;
        Ok(match self.engine.invoke(&input) {
            Ok(logits) => DecisionState::Decided(decide(logits.no, logits.yes)),
            Err(err) => {
                // 失敗フレームは判定なし。エンジンはReadyのままなので続行できる。
                eprintln!("invoke failed: {err}");
                DecisionState::Unavailable
            }
        })
    }
}

/// minifbウィンドウへの提示
pub struct WindowPresenter {
    renderer: MinifbRenderer,
}

impl WindowPresenter {
    pub fn new(renderer: MinifbRenderer) -> Self {
        Self { renderer }
    }
}

impl Present for WindowPresenter {
    fn present(&mut self, frame: &mut Mat, state: &DecisionState) -> Result<()> {
        overlay::annotate(frame, state)?;
        self.renderer.draw_frame(frame)?;
        self.renderer.update()?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.renderer.is_open()
    }
}

/// フレームごとのサイクルを駆動する。
/// 毎イテレーションに有界の待機が入り、ビジースピンしない。
pub struct LoopController<S, C, P> {
    source: S,
    classifier: C,
    presenter: P,
    frame_interval: Duration,
    retry_interval: Duration,
}

impl<S: FrameSource, C: Classify, P: Present> LoopController<S, C, P> {
    pub fn new(
        source: S,
        classifier: C,
        presenter: P,
        frame_interval: Duration,
        retry_interval: Duration,
    ) -> Self {
        Self {
            source,
            classifier,
            presenter,
            frame_interval,
            retry_interval,
        }
    }

    /// quitか致命的エラーまで回し続ける。正常quitはOk(())。
    pub fn run(&mut self) -> Result<()> {
        while self.presenter.is_open() {
            let mut frame = match self.source.read() {
                Ok(frame) => frame,
                Err(err) => {
                    // 1回の取りこぼしは致命的ではない。待ってから同じ位置でリトライ。
                    eprintln!("{err}; retrying");
                    thread::sleep(self.retry_interval);
                    continue;
                }
            };

            // 判定はこのフレームの描画前に必ず確定する
            let state = self.classifier.classify(&frame)?;
            self.presenter.present(&mut frame, &state)?;

            // 表示リフレッシュ兼ループペーシング
            thread::sleep(self.frame_interval);
        }
        Ok(())
    }
}

/// 起動から終了までの組み立て。致命的エラーはすべてループ開始前に表面化する。
pub fn run(config: &Config, model_path: &str, camera_index: i32) -> Result<(), AppError> {
    let model = Model::load(model_path)?;
    let arena = Arena::with_capacity(config.model.arena_kib * 1024);
    let engine = InferenceEngine::bind(model, arena)?;

    let spec = engine.input_spec();
    println!(
        "input tensor: {}x{} {:?}, arena {} KiB",
        spec.width, spec.height, spec.kind, config.model.arena_kib
    );

    let camera = CameraAcquirer::acquire(camera_index, &config.camera)?;
    let (width, height) = camera.resolution();

    let renderer = MinifbRenderer::new(&config.display.title, width as usize, height as usize)?;
    println!("press Q or ESC to quit");

    let mut controller = LoopController::new(
        camera,
        PersonClassifier::new(engine),
        WindowPresenter::new(renderer),
        Duration::from_millis(config.display.frame_interval_ms),
        Duration::from_millis(config.display.retry_interval_ms),
    );
    controller.run()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decision::Decision;
    use std::cell::Cell;
    use std::collections::VecDeque;

    struct ScriptedSource {
        events: VecDeque<Result<(), FrameReadError>>,
        reads: usize,
    }

    impl ScriptedSource {
        fn new(events: Vec<Result<(), FrameReadError>>) -> Self {
            Self {
                events: events.into(),
                reads: 0,
            }
        }
    }

    impl FrameSource for ScriptedSource {
        fn read(&mut self) -> Result<Mat, FrameReadError> {
            self.reads += 1;
            match self.events.pop_front() {
                Some(Ok(())) | None => Ok(Mat::default()),
                Some(Err(e)) => Err(e),
            }
        }
    }

    struct FixedClassifier {
        state: DecisionState,
        fail: bool,
    }

    impl Classify for FixedClassifier {
        fn classify(&mut self, _frame: &Mat) -> Result<DecisionState> {
            if self.fail {
                anyhow::bail!("fatal classify failure");
            }
            Ok(self.state)
        }
    }

    struct RecordingPresenter {
        states: Vec<DecisionState>,
        max_presents: usize,
        open_checks: Cell<usize>,
    }

    impl RecordingPresenter {
        fn until(max_presents: usize) -> Self {
            Self {
                states: Vec::new(),
                max_presents,
                open_checks: Cell::new(0),
            }
        }
    }

    impl Present for RecordingPresenter {
        fn present(&mut self, _frame: &mut Mat, state: &DecisionState) -> Result<()> {
            self.states.push(*state);
            Ok(())
        }

        fn is_open(&self) -> bool {
            self.open_checks.set(self.open_checks.get() + 1);
            self.states.len() < self.max_presents
        }
    }

    fn transient() -> FrameReadError {
        FrameReadError {
            reason: "dropped".to_string(),
        }
    }

    fn controller<S: FrameSource, C: Classify, P: Present>(
        source: S,
        classifier: C,
        presenter: P,
    ) -> LoopController<S, C, P> {
        LoopController::new(
            source,
            classifier,
            presenter,
            Duration::from_millis(0),
            Duration::from_millis(0),
        )
    }

    #[test]
    fn test_transient_read_retries_without_advancing() {
        let source = ScriptedSource::new(vec![Err(transient()), Err(transient()), Ok(())]);
        let classifier = FixedClassifier {
            state: DecisionState::Decided(Decision {
                is_person: false,
                margin: 0,
            }),
            fail: false,
        };
        let presenter = RecordingPresenter::until(1);
        let mut c = controller(source, classifier, presenter);
        c.run().expect("transient reads must not be fatal");
        assert_eq!(c.source.reads, 3, "two retries then one success");
        assert_eq!(c.presenter.states.len(), 1, "only the successful frame is presented");
    }

    #[test]
    fn test_repeated_invoke_failures_do_not_crash_or_stale() {
        let source = ScriptedSource::new(vec![]);
        let classifier = FixedClassifier {
            state: DecisionState::Unavailable,
            fail: false,
        };
        let presenter = RecordingPresenter::until(5);
        let mut c = controller(source, classifier, presenter);
        c.run().expect("invoke failures must not kill the loop");
        assert_eq!(c.presenter.states.len(), 5);
        for state in &c.presenter.states {
            // 失敗フレームは毎回Unavailable。過去の判定が漏れてはいけない。
            assert_eq!(*state, DecisionState::Unavailable);
        }
    }

    #[test]
    fn test_quit_before_first_frame_reads_nothing() {
        let source = ScriptedSource::new(vec![]);
        let classifier = FixedClassifier {
            state: DecisionState::Unavailable,
            fail: false,
        };
        let presenter = RecordingPresenter::until(0);
        let mut c = controller(source, classifier, presenter);
        c.run().unwrap();
        assert_eq!(c.source.reads, 0, "closed window means no iteration runs");
    }

    #[test]
    fn test_fatal_classify_error_stops_loop() {
        let source = ScriptedSource::new(vec![]);
        let classifier = FixedClassifier {
            state: DecisionState::Unavailable,
            fail: true,
        };
        let presenter = RecordingPresenter::until(3);
        let mut c = controller(source, classifier, presenter);
        assert!(c.run().is_err());
        assert!(c.presenter.states.is_empty(), "nothing presented after fatal error");
    }

    #[test]
    fn test_exit_codes() {
        let camera: AppError = NoBackendAvailable { index: 0 }.into();
        assert_eq!(camera.exit_code(), 2);

        let model: AppError = ModelError::NotFound("x.onnx".into()).into();
        assert_eq!(model.exit_code(), 1);

        let engine: AppError = EngineError::ArenaExhausted {
            required: 1024,
            capacity: 512,
        }
        .into();
        assert_eq!(engine.exit_code(), 1);
    }
}
