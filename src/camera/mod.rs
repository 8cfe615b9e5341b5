pub mod capture;

pub use capture::{
    select_backend, BackendCandidate, BackendSelection, CameraAcquirer, FrameReadError,
    NoBackendAvailable, BACKEND_CANDIDATES,
};
