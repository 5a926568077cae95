// Application layer - Engine lifecycle and use case interactors

pub mod container;
pub mod lifecycle;
pub mod trim_interactor;

// Re-export interactors
pub use container::TrimService;
pub use lifecycle::{EngineDiagnostics, EngineLifecycle, ResourceNames};
pub use trim_interactor::{CancellationFlag, TrimInteractor};
