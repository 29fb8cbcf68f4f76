// Application layer - Use case interactors

pub mod container;
pub mod inspect_interactor;
pub mod sweep_interactor;

// Re-export interactors
pub use container::{AppContainer, DefaultAppContainer};
pub use inspect_interactor::InspectInteractor;
pub use sweep_interactor::{SweepInteractor, SweepReport};
