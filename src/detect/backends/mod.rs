pub mod func;
pub mod stub;

#[cfg(feature = "backend-tract")]
pub mod tract;

pub use func::FnBackend;
pub use stub::StubBackend;

#[cfg(feature = "backend-tract")]
pub use tract::TractBackend;
