pub mod registry;

pub use registry::TargetRegistry;
