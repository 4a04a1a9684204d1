pub mod error;
pub mod orchestrator;
pub mod plan_capture;
pub mod reconciler;

pub use error::{ReconcileError, ReconcileResult};
pub use orchestrator::PodOrchestrator;
pub use plan_capture::PlanCapture;
pub use reconciler::TableReconciler;
