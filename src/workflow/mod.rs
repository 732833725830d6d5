pub mod application_ctx;
pub mod application_flow;

pub use application_ctx::ApplicationCtx;
pub use application_flow::ApplicationFlow;
