//! 基础设施层：持有外部资源（模型接口、状态存储），只暴露能力

pub mod job_store;
pub mod model_invoker;

pub use job_store::{FileJobStore, JobStore, MemoryJobStore};
pub use model_invoker::{ModelInvoker, OpenAiInvoker};
