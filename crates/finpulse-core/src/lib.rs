//! finpulse-core - Core library for finpulse.
//!
//! This crate provides the real-time activity pipeline behind finpulse:
//! activity ingestion, presence tracking, AI decision scoring with cooldowns,
//! rule-based interventions, live dispatch and periodic engagement.
//!
//! # Example
//!
//! ```ignore
//! use finpulse_core::{Engine, PipelineConfig, PipelineRuntime};
//!
//! let config = PipelineConfig::from_env();
//! let engine = Arc::new(Engine::open(config, reasoning).await?);
//! let mut runtime = PipelineRuntime::new(engine.clone());
//! runtime.start().await?;
//!
//! // Queue activity for the drain loop
//! engine.ingest_activity("user1", event).await;
//!
//! // Score a transaction directly
//! let outcome = engine.score_transaction(&transaction, "user1").await;
//! ```

pub mod activity;
pub mod config;
pub mod cooldown;
pub mod dispatch;
pub mod engagement;
pub mod engine;
pub mod error;
pub mod live;
pub mod presence;
pub mod profile;
pub mod runtime;
pub mod scoring;
pub mod store;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{PipelineConfig, ReasoningProvider, ReasoningProviderConfig};
pub use engine::Engine;
pub use error::{ErrorCode, PulseError, PulseResult};
pub use live::{LiveHub, LiveSubscriber};
pub use runtime::PipelineRuntime;
pub use scoring::{ScoreOutcome, SkipReason};
pub use traits::{
    ExpiringStore, FinanceStore, GenerationOptions, LiveChannel, LiveMessage, LlmConfig,
    LlmResponse, ReasoningModel, ResponseFormat,
};
pub use types::{
    ActivityEvent, ActivityKind, Feedback, Intervention, InterventionStatus, InterventionType,
    Message, MessageRole, PresenceEntry, SessionContext, TransactionPayload,
};
