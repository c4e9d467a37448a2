pub mod auth;
pub mod batch;
pub mod config;
pub mod engine;
pub mod executor;
pub mod metrics;
pub mod progress;
pub mod testing;

pub use auth::{
    create_authenticator, AuthConfig, AuthError, AuthMethod, Authenticator, Identity,
    NoneAuthenticator,
};
pub use batch::{
    ArtifactPayload, Batch, BatchFilter, BatchStatus, BatchStore, CreateBatchRequest, Item,
    ItemStageState, SqliteBatchStore, StageCounters, StageOutcome, StageResult, StoreError,
};
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, EngineConfig,
    ExecutorConfig, FaultPolicy, SanitizedConfig, StageClass, StageConfig,
};
pub use engine::{EngineError, GateConfirmation, PipelineManager, StopFlag};
pub use executor::{
    build_registry, CommandConfig, CommandExecutor, ExecutorError, ExecutorRegistry, StepExecutor,
    StepOutcome, WebhookConfig, WebhookExecutor,
};
pub use progress::{JobStatus, ProgressReporter, StatusBoard};
