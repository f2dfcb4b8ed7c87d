pub mod config;
pub mod dispatch;
pub mod indexer;
pub mod metrics;
pub mod searcher;
pub mod selection;
pub mod testing;

pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, SanitizedConfig,
};
pub use dispatch::{DispatchError, Dispatcher, DownloadClient, GrabReceipt};
pub use indexer::{IndexerDescriptor, IndexerRegistry, IndexerStore, SqliteIndexerStore};
pub use searcher::{
    AdapterSet, EngineError, Release, ReleaseEngine, SearchOutcome, SearchPhase, SearchRequest,
};
pub use selection::{QualityProfile, SelectError, Selection, SelectionPolicy};
