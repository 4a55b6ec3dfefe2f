//! Core module - catalog, cache and file handling

pub mod cache;
pub mod catalog;
pub mod config;
pub mod identity;
pub mod pipeline;
pub mod record;
pub mod scanner;
pub mod transfer;
pub mod view;
pub mod xci;

pub use cache::{CacheError, CacheStats, MetadataCache, SyncStats};
pub use catalog::{ApplyOutcome, Catalog, CatalogSettings, RefreshOutcome};
pub use config::{Config, ConfigError};
pub use identity::{CartridgeId, FileNameSha256, IdentityStrategy};
pub use pipeline::{PipelineEvent, RefreshPipeline};
pub use record::{CartridgeRecord, FileOpKind, FileOperation, GameMetadata, Location};
pub use transfer::{TransferError, TransferGate};
pub use view::{CatalogView, NullView};
pub use xci::{MetadataParser, XciHeaderParser};
