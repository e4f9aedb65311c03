pub mod client;
pub mod session;
pub mod uploader;

pub use client::{
    parse_server_config, CollectorTransport, HttpCollector, ServerConfig, UploadError,
    REPORT_ID_HEADER,
};
pub use session::SessionIdentity;
pub use uploader::{DeliveryStats, OutboundBatch, Uploader, UploaderHandle, UploaderOptions};
