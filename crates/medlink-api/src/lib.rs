// medlink-api: Async HTTP layer for MedLink edge devices and the cloud API

pub mod error;
pub mod models;
pub mod probe;
pub mod translate;
pub mod transport;

pub use error::Error;
pub use models::{
    EDGE_SERVICE_ID, HealthResponse, TranslateAudioRequest, TranslateTextRequest,
    TranslationResponse,
};
pub use probe::{DEFAULT_PROBE_TIMEOUT, ProbeSuccess, Prober};
pub use translate::TranslationClient;
pub use transport::TransportConfig;
