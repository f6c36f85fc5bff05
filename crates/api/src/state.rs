use std::sync::Arc;

use db::RunLedger;
use pipeline::job::IngestJob;
use pipeline::preview::Previewer;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<dyn RunLedger>,
    pub job: IngestJob,
    pub previewer: Previewer,
}

#[derive(Debug, Clone)]
pub struct RequestId(pub String);
