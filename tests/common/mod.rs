use chargepay::application::engine::PaymentEngine;
use chargepay::infrastructure::in_memory::{
    InMemorySessionStore, InMemoryTransactionStore, RecordingPublisher,
};
use chargepay::infrastructure::ledger::SimulatedXrpl;
use std::sync::Arc;

pub struct Harness {
    pub engine: Arc<PaymentEngine>,
    pub xrpl: SimulatedXrpl,
    pub publisher: RecordingPublisher,
}

/// Builds an engine over in-memory stores and the simulated ledger, keeping
/// handles to the ledger and publisher so tests can script failures and
/// inspect published events.
pub fn harness() -> Harness {
    let xrpl = SimulatedXrpl::new();
    let publisher = RecordingPublisher::new();
    let engine = PaymentEngine::new(
        Box::new(InMemorySessionStore::new()),
        Box::new(InMemoryTransactionStore::new()),
        Box::new(xrpl.clone()),
        Box::new(xrpl.clone()),
        Box::new(publisher.clone()),
    );
    Harness {
        engine: Arc::new(engine),
        xrpl,
        publisher,
    }
}
