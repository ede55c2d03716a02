use ledgerly_core::AggregateId;

/// A request to change exactly one aggregate (e.g. post journal entry X).
///
/// Commands are transient; only the events they produce are stored. The
/// tenant is carried by the command payload and re-checked by the aggregate.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
