use ledgerly_core::TenantId;

use crate::EventEnvelope;

/// Messages that belong to exactly one tenant (company).
///
/// Projections use this to refuse events whose payload tenant differs from
/// the envelope tenant.
pub trait TenantScoped {
    fn tenant_id(&self) -> TenantId;
}

impl<E> TenantScoped for EventEnvelope<E> {
    fn tenant_id(&self) -> TenantId {
        self.tenant_id()
    }
}
