use braid_core::errors::GatewayError;
use braid_core::identity::Caller;
use braid_store::StoreError;

/// User-facing failure taxonomy. The first four variants are synchronous
/// failures surfaced to the calling operation before any mutation; Upstream
/// only ever appears inside deferred tasks, where it is logged and contained.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("upstream failure: {0}")]
    Upstream(#[from] GatewayError),

    #[error("storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ServiceError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NotFound(msg) => Self::NotFound(msg),
            other => Self::Store(other),
        }
    }
}

/// Reject callers with no usable identity: anonymous callers must carry a
/// non-blank client-generated id.
pub fn require_identity(caller: &Caller) -> Result<(), ServiceError> {
    match caller {
        Caller::User(_) => Ok(()),
        Caller::Anonymous(id) if id.is_blank() => Err(ServiceError::InvalidArgument(
            "anonymous client id is required".into(),
        )),
        Caller::Anonymous(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use braid_core::identity::{ClientId, UserId};

    #[test]
    fn store_not_found_maps_to_not_found() {
        let err: ServiceError = StoreError::NotFound("thread 1".into()).into();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[test]
    fn other_store_errors_stay_wrapped() {
        let err: ServiceError = StoreError::Database("locked".into()).into();
        assert!(matches!(err, ServiceError::Store(_)));
    }

    #[test]
    fn blank_anonymous_id_rejected() {
        let caller = Caller::Anonymous(ClientId::from_raw("  "));
        assert!(matches!(
            require_identity(&caller),
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[test]
    fn valid_identities_accepted() {
        assert!(require_identity(&Caller::User(UserId::from_raw("u1"))).is_ok());
        assert!(require_identity(&Caller::Anonymous(ClientId::from_raw("c1"))).is_ok());
    }
}
