//! Cart and purchase errors

use common::error::{DatabaseError, ServiceError};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum CartError {
    #[error("cart not found")]
    CartNotFound,

    #[error("advert {0} not found")]
    AdvertNotFound(Uuid),

    #[error("advert {0} is not in the cart")]
    NotInCart(Uuid),

    #[error("cart belongs to another user")]
    Forbidden,

    #[error("cart is not active")]
    CartInactive,

    #[error("cart is empty")]
    EmptyCart,

    #[error("advert {0} is not available")]
    AdvertUnavailable(Uuid),

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

pub type CartResult<T> = Result<T, CartError>;

impl From<CartError> for ServiceError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::CartNotFound | CartError::AdvertNotFound(_) | CartError::NotInCart(_) => {
                ServiceError::NotFound(err.to_string())
            }
            CartError::Forbidden => ServiceError::Forbidden(err.to_string()),
            CartError::CartInactive | CartError::AdvertUnavailable(_) => {
                ServiceError::Conflict(err.to_string())
            }
            CartError::EmptyCart => ServiceError::BadRequest(err.to_string()),
            CartError::Database(e) => e.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_aborts_are_not_retryable() {
        assert_eq!(
            ServiceError::from(CartError::CartInactive),
            ServiceError::Conflict("cart is not active".to_string())
        );
        assert_eq!(
            ServiceError::from(CartError::Forbidden).kind(),
            "forbidden"
        );
        assert_eq!(ServiceError::from(CartError::CartNotFound).kind(), "not_found");
    }

    #[test]
    fn test_storage_failures_are_retryable() {
        let err = ServiceError::from(CartError::Database(DatabaseError::Timeout(
            std::time::Duration::from_secs(5),
        )));
        assert_eq!(err.kind(), "transaction_failed");
    }
}
