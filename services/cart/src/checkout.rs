//! Rules the purchase transaction applies to a locked cart

use common::proto::{AdvertStatus, CartStatus, cart::AdvertSnapshot};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{CartError, CartResult};

/// The cart row as read under its lock
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CartHeader {
    pub id: Uuid,
    pub user_id: Uuid,
    pub status: CartStatus,
}

/// Check a locked cart and its locked adverts before converting them into
/// purchases. Ownership is checked before status.
pub fn validate(cart: &CartHeader, user_id: Uuid, adverts: &[AdvertSnapshot]) -> CartResult<()> {
    if cart.user_id != user_id {
        return Err(CartError::Forbidden);
    }
    if cart.status != CartStatus::Active {
        return Err(CartError::CartInactive);
    }
    if adverts.is_empty() {
        return Err(CartError::EmptyCart);
    }
    if let Some(advert) = adverts.iter().find(|a| a.status != AdvertStatus::Active) {
        return Err(CartError::AdvertUnavailable(advert.id));
    }
    Ok(())
}

/// Split cart items into one group per seller, each group becoming a purchase
pub fn group_by_seller(adverts: &[AdvertSnapshot]) -> BTreeMap<Uuid, Vec<AdvertSnapshot>> {
    let mut groups: BTreeMap<Uuid, Vec<AdvertSnapshot>> = BTreeMap::new();
    for advert in adverts {
        groups
            .entry(advert.seller_id)
            .or_default()
            .push(AdvertSnapshot {
                status: AdvertStatus::Reserved,
                ..advert.clone()
            });
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn advert(seller_id: Uuid, status: AdvertStatus) -> AdvertSnapshot {
        AdvertSnapshot {
            id: Uuid::new_v4(),
            seller_id,
            title: "Bike".to_string(),
            price: 12000,
            image_id: None,
            status,
        }
    }

    fn cart(user_id: Uuid, status: CartStatus) -> CartHeader {
        CartHeader {
            id: Uuid::new_v4(),
            user_id,
            status,
        }
    }

    #[test]
    fn test_owner_mismatch_is_forbidden() {
        let owner = Uuid::new_v4();
        let items = [advert(Uuid::new_v4(), AdvertStatus::Active)];
        assert!(matches!(
            validate(&cart(owner, CartStatus::Inactive), Uuid::new_v4(), &items),
            Err(CartError::Forbidden)
        ));
    }

    #[test]
    fn test_inactive_cart_is_rejected() {
        let owner = Uuid::new_v4();
        let items = [advert(Uuid::new_v4(), AdvertStatus::Active)];
        assert!(matches!(
            validate(&cart(owner, CartStatus::Inactive), owner, &items),
            Err(CartError::CartInactive)
        ));
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let owner = Uuid::new_v4();
        assert!(matches!(
            validate(&cart(owner, CartStatus::Active), owner, &[]),
            Err(CartError::EmptyCart)
        ));
    }

    #[test]
    fn test_reserved_advert_is_unavailable() {
        let owner = Uuid::new_v4();
        let seller = Uuid::new_v4();
        let taken = advert(seller, AdvertStatus::Reserved);
        let items = [advert(seller, AdvertStatus::Active), taken.clone()];

        match validate(&cart(owner, CartStatus::Active), owner, &items) {
            Err(CartError::AdvertUnavailable(id)) => assert_eq!(id, taken.id),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_grouping_splits_sellers_and_reserves() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let items = [
            advert(first, AdvertStatus::Active),
            advert(second, AdvertStatus::Active),
            advert(first, AdvertStatus::Active),
        ];

        let groups = group_by_seller(&items);

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[&first].len(), 2);
        assert_eq!(groups[&second].len(), 1);
        assert!(
            groups
                .values()
                .flatten()
                .all(|a| a.status == AdvertStatus::Reserved)
        );
    }
}
