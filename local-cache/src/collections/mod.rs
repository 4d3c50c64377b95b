//! The four storefront collections built on [`VersionedCache`].
//!
//! [`VersionedCache`]: crate::manager::VersionedCache

pub mod compare;
pub mod recently_viewed;
pub mod saved_for_later;
pub mod wishlist;

pub use compare::{CompareError, CompareList};
pub use recently_viewed::{RecentlyViewed, RecentlyViewedProduct, Revalidation};
pub use saved_for_later::{SavedForLater, SavedItem};
pub use wishlist::Wishlist;

use serde::{Deserialize, Serialize};

use crate::validation::Validation;

/// Product fields shared by the wishlist, saved-for-later and compare lists.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSummary {
    pub id: String,
    pub handle: String,
    pub title: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
}

impl ProductSummary {
    pub fn validate(&self) -> Validation {
        Validation::pass()
            .check(!self.id.is_empty(), "id is empty")
            .check(!self.handle.is_empty(), "handle is empty")
            .check(!self.title.is_empty(), "title is empty")
            .merge(validate_price(self.price))
    }
}

pub(crate) fn validate_price(price: f64) -> Validation {
    Validation::pass().check(
        price.is_finite() && price >= 0.0,
        format!("price {price} is not a non-negative number"),
    )
}
