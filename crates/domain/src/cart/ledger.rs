use common::{OwnerId, RecordId};
use doc_store::{Collection, Document, DocumentStore, Record, StoreError};

use crate::error::DomainError;
use crate::pricing;
use crate::product::{ProductId, ProductSnapshot};
use crate::retry::{MAX_WRITE_RETRIES, lost_race, note_retry};

use super::{CartError, CartItem, CartSnapshot, HeldRow};

/// One cart per owner, consolidated by product and variation.
///
/// Every write is a compare-and-swap on the item's version, and new rows are
/// guarded by the consolidation key, so concurrent adds of the same product
/// never produce two rows or lose an increment.
#[derive(Clone)]
pub struct CartLedger<S> {
    items: Collection<S, CartItem>,
}

impl<S: DocumentStore> CartLedger<S> {
    pub fn new(store: S) -> Self {
        Self {
            items: Collection::new(store),
        }
    }

    /// Adds `quantity` units of a product, merging with an existing row for
    /// the same product and variation.
    ///
    /// The row's price and stock are refreshed from `product` on every add.
    /// The unit price (base plus variation modifier) must lie within
    /// `0..=MAX_UNIT_PRICE`.
    #[tracing::instrument(skip(self, product), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: &OwnerId,
        product_id: &ProductId,
        quantity: u32,
        product: &ProductSnapshot,
    ) -> Result<Record<CartItem>, DomainError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }

        let variation_key = product.variation_key();
        let key = CartItem::consolidation_key(owner, product_id, variation_key);
        let unit_price = pricing::unit_price(
            product.price,
            product.variation.as_ref().map(|v| v.price_modifier),
        );
        if unit_price.is_negative() || unit_price > pricing::MAX_UNIT_PRICE {
            return Err(CartError::InvalidPrice { unit_price }.into());
        }
        let available = product.available_stock();

        for attempt in 1..=MAX_WRITE_RETRIES {
            let existing = self.items.find_by_key(&key).await?;
            if let Some(current) = &existing
                && !current.data.is_same_line(owner, product_id, variation_key)
            {
                tracing::error!(
                    item_id = %current.id,
                    key = %key,
                    "consolidation key names a different row"
                );
                return Err(StoreError::DuplicateKey {
                    collection: CartItem::COLLECTION.to_string(),
                    key,
                }
                .into());
            }

            let requested = match &existing {
                Some(current) => current.data.quantity.saturating_add(quantity),
                None => quantity,
            };
            if requested > available {
                return Err(CartError::OutOfStock {
                    requested,
                    available,
                }
                .into());
            }

            let item = CartItem {
                owner_id: owner.clone(),
                product_id: product_id.clone(),
                variation_key: variation_key.map(str::to_string),
                product_name: product.name.clone(),
                quantity: requested,
                unit_price,
                stock_at_add_time: available,
            };

            let written = match &existing {
                Some(current) => self.items.replace(current, item).await,
                None => self.items.insert(item).await,
            };

            match written {
                Ok(record) => {
                    metrics::counter!("cart_mutations_total", "operation" => "add").increment(1);
                    tracing::info!(item_id = %record.id, quantity = requested, "cart item saved");
                    return Ok(record);
                }
                Err(e) if lost_race(&e) => note_retry("cart.add_item", attempt),
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::ContentionExhausted {
            operation: "cart.add_item",
            attempts: MAX_WRITE_RETRIES,
        })
    }

    /// Sets the quantity of an existing row.
    #[tracing::instrument(skip(self), fields(owner = %owner))]
    pub async fn set_quantity(
        &self,
        owner: &OwnerId,
        item_id: RecordId,
        quantity: u32,
    ) -> Result<Record<CartItem>, DomainError> {
        if quantity < 1 {
            return Err(CartError::InvalidQuantity { quantity }.into());
        }

        for attempt in 1..=MAX_WRITE_RETRIES {
            let current = self.owned_item(owner, item_id).await?;

            if quantity > current.data.stock_at_add_time {
                return Err(CartError::OutOfStock {
                    requested: quantity,
                    available: current.data.stock_at_add_time,
                }
                .into());
            }

            let mut item = current.data.clone();
            item.quantity = quantity;

            match self.items.replace(&current, item).await {
                Ok(record) => {
                    metrics::counter!("cart_mutations_total", "operation" => "set_quantity")
                        .increment(1);
                    return Ok(record);
                }
                Err(e) if lost_race(&e) => note_retry("cart.set_quantity", attempt),
                Err(e) => return Err(e.into()),
            }
        }

        Err(DomainError::ContentionExhausted {
            operation: "cart.set_quantity",
            attempts: MAX_WRITE_RETRIES,
        })
    }

    /// Removes a row. Returns false if the owner had no such row.
    #[tracing::instrument(skip(self), fields(owner = %owner))]
    pub async fn remove_item(&self, owner: &OwnerId, item_id: RecordId) -> Result<bool, DomainError> {
        match self.items.get(item_id).await? {
            Some(record) if record.data.owner_id == *owner => {
                let removed = self.items.delete(item_id).await?;
                if removed {
                    metrics::counter!("cart_mutations_total", "operation" => "remove").increment(1);
                }
                Ok(removed)
            }
            _ => Ok(false),
        }
    }

    /// Removes every row of the owner's cart, returning how many went.
    #[tracing::instrument(skip(self), fields(owner = %owner))]
    pub async fn clear(&self, owner: &OwnerId) -> Result<u64, DomainError> {
        let removed = self.items.delete_partition(owner.as_str()).await?;
        metrics::counter!("cart_mutations_total", "operation" => "clear").increment(1);
        Ok(removed)
    }

    /// Rows of the owner's cart in the order they were first added.
    pub async fn items(&self, owner: &OwnerId) -> Result<Vec<Record<CartItem>>, DomainError> {
        Ok(self.items.list_partition(owner.as_str()).await?)
    }

    /// Priced, read-only view of the owner's cart.
    #[tracing::instrument(skip(self), fields(owner = %owner))]
    pub async fn snapshot(&self, owner: &OwnerId) -> Result<CartSnapshot, DomainError> {
        let items = self.items(owner).await?;
        Ok(CartSnapshot::from_records(owner.clone(), &items))
    }

    /// Removes exactly the rows `snapshot` priced, each at the version it saw.
    ///
    /// If any row was changed or removed since, the rows already taken are
    /// put back and `CartChanged` is returned. Rows added after the snapshot
    /// are left alone. Two checkouts of the same snapshot cannot both
    /// succeed.
    #[tracing::instrument(skip(self, snapshot), fields(owner = %snapshot.owner_id()))]
    pub async fn consume(&self, snapshot: &CartSnapshot) -> Result<(), DomainError> {
        let rows = snapshot.held_rows();
        if rows.len() != snapshot.items().len() {
            return Err(CartError::CartChanged.into());
        }

        let mut taken: Vec<&HeldRow> = Vec::with_capacity(rows.len());
        for row in rows {
            let outcome = self.items.delete_version(row.id, row.version).await;
            match outcome {
                Ok(true) => taken.push(row),
                Ok(false) | Err(StoreError::ConcurrencyConflict { .. }) => {
                    tracing::info!(item_id = %row.id, "cart row changed before checkout");
                    self.put_back(&taken).await;
                    return Err(CartError::CartChanged.into());
                }
                Err(e) => {
                    self.put_back(&taken).await;
                    return Err(e.into());
                }
            }
        }

        metrics::counter!("cart_mutations_total", "operation" => "consume").increment(1);
        Ok(())
    }

    /// Puts back every row of a consumed snapshot.
    pub async fn restore(&self, snapshot: &CartSnapshot) {
        let rows: Vec<&HeldRow> = snapshot.held_rows().iter().collect();
        self.put_back(&rows).await;
    }

    // Best effort: a row re-added by the owner in the meantime wins.
    async fn put_back(&self, rows: &[&HeldRow]) {
        for row in rows {
            if let Err(e) = self.items.insert(row.item.clone()).await {
                tracing::warn!(
                    error = %e,
                    product_id = %row.item.product_id,
                    quantity = row.item.quantity,
                    "cart row not restored"
                );
            }
        }
    }

    async fn owned_item(
        &self,
        owner: &OwnerId,
        item_id: RecordId,
    ) -> Result<Record<CartItem>, DomainError> {
        match self.items.get(item_id).await? {
            Some(record) if record.data.owner_id == *owner => Ok(record),
            _ => Err(CartError::CartItemNotFound(item_id).into()),
        }
    }
}
