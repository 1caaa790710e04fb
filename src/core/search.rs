use crate::models::{PropertyPage, PropertyRecord, SearchRequest};
use crate::services::address::AddressResolver;
use crate::services::repository::{PropertyRepository, RowSource};

/// Listing search over the repository
///
/// A zip code narrows results to its resolved neighborhood. Any miss along the
/// way (unknown zip code, no matching rows) is reported as `None`.
pub struct PropertySearch<S: RowSource> {
    repository: PropertyRepository<S>,
    resolver: AddressResolver,
}

impl<S: RowSource> PropertySearch<S> {
    pub fn new(repository: PropertyRepository<S>, resolver: AddressResolver) -> Self {
        Self {
            repository,
            resolver,
        }
    }

    pub async fn search(&self, request: &SearchRequest) -> Option<PropertyPage> {
        let neighborhood = if request.zip_code.trim().is_empty() {
            None
        } else {
            match self.resolver.resolve(&request.zip_code).await {
                Some(address) => Some(address.neighborhood_name),
                None => {
                    tracing::info!("Address not found - Zip Code: {}", request.zip_code);
                    return None;
                }
            }
        };

        let filter = request.to_filter(neighborhood);
        let data = self.repository.select_all(&filter, request.pagination()).await;
        if data.is_empty() {
            tracing::debug!("No properties for {:?}", filter);
            return None;
        }

        let count = self.repository.count_select_all(true).await;
        Some(PropertyPage { count, data })
    }

    pub async fn find(&self, id: i64) -> Option<PropertyRecord> {
        self.repository.select_by_id(id).await
    }
}
