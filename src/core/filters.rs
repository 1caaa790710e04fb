use crate::models::{PropertyRecord, SearchFilter};

/// Check whether a size falls strictly inside the filter's size window
#[inline]
pub fn within_size_band(size: f64, requested: f64) -> bool {
    (size - requested).abs() < crate::models::SIZE_BAND
}

/// Evaluate a search filter against an already loaded record
///
/// Mirrors the predicates the repository sends to the database: each present
/// field must match, absent fields always pass. Records with a missing value
/// for a constrained field never match (SQL comparison with NULL).
#[inline]
pub fn matches_filter(record: &PropertyRecord, filter: &SearchFilter) -> bool {
    if let Some(rooms) = filter.rooms {
        if record.rooms != Some(rooms) {
            return false;
        }
    }

    if let Some(bathrooms) = filter.bathrooms {
        if record.bathrooms != Some(bathrooms) {
            return false;
        }
    }

    if let Some(parking_space) = filter.parking_space {
        if record.parking_space != Some(parking_space) {
            return false;
        }
    }

    if let Some(requested) = filter.size {
        match record.size {
            Some(size) if within_size_band(size, requested) => {}
            _ => return false,
        }
    }

    if let Some(neighborhood) = &filter.neighborhood {
        if record.neighborhood_name.as_deref() != Some(neighborhood.as_str()) {
            return false;
        }
    }

    true
}

impl SearchFilter {
    pub fn matches(&self, record: &PropertyRecord) -> bool {
        matches_filter(record, self)
    }
}
