use serde::{Deserialize, Serialize};
use validator::Validate;

/// Half-width of the size window used by search filters
pub const SIZE_BAND: f64 = 10.0;

/// Optional search predicates
///
/// Every present field is ANDed into the query; an absent field places no
/// constraint on the result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub parking_space: Option<i32>,
    /// Matched as the open interval `(size - 10, size + 10)`
    pub size: Option<f64>,
    /// Neighborhood name, resolved from a zip code before filtering
    pub neighborhood: Option<String>,
}

impl SearchFilter {
    pub fn is_empty(&self) -> bool {
        self.rooms.is_none()
            && self.bathrooms.is_none()
            && self.parking_space.is_none()
            && self.size.is_none()
            && self.neighborhood.is_none()
    }

    /// Exclusive size bounds. The lower bound is not clamped at zero.
    pub fn size_band(&self) -> Option<(f64, f64)> {
        self.size.map(|s| (s - SIZE_BAND, s + SIZE_BAND))
    }
}

/// Page window for listing queries
///
/// A `page_size` of zero disables paging and returns the full filtered set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub page_size: u32,
    pub offset: u32,
}

impl Pagination {
    pub fn new(page_size: u32, offset: u32) -> Self {
        Self { page_size, offset }
    }

    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn is_bounded(&self) -> bool {
        self.page_size > 0
    }
}

/// Listing search as received from clients
///
/// Zero numeric fields and an empty zip code mean "not provided".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub rooms: i32,
    #[serde(default)]
    pub bathrooms: i32,
    #[serde(default)]
    pub parking_space: i32,
    #[serde(default)]
    pub size: i32,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default)]
    pub offset: u32,
}

fn default_page_size() -> u32 {
    10
}

impl Default for SearchRequest {
    fn default() -> Self {
        Self {
            rooms: 0,
            bathrooms: 0,
            parking_space: 0,
            size: 0,
            zip_code: String::new(),
            page_size: default_page_size(),
            offset: 0,
        }
    }
}

impl SearchRequest {
    /// Build the filter, given the neighborhood resolved from `zip_code`
    pub fn to_filter(&self, neighborhood: Option<String>) -> SearchFilter {
        fn present(value: i32) -> Option<i32> {
            (value != 0).then_some(value)
        }

        SearchFilter {
            rooms: present(self.rooms),
            bathrooms: present(self.bathrooms),
            parking_space: present(self.parking_space),
            size: present(self.size).map(f64::from),
            neighborhood,
        }
    }

    pub fn pagination(&self) -> Pagination {
        Pagination::new(self.page_size, self.offset)
    }
}

/// Request for a price prediction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct PredictionRequest {
    #[validate(range(min = 0))]
    pub rooms: i32,
    #[validate(range(min = 0))]
    pub bathrooms: i32,
    #[validate(range(min = 0))]
    pub parking_space: i32,
    #[validate(range(min = 1))]
    pub size: i32,
    #[validate(length(min = 1))]
    pub zip_code: String,
}
