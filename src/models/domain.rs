use serde::{Deserialize, Serialize};

/// Property listing joined with its neighborhood, street, modality and company
///
/// A record only exists when all four joins resolve; listings with a dangling
/// foreign key never come back from the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRecord {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub price: f64,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub size: Option<f64>,
    pub parking_space: Option<i32>,
    pub image_url: Option<String>,
    #[serde(rename = "type")]
    pub property_type: String,
    pub property_url: Option<String>,
    pub number: Option<String>,
    pub is_active: bool,
    pub neighborhood_name: Option<String>,
    pub population: i64,
    pub houses: i64,
    pub area: f64,
    pub street_name: Option<String>,
    pub zip_code: Option<String>,
    pub flood_quota: Option<f64>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub modality_name: Option<String>,
    pub company_name: String,
}

impl PropertyRecord {
    /// Project onto the exported columns
    pub fn to_export_row(&self) -> ExportRow {
        ExportRow {
            id: self.id,
            title: self.title.clone(),
            price: self.price,
            rooms: self.rooms,
            bathrooms: self.bathrooms,
            size: self.size,
            parking_space: self.parking_space,
            property_type: self.property_type.clone(),
            number: self.number.clone(),
            neighborhood_name: self.neighborhood_name.clone(),
            population: self.population,
            houses: self.houses,
            area: self.area,
            street_name: self.street_name.clone(),
            zip_code: self.zip_code.clone(),
            flood_quota: self.flood_quota,
            latitude: self.latitude.clone(),
            longitude: self.longitude.clone(),
            modality_name: self.modality_name.clone(),
            company_name: self.company_name.clone(),
        }
    }
}

/// Exported view of a property: everything except internal-only fields
/// (description, image reference, source URL and the active flag)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportRow {
    pub id: i64,
    pub title: String,
    pub price: f64,
    pub rooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub size: Option<f64>,
    pub parking_space: Option<i32>,
    #[serde(rename = "type")]
    pub property_type: String,
    pub number: Option<String>,
    pub neighborhood_name: Option<String>,
    pub population: i64,
    pub houses: i64,
    pub area: f64,
    pub street_name: Option<String>,
    pub zip_code: Option<String>,
    pub flood_quota: Option<f64>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    pub modality_name: Option<String>,
    pub company_name: String,
}

impl ExportRow {
    /// Column names in file order
    pub const HEADER: [&'static str; 20] = [
        "id",
        "title",
        "price",
        "rooms",
        "bathrooms",
        "size",
        "parking_space",
        "type",
        "number",
        "neighborhood_name",
        "population",
        "houses",
        "area",
        "street_name",
        "zip_code",
        "flood_quota",
        "latitude",
        "longitude",
        "modality_name",
        "company_name",
    ];

    /// Field values rendered as text, aligned with [`ExportRow::HEADER`].
    /// Missing values render as empty strings.
    pub fn values(&self) -> [String; 20] {
        fn opt<T: ToString>(value: &Option<T>) -> String {
            value.as_ref().map(ToString::to_string).unwrap_or_default()
        }

        [
            self.id.to_string(),
            self.title.clone(),
            self.price.to_string(),
            opt(&self.rooms),
            opt(&self.bathrooms),
            opt(&self.size),
            opt(&self.parking_space),
            self.property_type.clone(),
            opt(&self.number),
            opt(&self.neighborhood_name),
            self.population.to_string(),
            self.houses.to_string(),
            self.area.to_string(),
            opt(&self.street_name),
            opt(&self.zip_code),
            opt(&self.flood_quota),
            opt(&self.latitude),
            opt(&self.longitude),
            opt(&self.modality_name),
            self.company_name.clone(),
        ]
    }
}

/// Address returned by the zip-code lookup service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub neighborhood_name: String,
    #[serde(default)]
    pub flood_quota: Option<f64>,
    #[serde(default)]
    pub street_name: Option<String>,
    #[serde(default)]
    pub zip_code: Option<String>,
    #[serde(default)]
    pub latitude: Option<String>,
    #[serde(default)]
    pub longitude: Option<String>,
}

/// Property attributes sent to the inference service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFeatures {
    pub rooms: i32,
    pub bathrooms: i32,
    pub parking_space: i32,
    pub size: i32,
    pub neighborhood_name: String,
    #[serde(default)]
    pub flood_quota: Option<f64>,
}

/// Price prediction for a property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictedProperty {
    pub property: PropertyFeatures,
    pub predicted_price: f64,
    pub mse: f64,
}

/// One page of search results plus the total active count
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PropertyPage {
    pub count: i64,
    pub data: Vec<PropertyRecord>,
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn property(id: i64) -> PropertyRecord {
        PropertyRecord {
            id,
            title: format!("Apartment {}", id),
            description: Some("Sunny corner unit".to_string()),
            price: 350_000.0,
            rooms: Some(2),
            bathrooms: Some(2),
            size: Some(100.0),
            parking_space: Some(1),
            image_url: Some("https://img.test/1.jpg".to_string()),
            property_type: "apartment".to_string(),
            property_url: Some("https://listings.test/1".to_string()),
            number: Some("12A".to_string()),
            is_active: true,
            neighborhood_name: Some("Victor Konder".to_string()),
            population: 4_000,
            houses: 1_200,
            area: 1.5,
            street_name: Some("Rua Almirante Barroso".to_string()),
            zip_code: Some("89066-040".to_string()),
            flood_quota: Some(12.5),
            latitude: Some("-26.9".to_string()),
            longitude: Some("-49.07".to_string()),
            modality_name: Some("sale".to_string()),
            company_name: "Acme Realty".to_string(),
        }
    }
}
