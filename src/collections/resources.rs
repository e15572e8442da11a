//! Typed catalog of the sub-resources a trip manages.
//!
//! Each of these is a plain domain payload; the store supplies the
//! envelope (`id`, timestamps, attachment URL, owner tag). Every resource
//! is a thin type parameterization of the one generic [`super::Collection`]
//! accessor, bound under its conventional sub-collection name.

use serde::{Deserialize, Serialize};

/// Conventional sub-collection names.
pub mod sub {
    pub const TICKETS: &str = "tickets";
    pub const STAYS: &str = "stays";
    pub const MEALS: &str = "meals";
    pub const CITIES: &str = "cities";
    pub const LUGGAGE: &str = "luggage";
    pub const NOTES: &str = "notes";
    pub const EXPENSES: &str = "expenses";
    pub const DOCUMENTS: &str = "documents";
    pub const ITINERARY: &str = "itinerary";
    pub const PHRASES: &str = "phrases";
    pub const SOUVENIRS: &str = "souvenirs";
    pub const PLACES: &str = "places";
}

/// A registered trip: the scoping key for every sub-resource.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Trip {
    pub destination: String,
    pub country_code: String,
    /// ISO date.
    pub start_date: String,
    pub end_date: Option<String>,
    pub travelers: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlightTicket {
    pub airline: String,
    pub from: String,
    pub to: String,
    /// ISO date.
    pub date: String,
    /// Time of day, e.g. "10:30".
    pub time: String,
    pub price: f64,
}

/// Hotel / B&B / apartment stay.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stay {
    pub name: String,
    /// Price per night.
    pub price: f64,
    pub address: String,
    pub check_in: String,
    pub check_out: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub name: String,
    pub price: f64,
    pub address: String,
    pub date: String,
}

/// A city on the route.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TripCity {
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Luggage {
    pub name: String,
    pub owner: String,
    pub items: Vec<LuggageItem>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LuggageItem {
    pub name: String,
    pub checked: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub content: String,
}

/// A budget line item.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expense {
    /// One of [`expense_category`].
    pub category: String,
    pub description: String,
    pub amount: f64,
    pub date: String,
}

/// Expense categories.
pub mod expense_category {
    pub const ACCOMMODATION: &str = "accommodation";
    pub const FOOD: &str = "food";
    pub const TRANSPORTATION: &str = "transportation";
    pub const ACTIVITIES: &str = "activities";
    pub const SHOPPING: &str = "shopping";
    pub const OTHER: &str = "other";
}

/// A travel document to bring (passport, insurance, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TravelDocument {
    pub name: String,
    pub doc_type: String,
    pub required: bool,
    pub checked: bool,
    pub notes: String,
}

/// One day of the itinerary. Activities carry a time of day; the accessor
/// imposes no order, so itinerary views sort by `time` client-side.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryDay {
    pub date: String,
    pub title: String,
    pub activities: Vec<ItineraryActivity>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItineraryActivity {
    pub time: String,
    pub title: String,
    pub location: String,
    pub notes: String,
}

/// A useful phrase in the destination language.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Phrase {
    pub phrase: String,
    pub translation: String,
    pub category: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Souvenir {
    pub name: String,
    /// Who it is for.
    #[serde(rename = "for")]
    pub recipient: String,
    pub price: f64,
    pub purchased: bool,
}

/// A place to visit at the destination.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Place {
    pub name: String,
    pub place_type: String,
    pub address: String,
    pub rating: f64,
    pub notes: String,
    pub visited: bool,
}
