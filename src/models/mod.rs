pub mod conversation;
pub mod itinerary;
pub mod place;
pub mod plan;
