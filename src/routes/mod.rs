pub mod conversations;
pub mod health;
pub mod itinerary;
pub mod places;
pub mod plans;
pub mod tasks;
pub mod tools;
