pub mod itinerary_builder;
pub mod llm;
pub mod location;
pub mod notes;
pub mod task_registry;
pub mod tools;
pub mod travel_service;
