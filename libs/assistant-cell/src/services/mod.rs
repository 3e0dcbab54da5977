pub mod assistant;

pub use assistant::AssistantService;
