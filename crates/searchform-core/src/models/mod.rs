pub mod membership;
pub mod replica;
pub mod settings;
pub mod task;
