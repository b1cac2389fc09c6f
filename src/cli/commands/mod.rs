pub mod associates;
pub mod forms;
pub mod health;
pub mod migrate;
pub mod parse;
