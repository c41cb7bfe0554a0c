pub mod input;
pub mod keymap;
pub mod settings;
pub mod store;
