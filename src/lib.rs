pub mod core;
pub mod i18n;
pub mod plugins;
pub mod view;
