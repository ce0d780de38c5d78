// Library for tests to access modules

pub mod config;
pub mod console;
pub mod controller;
pub mod cycle;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod remaining;
pub mod webdriver;
