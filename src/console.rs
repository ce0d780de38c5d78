// UI driver capability consumed by the lifecycle controller

use crate::error::CycleError;
use async_trait::async_trait;
use std::time::Duration;

/// Login credentials for the rental console.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub phone: String,
    pub password: String,
}

/// Raw text of one instance row. Missing cells come back empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConsoleRow {
    pub name: String,
    pub status: String,
    pub remaining: String,
}

/// Opaque handle of a page element, valid until the next navigation or refresh.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(pub String);

/// An element whose text matches a menu label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub id: ElementId,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickOutcome {
    Clicked,
    NotFound,
}

/// Primitives a console session offers. One session, used from one task at a time.
#[async_trait]
pub trait ConsoleDriver: Send {
    /// Sign in; fails with [`CycleError::AuthenticationTimeout`] when the console never loads.
    async fn login(&mut self, credentials: &Credentials) -> Result<(), CycleError>;

    /// Load the instance list and wait until rows are present.
    async fn navigate_to_console(&mut self) -> Result<(), CycleError>;

    /// Current instance rows, top to bottom.
    async fn list_rows(&mut self) -> Result<Vec<ConsoleRow>, CycleError>;

    /// Reload the visible state and block until the row list is present again.
    async fn refresh(&mut self) -> Result<(), CycleError>;

    /// Click a control shown directly on row `index` whose text contains `label`.
    async fn click_row_action(
        &mut self,
        index: usize,
        label: &str,
    ) -> Result<ClickOutcome, CycleError>;

    /// Open the secondary ("more") action menu of row `index`.
    async fn open_row_menu(&mut self, index: usize) -> Result<(), CycleError>;

    /// Every element on the page labelled `label`, hidden ones included.
    async fn menu_items(&mut self, label: &str) -> Result<Vec<MenuItem>, CycleError>;

    async fn click_element(&mut self, id: &ElementId) -> Result<(), CycleError>;

    /// Confirm a modal dialog if one shows up within `timeout`. Returns whether one did.
    async fn dismiss_confirmation(&mut self, timeout: Duration) -> Result<bool, CycleError>;

    /// End the session.
    async fn close(&mut self) -> Result<(), CycleError>;
}
