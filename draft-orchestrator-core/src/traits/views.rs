//! View abstract Traits

use std::sync::Arc;

use crate::types::ListItemRef;

/// Detail view (display or edit)
pub trait DetailView: Send + Sync {
    /// The entity to show has changed; rebind before the navigation completes
    fn product_changed(&self);

    /// The view is no longer visible and must not load data
    fn unbind(&self);
}

/// Master list widget
pub trait MasterListView: Send + Sync {
    /// Mark an entry selected; `None` removes all selections
    fn set_selected(&self, item: Option<&ListItemRef>);

    /// Scroll an entry into view; `None` scrolls to the top
    fn scroll_to(&self, item: Option<&ListItemRef>);

    /// Whether all entries fit on screen
    fn is_fully_visible(&self) -> bool {
        false
    }
}

/// Views known at startup
#[derive(Clone, Default)]
pub struct ViewRegistry {
    pub display: Option<Arc<dyn DetailView>>,
    pub edit: Option<Arc<dyn DetailView>>,
    pub master_list: Option<Arc<dyn MasterListView>>,
}

impl ViewRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_display(mut self, view: Arc<dyn DetailView>) -> Self {
        self.display = Some(view);
        self
    }

    #[must_use]
    pub fn with_edit(mut self, view: Arc<dyn DetailView>) -> Self {
        self.edit = Some(view);
        self
    }

    #[must_use]
    pub fn with_master_list(mut self, view: Arc<dyn MasterListView>) -> Self {
        self.master_list = Some(view);
        self
    }

    /// Detail view serving a draft (edit) or an active product (display)
    pub fn detail(&self, draft: bool) -> Option<&Arc<dyn DetailView>> {
        if draft {
            self.edit.as_ref()
        } else {
            self.display.as_ref()
        }
    }
}
