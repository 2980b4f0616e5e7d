//! 类型定义模块

mod app_state;
mod config;
mod draft;
mod list;
mod route;

pub use app_state::{normalize_id, AppState, DraftIndicatorState, MetadataLoadState};
pub use config::{AppConfig, DeviceSystem, UiTexts};
pub use draft::{
    is_real_draft_id, BatchDeleteFailure, BatchDeleteReport, BatchDeleteResult,
    DraftAdministrativeData, DraftRef, EntityKey, FieldChange, SubmitOutcome, NULL_UUID,
};
pub use list::{
    DeletionClass, EditingStatus, Filter, FilterOperator, GroupBy, Grouping, ListItemRef,
    ListQuery, PriceBand, ProductRow, QueryChange, Sorter,
};
pub use route::{NavigationRequest, RouteArgs, RouteMatch, RouteName};
