//! Route definitions

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Routes known to the app
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RouteName {
    Master,
    Display,
    Edit,
    Create,
}

impl RouteName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Master => "master",
            Self::Display => "display",
            Self::Edit => "edit",
            Self::Create => "create",
        }
    }

    /// Routes that address a draft
    pub fn is_draft_route(self) -> bool {
        matches!(self, Self::Edit | Self::Create)
    }

    /// Routes that carry a product id
    pub fn has_product_id(self) -> bool {
        matches!(self, Self::Display | Self::Edit)
    }
}

impl fmt::Display for RouteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RouteName {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "master" => Ok(Self::Master),
            "display" => Ok(Self::Display),
            "edit" => Ok(Self::Edit),
            "create" => Ok(Self::Create),
            other => Err(CoreError::ValidationError(format!("Unknown route: '{other}'"))),
        }
    }
}

/// Route arguments as they appear in the URL
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteArgs {
    /// URL-encoded product id
    #[serde(rename = "productId", default, skip_serializing_if = "Option::is_none")]
    pub product_id: Option<String>,
    #[serde(rename = "DraftUUID", default, skip_serializing_if = "Option::is_none")]
    pub draft_uuid: Option<String>,
}

impl RouteArgs {
    /// Arguments for a product, encoding the id
    pub fn for_product(product_id: &str) -> Self {
        Self {
            product_id: Some(urlencoding::encode(product_id).into_owned()),
            draft_uuid: None,
        }
    }

    #[must_use]
    pub fn with_draft(mut self, draft_uuid: impl Into<String>) -> Self {
        self.draft_uuid = Some(draft_uuid.into());
        self
    }

    /// Decoded product id. Ids that fail to decode are used as they are.
    pub fn decoded_product_id(&self) -> Option<String> {
        let raw = self.product_id.as_deref()?;
        let decoded = urlencoding::decode(raw).unwrap_or(Cow::Borrowed(raw));
        Some(decoded.into_owned())
    }
}

/// A route match reported by the router
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteMatch {
    /// `None` for a hash no route pattern matched ("bypassed")
    pub route: Option<RouteName>,
    #[serde(default)]
    pub args: RouteArgs,
}

impl RouteMatch {
    pub fn new(route: RouteName, args: RouteArgs) -> Self {
        Self {
            route: Some(route),
            args,
        }
    }

    /// Match for a route name as reported by a router; unknown or empty names
    /// are treated as bypassed.
    pub fn from_name(name: &str, args: RouteArgs) -> Self {
        Self {
            route: name.parse().ok(),
            args,
        }
    }

    pub fn bypassed() -> Self {
        Self {
            route: None,
            args: RouteArgs::default(),
        }
    }

    pub fn is_bypassed(&self) -> bool {
        self.route.is_none()
    }
}

/// Programmatic navigation request handed to the navigation host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationRequest {
    pub route: RouteName,
    #[serde(default)]
    pub args: RouteArgs,
}

impl NavigationRequest {
    pub fn master() -> Self {
        Self {
            route: RouteName::Master,
            args: RouteArgs::default(),
        }
    }

    pub fn display(product_id: &str) -> Self {
        Self {
            route: RouteName::Display,
            args: RouteArgs::for_product(product_id),
        }
    }

    /// `edit` when the draft belongs to a product, `create` otherwise
    pub fn draft(product_id: Option<&str>, draft_id: &str) -> Self {
        match product_id {
            Some(product_id) => Self {
                route: RouteName::Edit,
                args: RouteArgs::for_product(product_id).with_draft(draft_id),
            },
            None => Self {
                route: RouteName::Create,
                args: RouteArgs::default().with_draft(draft_id),
            },
        }
    }

    /// URL hash for this request
    pub fn to_hash(&self) -> String {
        let product = self.args.product_id.as_deref().unwrap_or_default();
        let draft = self.args.draft_uuid.as_deref().unwrap_or_default();
        match self.route {
            RouteName::Master => String::new(),
            RouteName::Display => format!("Products/{product}"),
            RouteName::Edit => format!("Products/{product}/edit/{draft}"),
            RouteName::Create => format!("Drafts/{draft}"),
        }
    }

    /// Match a URL hash against the route patterns
    pub fn match_hash(hash: &str) -> RouteMatch {
        let hash = hash.trim_start_matches('#').trim_matches('/');
        let parts: Vec<&str> = hash.split('/').collect();
        match parts.as_slice() {
            [""] => RouteMatch::new(RouteName::Master, RouteArgs::default()),
            ["Products", product] if !product.is_empty() => RouteMatch::new(
                RouteName::Display,
                RouteArgs {
                    product_id: Some((*product).to_string()),
                    draft_uuid: None,
                },
            ),
            ["Products", product, "edit", draft] if !product.is_empty() && !draft.is_empty() => {
                RouteMatch::new(
                    RouteName::Edit,
                    RouteArgs {
                        product_id: Some((*product).to_string()),
                        draft_uuid: Some((*draft).to_string()),
                    },
                )
            }
            ["Drafts", draft] if !draft.is_empty() => {
                RouteMatch::new(RouteName::Create, RouteArgs::default().with_draft(*draft))
            }
            _ => RouteMatch::bypassed(),
        }
    }
}
