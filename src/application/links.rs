//! Hypermedia links attached to top-level catalog resources.

use serde_json::{Map, Value, json};
use url::Url;

use crate::application::projection::Projection;

pub const LINKS_FIELD: &str = "_links";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    Author,
    Book,
}

impl Resource {
    fn collection(self) -> &'static str {
        match self {
            Resource::Author => "authors",
            Resource::Book => "books",
        }
    }
}

/// Builds absolute resource URLs below the public base URL.
#[derive(Debug, Clone)]
pub struct LinkBuilder {
    base: String,
}

impl LinkBuilder {
    pub fn new(public_base_url: &Url) -> Self {
        Self {
            base: public_base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    /// Detail URL of a resource, also used as the `Location` of creations.
    pub fn detail(&self, resource: Resource, id: i64) -> String {
        format!("{}/api/{}/{id}", self.base, resource.collection())
    }

    /// `self` always; `delete` and `update` only for administrators.
    pub fn links(&self, resource: Resource, id: i64, admin: bool) -> Value {
        let href = self.detail(resource, id);
        let mut links = Map::new();
        links.insert("self".to_string(), json!({ "href": href }));
        if admin {
            links.insert("delete".to_string(), json!({ "href": href }));
            links.insert("update".to_string(), json!({ "href": href }));
        }
        Value::Object(links)
    }

    pub fn attach(&self, projection: &mut Projection, resource: Resource, id: i64, admin: bool) {
        projection.insert(LINKS_FIELD.to_string(), self.links(resource, id, admin));
    }
}
