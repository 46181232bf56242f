//! API Models
//!
//! Data structures exchanged over the JSON API, annotated for OpenAPI
//! generation with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// The sample's client-side model: a counter plus a free-form note.
///
/// Field names stay PascalCase on the wire.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, Default, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Counter {
    #[schema(example = 3)]
    pub my_property: i32,
    #[serde(default)]
    #[schema(example = "hello")]
    pub another_prop: Option<String>,
}

impl Counter {
    pub fn increment(&mut self) {
        self.my_property = self.my_property.wrapping_add(1);
    }

    /// Zeroes the count. The note is left alone.
    pub fn reset(&mut self) {
        self.my_property = 0;
    }
}
