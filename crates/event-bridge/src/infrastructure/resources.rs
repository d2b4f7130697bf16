//! Static resources served next to the event stream.
//!
//! The HTTP layer asks a [`ResourceLookup`] for named resources instead of
//! reading files itself, so the bundled viewer can be replaced (or a test can
//! supply its own) without touching the server.

use std::borrow::Cow;
use std::collections::HashMap;

/// A named static resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub bytes: Cow<'static, [u8]>,
    pub content_type: &'static str,
}

/// Looks up static resources by name (`"index.html"`, `"viewer.js"`, ...).
pub trait ResourceLookup: Send + Sync {
    fn lookup(&self, name: &str) -> Option<Resource>;
}

/// Resources compiled into the binary.
pub struct EmbeddedResources {
    files: HashMap<&'static str, (&'static [u8], &'static str)>,
}

impl EmbeddedResources {
    pub fn new() -> Self {
        let files = HashMap::from([
            (
                "index.html",
                (
                    include_bytes!("../../assets/index.html").as_slice(),
                    "text/html; charset=utf-8",
                ),
            ),
            (
                "viewer.js",
                (
                    include_bytes!("../../assets/viewer.js").as_slice(),
                    "text/javascript; charset=utf-8",
                ),
            ),
        ]);
        Self { files }
    }
}

impl Default for EmbeddedResources {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceLookup for EmbeddedResources {
    fn lookup(&self, name: &str) -> Option<Resource> {
        let name = name.trim_start_matches('/');
        let name = if name.is_empty() { "index.html" } else { name };
        self.files.get(name).map(|&(bytes, content_type)| Resource {
            bytes: Cow::Borrowed(bytes),
            content_type,
        })
    }
}
