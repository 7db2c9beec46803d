use lasso::{Spur, ThreadedRodeo};
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for tag names. Documents repeat a handful of tag
/// names thousands of times, so nodes carry a 4-byte symbol instead.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// An interned tag name such as `terrain_graphics` or `tile`.
/// Copy, Eq and Hash in O(1); the empty name belongs to the document root.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TagName(Spur);

impl TagName {
    /// Intern a tag name, or return the existing symbol.
    pub fn intern(s: &str) -> Self {
        TagName(INTERNER.get_or_intern(s))
    }

    /// The anonymous name of the synthetic document root.
    pub fn root() -> Self {
        Self::intern("")
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    pub fn is_root(&self) -> bool {
        self.as_str().is_empty()
    }
}

impl fmt::Debug for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.as_str())
    }
}

impl fmt::Display for TagName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TagName {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}
