use std::fmt;
use std::path::{Path, PathBuf};

/// Scope of a request history and of its detection result.
///
/// A test identity is the test class and test method, plus an optional
/// sub-index for tests that talk to several recorded targets.
///
/// # Example
///
/// ```rust
/// use stubsense_core::TestIdentity;
///
/// let identity = TestIdentity::new("com.acme.OrderTest", "shouldCreateOrder")
///     .with_sub_index(1);
/// assert_eq!(identity.to_string(), "com.acme.OrderTest#shouldCreateOrder[1]");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TestIdentity {
    class_name: String,
    method_name: String,
    sub_index: Option<u32>,
}

impl TestIdentity {
    /// Creates an identity for a test method.
    pub fn new(class_name: impl Into<String>, method_name: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            method_name: method_name.into(),
            sub_index: None,
        }
    }

    /// Scopes the identity to one of several targets of the same test.
    #[must_use]
    pub fn with_sub_index(mut self, sub_index: u32) -> Self {
        self.sub_index = Some(sub_index);
        self
    }

    /// The test class name.
    #[must_use]
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// The test method name.
    #[must_use]
    pub fn method_name(&self) -> &str {
        &self.method_name
    }

    /// The target sub-index, if any.
    #[must_use]
    pub fn sub_index(&self) -> Option<u32> {
        self.sub_index
    }

    /// Location of an artifact of this identity under `root`.
    ///
    /// Layout is `<root>/<class>/<method>[-<sub_index>].<kind>.json` with
    /// class and method names slugified.
    pub(crate) fn artifact_path(&self, root: &Path, kind: &str) -> PathBuf {
        let class = file_segment(&self.class_name);
        let method = file_segment(&self.method_name);
        let stem = match self.sub_index {
            Some(index) => format!("{method}-{index}"),
            None => method,
        };

        root.join(class).join(format!("{stem}.{kind}.json"))
    }
}

impl fmt::Display for TestIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.class_name, self.method_name)?;
        if let Some(index) = self.sub_index {
            write!(f, "[{index}]")?;
        }
        Ok(())
    }
}

fn file_segment(name: &str) -> String {
    let slug = slug::slugify(name);
    if slug.is_empty() {
        "_".to_string()
    } else {
        slug
    }
}
