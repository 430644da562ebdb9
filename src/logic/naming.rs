use std::fmt;

use crate::model::BranchName;

/// Identity of the running test, used to derive its branch name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestName(String);

impl TestName {
    /// Any explicit name, e.g. `"TestFoo"` or `"TestFoo/case1"`.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Name of the current libtest test (`module::test_fn`), read from the
    /// thread name.
    ///
    /// `None` outside a test thread: single-threaded runs where tests execute
    /// on `main`, and tokio worker threads a spawned task may land on. Prefer
    /// [`test_name!`](crate::test_name) inside spawned tasks.
    pub fn current() -> Option<Self> {
        let thread = std::thread::current();
        match thread.name() {
            Some("main") | None => None,
            Some(name) if name.starts_with("tokio-") => None,
            Some(name) => Some(Self::new(name)),
        }
    }

    /// Build a name from a function's type path as produced by
    /// `test_name!`: the crate segment and any `{{closure}}` frames are
    /// dropped, so `my_crate::it::connects::{{closure}}` becomes `it::connects`.
    #[doc(hidden)]
    pub fn from_function_path(path: &str) -> Self {
        let segments: Vec<&str> = path
            .split("::")
            .skip(1)
            .filter(|segment| *segment != "{{closure}}")
            .collect();
        Self(segments.join("::"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TestName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// [`TestName`] of the enclosing function, independent of which thread
/// runs it.
///
/// ```
/// fn connects() -> neon_testdb::TestName {
///     neon_testdb::test_name!()
/// }
/// assert!(connects().as_str().ends_with("connects"));
/// ```
#[macro_export]
macro_rules! test_name {
    () => {{
        fn here() {}
        fn type_name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let path = type_name_of(here);
        $crate::TestName::from_function_path(path.strip_suffix("::here").unwrap_or(path))
    }};
}

pub fn local_hostname() -> String {
    hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

/// `{host}.{test}` with path separators flattened to dots.
pub fn test_branch_name(host: &str, test: &TestName) -> BranchName {
    let name = format!("{}.{}", host, test.as_str())
        .replace("::", ".")
        .replace('/', ".");
    BranchName(name)
}
