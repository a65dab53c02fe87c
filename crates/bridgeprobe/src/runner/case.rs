//! Test cases and suites.

use crate::result::ProbeResult;
use crate::runner::context::TestContext;
use futures::future::BoxFuture;
use std::fmt;
use std::sync::Arc;

/// A test body; borrows the context for the duration of one attempt
pub type TestFn =
    Arc<dyn for<'a> Fn(&'a mut TestContext) -> BoxFuture<'a, ProbeResult<()>> + Send + Sync>;

/// One test
#[derive(Clone)]
pub struct TestCase {
    /// Test name
    pub name: String,
    /// Optional category used for filtering
    pub category: Option<String>,
    /// Never run this test
    pub skip: bool,
    /// Run only tests marked `only`
    pub only: bool,
    /// Retries for this test, overriding the runner config
    pub retries: Option<u32>,
    body: TestFn,
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("skip", &self.skip)
            .field("only", &self.only)
            .field("retries", &self.retries)
            .finish_non_exhaustive()
    }
}

impl TestCase {
    /// Create a test.
    ///
    /// ```ignore
    /// TestCase::new("opens a project", |ctx| Box::pin(async move {
    ///     ctx.ipc().mock_response("open_project", json!({"files_count": 3}));
    ///     ctx.ipc().invoke("open_project", json!({"path": "/p"})).await?;
    ///     ctx.ipc().assert_invoked("open_project", InvokeExpectation::times(1))
    /// }))
    /// ```
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: for<'a> Fn(&'a mut TestContext) -> BoxFuture<'a, ProbeResult<()>>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            category: None,
            skip: false,
            only: false,
            retries: None,
            body: Arc::new(body),
        }
    }

    /// Set category
    #[must_use]
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Mark as skipped
    #[must_use]
    pub const fn skip(mut self) -> Self {
        self.skip = true;
        self
    }

    /// Mark as focused
    #[must_use]
    pub const fn only(mut self) -> Self {
        self.only = true;
        self
    }

    /// Override retries
    #[must_use]
    pub const fn with_retries(mut self, retries: u32) -> Self {
        self.retries = Some(retries);
        self
    }

    pub(crate) fn run<'a>(&self, ctx: &'a mut TestContext) -> BoxFuture<'a, ProbeResult<()>> {
        (self.body)(ctx)
    }
}

/// Named, ordered collection of tests
#[derive(Debug, Clone, Default)]
pub struct TestSuite {
    /// Suite name
    pub name: String,
    /// Tests in run order
    pub tests: Vec<TestCase>,
}

impl TestSuite {
    /// Create an empty suite
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tests: Vec::new(),
        }
    }

    /// Append a test
    #[must_use]
    pub fn with_test(mut self, test: TestCase) -> Self {
        self.tests.push(test);
        self
    }

    /// Append a test
    pub fn add(&mut self, test: TestCase) {
        self.tests.push(test);
    }

    /// Number of tests
    #[must_use]
    pub fn len(&self) -> usize {
        self.tests.len()
    }

    /// Whether the suite has no tests
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Whether any test is focused
    #[must_use]
    pub fn has_only(&self) -> bool {
        self.tests.iter().any(|t| t.only)
    }
}
