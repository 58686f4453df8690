//! Inputs shared by the micro-wire benchmarks.

/// One benchmark input: a fixture file fed whole or in fixed size fragments.
#[derive(Debug, Copy, Clone)]
pub struct TestCase {
    name: &'static str,
    group: TestGroup,
    file: TestFile,
    fragment_size: Option<usize>,
}

impl TestCase {
    pub fn new(name: &'static str, group: TestGroup, file: TestFile) -> Self {
        Self { name, group, file, fragment_size: None }
    }

    pub fn request(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Request, file)
    }

    pub fn response(name: &'static str, file: TestFile) -> Self {
        Self::new(name, TestGroup::Response, file)
    }

    /// Feeds the input `fragment_size` bytes at a time, as a slow socket would deliver it.
    #[must_use]
    pub fn fragmented(mut self, fragment_size: usize) -> Self {
        self.fragment_size = Some(fragment_size.max(1));
        self
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn group(&self) -> TestGroup {
        self.group
    }

    pub fn file(&self) -> &TestFile {
        &self.file
    }

    /// The slices a parser receives for this case.
    pub fn fragments(&self) -> std::slice::Chunks<'static, u8> {
        let content = self.file.content();
        content.chunks(self.fragment_size.unwrap_or(content.len().max(1)))
    }
}

#[derive(Debug, Copy, Clone)]
pub struct TestFile {
    file_name: &'static str,
    content: &'static [u8],
}

impl TestFile {
    pub const fn new(file_name: &'static str, content: &'static [u8]) -> Self {
        Self { file_name, content }
    }

    pub fn content(&self) -> &'static [u8] {
        self.content
    }

    pub fn file_name(&self) -> &'static str {
        self.file_name
    }

    pub fn len(&self) -> usize {
        self.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }
}

/// Whether a case holds requests or responses, which decides how a trailing body is read.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TestGroup {
    Request,
    Response,
}

impl TestGroup {
    /// Responses without a length are delimited by the connection closing.
    pub fn trailing_bytes_as_body(self) -> bool {
        self == TestGroup::Response
    }
}
