/// Origin of one handler argument's value.
///
/// The `*Value` variants (and `BodyField`) extract a single named entry and
/// require [`ParamMetadata::name`]; the collection variants yield the whole
/// map for their source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamSource {
    Body,
    BodyField,
    RouteParam,
    RouteParams,
    SessionValue,
    Session,
    StateValue,
    State,
    QueryValue,
    Query,
    HeaderValue,
    Headers,
    CookieValue,
    Cookies,
    File,
    Files,
}

impl ParamSource {
    /// Whether this source extracts a single named entry.
    pub fn requires_name(self) -> bool {
        matches!(
            self,
            ParamSource::BodyField
                | ParamSource::RouteParam
                | ParamSource::SessionValue
                | ParamSource::StateValue
                | ParamSource::QueryValue
                | ParamSource::HeaderValue
                | ParamSource::CookieValue
                | ParamSource::File
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ParamSource::Body => "body",
            ParamSource::BodyField => "body-field",
            ParamSource::RouteParam => "route-param",
            ParamSource::RouteParams => "route-params",
            ParamSource::SessionValue => "session-value",
            ParamSource::Session => "session",
            ParamSource::StateValue => "state-value",
            ParamSource::State => "state",
            ParamSource::QueryValue => "query-value",
            ParamSource::Query => "query",
            ParamSource::HeaderValue => "header-value",
            ParamSource::Headers => "headers",
            ParamSource::CookieValue => "cookie-value",
            ParamSource::Cookies => "cookies",
            ParamSource::File => "file",
            ParamSource::Files => "files",
        }
    }
}

impl std::fmt::Display for ParamSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one handler parameter's source and extraction rule.
///
/// Immutable after construction; extraction itself happens in the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamMetadata {
    pub source: ParamSource,
    pub name: Option<String>,
    pub required: bool,
}

impl ParamMetadata {
    /// A whole-source parameter (body, query map, headers map, ...).
    pub fn of(source: ParamSource) -> Self {
        Self {
            source,
            name: None,
            required: false,
        }
    }

    /// A single named entry from the given source.
    pub fn named(source: ParamSource, name: impl Into<String>) -> Self {
        Self {
            source,
            name: Some(name.into()),
            required: false,
        }
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    /// Label used in "missing required parameter" errors.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => format!("{}:{}", self.source, name),
            None => self.source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_value_variants_require_name() {
        assert!(ParamSource::HeaderValue.requires_name());
        assert!(ParamSource::BodyField.requires_name());
        assert!(!ParamSource::Headers.requires_name());
        assert!(!ParamSource::Body.requires_name());
    }

    #[test]
    fn test_label() {
        let p = ParamMetadata::named(ParamSource::QueryValue, "limit").required();
        assert_eq!(p.label(), "query-value:limit");
        assert!(p.required);
    }
}
