use thiserror::Error;
use url::Url;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LinkError {
    #[error("empty link")]
    Empty,

    #[error("link {0:?} is not an absolute path")]
    NotAbsolutePath(String),

    #[error("link {link:?} does not form a valid URL: {source}")]
    Invalid {
        link: String,
        #[source]
        source: url::ParseError,
    },
}

/// Origin of the news site; every path the API hands out is relative to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Site {
    origin: String,
}

impl Site {
    /// Keeps only the scheme, host and port of `base`.
    pub fn new(base: &Url) -> Self {
        Self {
            origin: base.origin().ascii_serialization(),
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Builds an absolute URL from a server-relative path such as `/news/123`.
    ///
    /// The path is appended to the origin verbatim rather than joined, so a
    /// path starting with `//` stays on this host.
    pub fn resolve(&self, path: &str) -> Result<Url, LinkError> {
        let path = path.trim();
        if path.is_empty() {
            return Err(LinkError::Empty);
        }
        if !path.starts_with('/') {
            return Err(LinkError::NotAbsolutePath(path.to_string()));
        }

        let full = format!("{}{}", self.origin, path);
        Url::parse(&full).map_err(|source| LinkError::Invalid {
            link: path.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn site() -> Site {
        Site::new(&Url::parse("https://www.vesti.ru/some/page?x=1").unwrap())
    }

    #[test]
    fn origin_drops_path_and_query() {
        assert_eq!(site().origin(), "https://www.vesti.ru");
    }

    #[test]
    fn resolves_relative_path() {
        let url = site().resolve("/article/4012345").unwrap();
        assert_eq!(url.as_str(), "https://www.vesti.ru/article/4012345");
    }

    #[test]
    fn keeps_query_of_pagination_cursor() {
        let url = site().resolve("/api/news?page=2&limit=20").unwrap();
        assert_eq!(url.path(), "/api/news");
        assert_eq!(url.query(), Some("page=2&limit=20"));
    }

    #[test]
    fn double_slash_stays_on_host() {
        let url = site().resolve("//evil.example/x").unwrap();
        assert_eq!(url.host_str(), Some("www.vesti.ru"));
    }

    #[test]
    fn rejects_empty_and_relative() {
        assert_eq!(site().resolve("  "), Err(LinkError::Empty));
        assert_eq!(
            site().resolve("article/1"),
            Err(LinkError::NotAbsolutePath("article/1".into()))
        );
        assert_eq!(
            site().resolve("https://other.example/"),
            Err(LinkError::NotAbsolutePath("https://other.example/".into()))
        );
    }

    #[test]
    fn keeps_port_of_local_server() {
        let site = Site::new(&Url::parse("http://127.0.0.1:8123").unwrap());
        let url = site.resolve("/api/news").unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8123/api/news");
    }
}
