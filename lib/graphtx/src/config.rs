use crate::error::ConfigError;
use oxrdfio::RdfFormat;
use std::fmt;
use std::time::Duration;
use url::Url;
use uuid::Uuid;

/// The `User-Agent` sent when none is configured.
pub const DEFAULT_USER_AGENT: &str = concat!("graphtx/", env!("CARGO_PKG_VERSION"));

/// Holds the configuration of a [`GraphDbClient`](crate::GraphDbClient).
///
/// ```
/// use graphtx::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::new("http://localhost:7200", "movies")?
///     .with_credentials("admin", "root")
///     .with_timeout(Duration::from_secs(30));
/// assert_eq!(
///     config.endpoints().transactions().as_str(),
///     "http://localhost:7200/repositories/movies/transactions"
/// );
/// # Result::<_, Box<dyn std::error::Error>>::Ok(())
/// ```
#[derive(Debug, Clone)]
pub struct ClientConfig {
    endpoints: Endpoints,
    repository: String,
    credentials: Option<Credentials>,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    save_format: RdfFormat,
    user_agent: String,
}

impl ClientConfig {
    /// Targets the repository `repository` of the server rooted at `server`.
    ///
    /// The server URL may carry a path prefix (`http://host/graphdb`). Repository endpoints are
    /// resolved below `{server}/repositories/{repository}`.
    pub fn new(server: &str, repository: impl Into<String>) -> Result<Self, ConfigError> {
        let repository = repository.into();
        if repository.is_empty() || repository.contains('/') {
            return Err(ConfigError::InvalidRepository(repository));
        }
        let mut base = Url::parse(server).map_err(|source| ConfigError::InvalidServerUrl {
            url: server.to_owned(),
            source,
        })?;
        base.set_query(None);
        base.set_fragment(None);
        base.path_segments_mut()
            .map_err(|()| ConfigError::CannotBeABase(server.to_owned()))?
            .pop_if_empty()
            .push("repositories")
            .push(&repository);
        Ok(Self {
            endpoints: Endpoints::new(base),
            repository,
            credentials: None,
            timeout: None,
            connect_timeout: None,
            save_format: RdfFormat::NTriples,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        })
    }

    /// Authenticates every request with HTTP basic authentication.
    #[must_use]
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Bounds the total duration of each request. Requests are not bounded by default.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Bounds the duration of connection establishment.
    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets the path, relative to the repository, that receives queries outside transactions.
    ///
    /// Defaults to the repository endpoint itself.
    #[must_use]
    pub fn with_query_path(mut self, path: &str) -> Self {
        self.endpoints.set_query_path(path);
        self
    }

    /// Sets the serialization used to upload graphs. Defaults to N-Triples.
    #[must_use]
    pub fn with_save_format(mut self, format: RdfFormat) -> Self {
        self.save_format = format;
        self
    }

    /// Sets the `User-Agent` header.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn credentials(&self) -> Option<&Credentials> {
        self.credentials.as_ref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout
    }

    pub fn save_format(&self) -> RdfFormat {
        self.save_format
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// HTTP basic authentication credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    username: String,
    password: String,
}

impl Credentials {
    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// The URLs of a repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    repository: Url,
    query: Url,
    transactions: Url,
}

impl Endpoints {
    fn new(repository: Url) -> Self {
        let mut transactions = repository.clone();
        transactions.set_path(&format!("{}/transactions", repository.path()));
        Self {
            query: repository.clone(),
            repository,
            transactions,
        }
    }

    fn set_query_path(&mut self, path: &str) {
        let path = path.trim_matches('/');
        self.query = self.repository.clone();
        if !path.is_empty() {
            self.query
                .set_path(&format!("{}/{path}", self.repository.path()));
        }
    }

    /// `{server}/repositories/{repository}`
    pub fn repository(&self) -> &Url {
        &self.repository
    }

    /// The target of queries sent outside a transaction.
    pub fn query(&self) -> &Url {
        &self.query
    }

    /// `{repository}/transactions`, the target of begin requests.
    pub fn transactions(&self) -> &Url {
        &self.transactions
    }

    /// `{repository}/transactions/{id}`
    pub fn transaction(&self, id: Uuid) -> Url {
        let mut url = self.transactions.clone();
        url.set_path(&format!("{}/{id}", self.transactions.path()));
        url
    }
}
